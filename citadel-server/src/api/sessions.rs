//! Session cookie handling.
//!
//! The session rides in one private (signed + encrypted) cookie holding the
//! SSO state nonce and, once logged in, the user ID.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use citadel_common::Error;

use super::error::ApiError;

pub const SESSION_COOKIE: &str = "citadel_session";

/// State persisted to the session cookie.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    /// Nonce for the SSO handshake.
    #[serde(default)]
    pub state: String,
    /// Empty until the user has logged in.
    #[serde(default)]
    pub user_id: String,
}

/// Derive the cookie master key from the two configured key strings.
pub fn cookie_key(hash_key: &str, block_key: &str) -> Key {
    let digest = Sha512::digest([hash_key.as_bytes(), block_key.as_bytes()].concat());
    Key::derive_from(digest.as_slice())
}

/// The session tied to the request, or a blank one.
pub fn session(jar: &PrivateCookieJar) -> Session {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| serde_json::from_str(cookie.value()).ok())
        .unwrap_or_default()
}

/// Write the session back to the jar.
pub fn store_session(jar: PrivateCookieJar, session: &Session, secure: bool) -> PrivateCookieJar {
    let value = serde_json::to_string(session).unwrap_or_default();
    let cookie = Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build();

    jar.add(cookie)
}

pub fn clear_session(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build())
}

/// The authenticated user for the request, injected by [`require_session`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

/// Middleware guarding the authenticated routes: no session, no service.
pub async fn require_session(
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let session = session(&jar);
    if session.user_id.is_empty() {
        return Err(ApiError(Error::unauthenticated()));
    }

    request.extensions_mut().insert(CurrentUser(session.user_id));
    Ok(next.run(request).await)
}
