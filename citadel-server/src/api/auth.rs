//! GitHub SSO handshake and the dev login backdoor.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use uuid::Uuid;

use citadel_common::Error;

use super::error::ApiResult;
use super::server::AppState;
use super::sessions::{self, Session};

const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";

#[derive(Debug, Deserialize)]
struct AccessTokenResp {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    email: Option<String>,
}

/// GET /api/sso-login: stash a state nonce in the session and hand the
/// browser to GitHub.
pub async fn sso_login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    let nonce = Uuid::new_v4().to_string();

    let mut session = sessions::session(&jar);
    session.state = nonce.clone();
    let jar = sessions::store_session(jar, &session, state.config.https_cookies);

    let authorize_url = format!(
        "{GITHUB_AUTHORIZE_URL}?client_id={}&state={}",
        state.config.github_client_id, nonce
    );

    (jar, Redirect::temporary(&authorize_url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: String,
    #[serde(default)]
    state: String,
}

/// GET /api/sso-callback: verify the state nonce, trade the code for a
/// token, resolve the GitHub account, and log the user in.
pub async fn sso_callback(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Response> {
    let session = sessions::session(&jar);
    if session.state.is_empty() || session.state != params.state {
        return Err(Error::invalid("sso state mismatch").into());
    }

    let token: AccessTokenResp = state
        .http
        .post(GITHUB_TOKEN_URL)
        .header(header::ACCEPT, "application/json")
        .form(&[
            ("client_id", state.config.github_client_id.as_str()),
            ("client_secret", state.config.github_client_secret.as_str()),
            ("code", params.code.as_str()),
        ])
        .send()
        .await
        .map_err(|err| Error::Upstream {
            status: 502,
            message: format!("error exchanging oauth code: {err}"),
        })?
        .json()
        .await
        .map_err(|err| Error::Upstream {
            status: 502,
            message: format!("error decoding oauth token response: {err}"),
        })?;

    let access_token = token.access_token.ok_or_else(|| Error::Upstream {
        status: 502,
        message: "github returned no access token".to_string(),
    })?;

    let github_user: GithubUser = state
        .http
        .get(GITHUB_USER_URL)
        .bearer_auth(&access_token)
        .send()
        .await
        .map_err(|err| Error::Upstream {
            status: 502,
            message: format!("error fetching github user: {err}"),
        })?
        .json()
        .await
        .map_err(|err| Error::Upstream {
            status: 502,
            message: format!("error decoding github user: {err}"),
        })?;

    let user = state
        .store
        .ensure_user(
            &github_user.id.to_string(),
            github_user.email.as_deref().unwrap_or_default(),
        )
        .await?;

    tracing::info!(user_id = %user.id, "user logged in");

    let jar = sessions::store_session(
        jar,
        &Session {
            state: String::new(),
            user_id: user.id,
        },
        state.config.https_cookies,
    );

    Ok(found_redirect(jar, &state.config.sso_redirect_url))
}

/// GET /api/logout: drop the session cookie.
pub async fn logout(jar: PrivateCookieJar) -> Response {
    found_redirect(sessions::clear_session(jar), "/")
}

#[derive(Debug, Deserialize)]
pub struct DebugLoginReq {
    github_id: String,
    #[serde(default)]
    email: String,
}

/// POST /api/login: dev backdoor, only routed when `DEBUG_ENDPOINTS` is set.
pub async fn debug_login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(body): Json<DebugLoginReq>,
) -> ApiResult<(PrivateCookieJar, Json<serde_json::Value>)> {
    let user = state.store.ensure_user(&body.github_id, &body.email).await?;

    let jar = sessions::store_session(
        jar,
        &Session {
            state: String::new(),
            user_id: user.id.clone(),
        },
        state.config.https_cookies,
    );

    Ok((jar, Json(serde_json::json!({ "user_id": user.id }))))
}

/// A plain 302 carrying the updated cookie jar.
fn found_redirect(jar: PrivateCookieJar, location: &str) -> Response {
    (
        StatusCode::FOUND,
        jar,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}
