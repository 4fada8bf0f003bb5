//! Router assembly and shared application state.

use std::sync::Arc;

use axum::extract::FromRef;
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::cookie::Key;
use tower_http::cors::CorsLayer;

use citadel_common::config::Config;
use citadel_common::db::Store;
use citadel_worker::Workflows;

use crate::reader::Reader;

use super::{auth, entries, prompt, sessions, subscriptions, timeline, viewer};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub workflows: Workflows,
    pub reader: Arc<Reader>,
    pub http: reqwest::Client,
    pub config: Arc<Config>,
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Key {
        state.cookie_key.clone()
    }
}

/// Build the application router.
///
/// Routes:
/// - GET  /api/viewer          - current user, subscriptions, active prompt
/// - GET  /api/sso-login       - redirect to the OAuth provider
/// - GET  /api/sso-callback    - OAuth callback, sets the session cookie
/// - GET  /api/logout          - clear the session cookie
/// - GET  /api/prompt          - active curation prompt (204 when unset)
/// - PUT  /api/prompt          - replace the active prompt
/// - POST /api/prompt/precheck - validation-only prompt check
/// - POST /api/subscriptions   - create feed + subscription (authed)
/// - GET  /api/subscriptions   - list subscriptions (authed)
/// - GET  /api/timeline        - approved timeline entries (authed)
/// - GET  /api/feed-entries/:id - entry with reader view (authed)
/// - POST /api/login           - dev backdoor, only with DEBUG_ENDPOINTS
pub fn build_router(state: AppState) -> Router {
    let authed = Router::new()
        .route(
            "/api/subscriptions",
            post(subscriptions::create_subscription).get(subscriptions::list_subscriptions),
        )
        .route("/api/timeline", get(timeline::timeline))
        .route("/api/feed-entries/:id", get(entries::feed_entry))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            sessions::require_session,
        ));

    let mut router = Router::new()
        .route("/api/viewer", get(viewer::viewer))
        .route("/api/sso-login", get(auth::sso_login))
        .route("/api/sso-callback", get(auth::sso_callback))
        .route("/api/logout", get(auth::logout))
        .route(
            "/api/prompt",
            get(prompt::get_prompt).put(prompt::set_prompt),
        )
        .route("/api/prompt/precheck", post(prompt::precheck_prompt))
        .merge(authed);

    if state.config.debug_endpoints {
        router = router.route("/api/login", post(auth::debug_login));
    }

    if let Some(cors) = cors_layer(&state.config) {
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// CORS for the configured origin; absent configuration disables the layer.
fn cors_layer(config: &Config) -> Option<CorsLayer> {
    if config.cors_origin.is_empty() {
        return None;
    }

    let origin = match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(err) => {
            tracing::warn!(origin = %config.cors_origin, error = %err, "invalid CORS origin, skipping");
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]),
    )
}
