//! The viewer endpoint: who is logged in and what they subscribe to.

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Serialize;

use citadel_common::{DbTime, Error};

use super::error::ApiResult;
use super::server::AppState;
use super::sessions;

/// Structured data about the current user for the frontend.
#[derive(Debug, Serialize)]
pub struct Viewer {
    pub user_id: String,
    pub email: String,
    pub created_at: DbTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Keyed by feed ID; feeds the nav bar's per-feed filters.
    pub subscriptions: HashMap<String, ViewerSubscription>,
}

#[derive(Debug, Serialize)]
pub struct ViewerSubscription {
    pub name: String,
    pub feed_id: String,
    pub description: String,
}

/// GET /api/viewer. Anonymous (or stale) sessions get an empty object, not
/// an error.
pub async fn viewer(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> ApiResult<Json<serde_json::Value>> {
    let session = sessions::session(&jar);
    if session.user_id.is_empty() {
        return Ok(Json(serde_json::json!({})));
    }

    let user = match state.store.user(&session.user_id).await {
        Ok(user) => user,
        Err(Error::NotFound(_)) => return Ok(Json(serde_json::json!({}))),
        Err(err) => return Err(err.into()),
    };

    let subscriptions = state.store.user_subscriptions(&user.id).await?;
    let feed_ids: Vec<String> = subscriptions.iter().map(|sub| sub.feed_id.clone()).collect();
    let feeds = state.store.feeds(&feed_ids).await?;

    let mut viewer_subscriptions = HashMap::with_capacity(feeds.len());
    for feed in feeds {
        viewer_subscriptions.insert(
            feed.id.clone(),
            ViewerSubscription {
                name: feed.title.unwrap_or_default(),
                feed_id: feed.id,
                description: feed.description.unwrap_or_default(),
            },
        );
    }

    let prompt = state.store.active_prompt().await?.map(|p| p.content);

    let viewer = Viewer {
        user_id: user.id,
        email: user.email,
        created_at: user.created_at,
        prompt,
        subscriptions: viewer_subscriptions,
    };

    Ok(Json(serde_json::to_value(viewer).map_err(|err| {
        Error::Internal(format!("error encoding viewer: {err}"))
    })?))
}
