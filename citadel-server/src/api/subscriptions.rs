//! Subscription management.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use citadel_common::models::Feed;
use citadel_common::{DbTime, Error};

use super::error::ApiResult;
use super::server::AppState;
use super::sessions::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct PostSubscriptionReq {
    #[serde(default)]
    feed_url: String,
}

#[derive(Debug, Serialize)]
pub struct FeedResp {
    pub id: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub last_synced_at: Option<DbTime>,
    pub created_at: DbTime,
    pub updated_at: DbTime,
}

impl From<Feed> for FeedResp {
    fn from(feed: Feed) -> Self {
        FeedResp {
            id: feed.id,
            title: feed.title.unwrap_or_default(),
            url: feed.url,
            description: feed.description.unwrap_or_default(),
            last_synced_at: feed.last_synced_at,
            created_at: feed.created_at,
            updated_at: feed.updated_at,
        }
    }
}

/// POST /api/subscriptions: run the create-and-validate saga, then subscribe
/// the caller to the resulting feed.
pub async fn create_subscription(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<PostSubscriptionReq>,
) -> ApiResult<(StatusCode, Json<FeedResp>)> {
    if body.feed_url.is_empty() {
        return Err(Error::invalid("feed_url is required")
            .with_detail("feed_url", "is required")
            .into());
    }

    // The workflow owns creation, first sync, and compensation; a failure
    // here carries the original domain status.
    let feed_id = state.workflows.create_feed(&body.feed_url).await?;

    let feed = state.store.feed(&feed_id).await?;
    state.store.create_subscription(&user.0, &feed.id).await?;

    Ok((StatusCode::CREATED, Json(FeedResp::from(feed))))
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResp {
    pub id: String,
    pub feed_id: String,
    pub created_at: DbTime,
    pub feed_name: String,
    pub feed_description: String,
    pub last_synced: Option<DbTime>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionListResp {
    pub subscriptions: Vec<SubscriptionResp>,
}

/// GET /api/subscriptions: the caller's subscriptions with feed metadata.
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<(StatusCode, Json<SubscriptionListResp>)> {
    let subscriptions = state.store.user_subscriptions(&user.0).await?;

    let mut resp = SubscriptionListResp {
        subscriptions: Vec::with_capacity(subscriptions.len()),
    };
    for subscription in subscriptions {
        let feed = state.store.feed(&subscription.feed_id).await?;
        resp.subscriptions.push(SubscriptionResp {
            id: subscription.id,
            feed_id: subscription.feed_id,
            created_at: subscription.created_at,
            feed_name: feed.title.unwrap_or_default(),
            feed_description: feed.description.unwrap_or_default(),
            last_synced: feed.last_synced_at,
        });
    }

    Ok((StatusCode::CREATED, Json(resp)))
}
