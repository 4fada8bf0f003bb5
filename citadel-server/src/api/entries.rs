//! Single feed entry with its reader view.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;

use citadel_common::DbTime;

use super::error::ApiResult;
use super::server::AppState;
use super::sessions::CurrentUser;

#[derive(Debug, Serialize)]
pub struct FeedEntryResp {
    pub id: String,
    pub feed_id: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub created_at: DbTime,
    pub reader_content: String,
}

/// GET /api/feed-entries/:id: the stored entry plus a server-side extracted
/// readable view of the linked article.
pub async fn feed_entry(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Path(feed_entry_id): Path<String>,
) -> ApiResult<Json<FeedEntryResp>> {
    let entry = state.store.entry(&feed_entry_id).await?;

    let reader_content = state.reader.readable_content(&entry.id, &entry.link).await?;

    Ok(Json(FeedEntryResp {
        id: entry.id,
        feed_id: entry.feed_id,
        url: entry.link,
        title: entry.title,
        description: entry.description,
        created_at: entry.created_at,
        reader_content,
    }))
}
