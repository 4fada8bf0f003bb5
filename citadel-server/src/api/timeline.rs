//! The timeline read endpoint.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use citadel_common::models::{TimelineEntriesArgs, TimelineStatus};
use citadel_common::DbTime;

use super::error::ApiResult;
use super::pagination::{clamp_pagination, PaginationMeta};
use super::server::AppState;
use super::sessions::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    feed_id: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TimelineResp {
    pub items: Vec<TimelineItem>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize)]
pub struct TimelineItem {
    pub entry_id: String,
    pub feed_name: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub publish_date: Option<DbTime>,
}

/// GET /api/timeline: approved entries, newest first, optionally scoped to a
/// feed.
pub async fn timeline(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Query(query): Query<TimelineQuery>,
) -> ApiResult<Json<TimelineResp>> {
    let (limit, offset) = clamp_pagination(query.limit, query.offset);

    let args = TimelineEntriesArgs {
        status: Some(TimelineStatus::Approved),
        feed_id: query.feed_id.filter(|id| !id.is_empty()),
        limit,
        offset,
    };

    let total = state.store.count_timeline_entries(&args).await?;
    let timeline_entries = state.store.timeline_entries(&args).await?;

    let feed_entry_ids: Vec<String> = timeline_entries
        .iter()
        .map(|entry| entry.feed_entry_id.clone())
        .collect();
    let feed_entries = state.store.entries(&feed_entry_ids).await?;

    let feed_ids: Vec<String> = feed_entries
        .iter()
        .map(|entry| entry.feed_id.clone())
        .collect();
    let feeds = state.store.feeds(&feed_ids).await?;

    let feeds_by_id: HashMap<&str, _> = feeds.iter().map(|feed| (feed.id.as_str(), feed)).collect();
    let feed_entries_by_id: HashMap<&str, _> = feed_entries
        .iter()
        .map(|entry| (entry.id.as_str(), entry))
        .collect();

    let mut items = Vec::with_capacity(timeline_entries.len());
    for timeline_entry in &timeline_entries {
        let Some(feed_entry) = feed_entries_by_id.get(timeline_entry.feed_entry_id.as_str()) else {
            continue;
        };
        let feed_name = feeds_by_id
            .get(feed_entry.feed_id.as_str())
            .and_then(|feed| feed.title.clone())
            .unwrap_or_default();

        items.push(TimelineItem {
            entry_id: feed_entry.id.clone(),
            feed_name,
            title: feed_entry.title.clone(),
            description: feed_entry.description.clone(),
            url: feed_entry.link.clone(),
            publish_date: feed_entry.publish_time,
        });
    }

    Ok(Json(TimelineResp {
        items,
        pagination: PaginationMeta {
            limit,
            offset,
            total,
        },
    }))
}
