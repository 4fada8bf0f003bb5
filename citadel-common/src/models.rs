//! Domain models persisted by the store.

use serde::{Deserialize, Serialize};

use crate::time::DbTime;

/// A syndication feed the system knows about.
///
/// `title` and `description` stay empty until the first successful sync
/// fills them from the channel metadata.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feed {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub last_synced_at: Option<DbTime>,
    pub created_at: DbTime,
    pub updated_at: DbTime,
}

/// A unique entry in a feed, deduplicated globally by `guid`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeedEntry {
    pub id: String,
    pub feed_id: String,
    pub guid: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub publish_time: Option<DbTime>,
    pub created_at: DbTime,
}

/// A normalized entry produced by a fetch, before it has been assigned an ID.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeedEntry {
    pub feed_id: String,
    pub guid: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub publish_time: Option<DbTime>,
}

/// Feed-level metadata extracted from a fetch, applied on sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedDelta {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub github_id: String,
    pub email: String,
    pub created_at: DbTime,
    pub updated_at: DbTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub feed_id: String,
    pub created_at: DbTime,
}

/// Curation state of a timeline entry.
///
/// Entries are born `RequiresJudgement` and transition exactly once to
/// `Approved` or `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TimelineStatus {
    RequiresJudgement,
    Approved,
    Rejected,
}

/// A per-user materialization of a feed entry.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TimelineEntry {
    pub id: String,
    pub user_id: String,
    pub feed_id: String,
    pub feed_entry_id: String,
    pub status: TimelineStatus,
    pub created_at: DbTime,
}

/// A (user, feed entry) pair owed a timeline entry that does not have one yet.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MissingEntry {
    pub feed_entry_id: String,
    pub feed_id: String,
    pub user_id: String,
}

/// A curation prompt. At most one row is active at a time.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Prompt {
    pub id: String,
    pub content: String,
    pub active: bool,
    pub created_at: DbTime,
}

/// Optional fields for a partial feed update; `None` leaves the column alone.
#[derive(Debug, Clone, Default)]
pub struct UpdateFeedArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub last_synced: Option<DbTime>,
}

/// Filters for listing and counting timeline entries.
#[derive(Debug, Clone, Default)]
pub struct TimelineEntriesArgs {
    pub status: Option<TimelineStatus>,
    pub feed_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}
