//! The activity layer.
//!
//! Each activity is one idempotent unit of work the engine may deliver more
//! than once: a read, a conditional upsert, or an absorbing status write.
//! Domain errors are translated into tagged [`ActivityError`]s at this
//! boundary so workflows can branch on retryability.

use std::collections::HashMap;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{debug, info, warn};

use citadel_common::db::retry::retry_on_lock;
use citadel_common::db::Store;
use citadel_common::models::{Prompt, TimelineEntriesArgs, TimelineStatus, UpdateFeedArgs};
use citadel_common::DbTime;

use crate::engine::ActivityError;
use crate::fetch::Fetcher;
use crate::judge::ClaudeClient;

/// How long a successful sync shields a feed from recency-respecting syncs.
const SYNC_RECENCY_WINDOW_HOURS: i64 = 1;

/// Cap on rows pulled into one judgement batch.
const JUDGEMENT_BATCH_LIMIT: i64 = 20;

/// Budget for waiting out writer lock contention.
const LOCK_WAIT_MS: u64 = 5000;

/// Approval decisions keyed by timeline entry ID.
pub type Judgements = HashMap<String, bool>;

/// Holds everything activities touch: the store, the fetch client, and the
/// judgement client (absent when no API key is configured).
pub struct Activities {
    store: Store,
    fetcher: Fetcher,
    claude: Option<ClaudeClient>,
}

impl Activities {
    pub fn new(store: Store, fetcher: Fetcher, claude: Option<ClaudeClient>) -> Self {
        Activities {
            store,
            fetcher,
            claude,
        }
    }

    pub async fn count_all_feeds(&self) -> Result<i64, ActivityError> {
        Ok(self.store.count_all_feeds().await?)
    }

    pub async fn feed_id_page(&self, offset: i64, limit: i64) -> Result<Vec<String>, ActivityError> {
        Ok(self.store.feed_ids(offset, limit).await?)
    }

    /// Fetch a feed and fold the result into the store: metadata update, then
    /// entry upsert. Both halves are idempotent, so a crash between them
    /// leaves a state the next run repairs.
    ///
    /// With `ignore_recency` unset, a feed synced within the last hour is
    /// skipped without work.
    pub async fn sync_feed(&self, feed_id: &str, ignore_recency: bool) -> Result<(), ActivityError> {
        info!(feed_id, "syncing feed");

        let feed = self.store.feed(feed_id).await?;

        if !ignore_recency {
            if let Some(last_synced) = feed.last_synced_at {
                let age = Utc::now() - last_synced.0;
                if age < ChronoDuration::hours(SYNC_RECENCY_WINDOW_HOURS) {
                    debug!(feed_id, "feed synced recently, skipping");
                    return Ok(());
                }
            }
        }

        let fetched = self.fetcher.fetch(&feed.id, &feed.url).await?;

        self.store
            .update_feed(
                &feed.id,
                UpdateFeedArgs {
                    title: non_empty(fetched.delta.title),
                    description: non_empty(fetched.delta.description),
                    last_synced: Some(DbTime::now()),
                },
            )
            .await?;

        retry_on_lock("insert feed entries", LOCK_WAIT_MS, || {
            self.store.insert_entries(&fetched.entries)
        })
        .await?;

        debug!(feed_id, entries = fetched.entries.len(), "feed synced");
        Ok(())
    }

    /// Insert a feed row for the URL, or return the existing one. Never fails
    /// on an already-known URL.
    pub async fn create_feed(&self, feed_url: &str) -> Result<String, ActivityError> {
        match self.store.insert_feed(feed_url).await {
            Ok(feed) => {
                debug!(feed_id = %feed.id, "inserted feed");
                Ok(feed.id)
            }
            Err(err) if matches!(err, citadel_common::Error::Conflict(_)) => {
                let feed = self.store.feed_by_url(feed_url).await?;
                Ok(feed.id)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Compensation for a failed create-and-sync saga.
    pub async fn remove_feed(&self, feed_id: &str) -> Result<(), ActivityError> {
        self.store.delete_feed(feed_id).await?;
        Ok(())
    }

    /// Fan entries of subscribed feeds out into timelines. Returns how many
    /// rows were actually inserted.
    pub async fn insert_missing_timeline_entries(&self) -> Result<u64, ActivityError> {
        let missing = self.store.missing_entries(None).await?;
        info!(missing = missing.len(), "searched for missing timeline entries");

        let mut inserted = 0u64;
        for entry in &missing {
            let wrote = self
                .store
                .insert_timeline_entry(&entry.user_id, &entry.feed_id, &entry.feed_entry_id)
                .await?;
            if wrote {
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    pub async fn count_entries_needing_judgement(&self) -> Result<i64, ActivityError> {
        let args = TimelineEntriesArgs {
            status: Some(TimelineStatus::RequiresJudgement),
            ..Default::default()
        };
        Ok(self.store.count_timeline_entries(&args).await?)
    }

    pub async fn active_prompt(&self) -> Result<Option<Prompt>, ActivityError> {
        Ok(self.store.active_prompt().await?)
    }

    /// Pull one batch of entries needing judgement and judge them.
    ///
    /// With no active prompt every entry is auto-approved without a model
    /// call. With one, the batch goes to Claude and the verdicts are mapped
    /// back to timeline entry IDs; entries the model dropped are rejected.
    pub async fn judge_entries(&self) -> Result<Judgements, ActivityError> {
        let entries = self
            .store
            .entries_needing_judgement(None, JUDGEMENT_BATCH_LIMIT)
            .await?;
        info!(count = entries.len(), "judging entries");

        if entries.is_empty() {
            return Ok(Judgements::new());
        }

        let Some(prompt) = self.store.active_prompt().await? else {
            let judgements = entries
                .iter()
                .map(|entry| (entry.id.clone(), true))
                .collect();
            debug!("no active prompt, auto-approving batch");
            return Ok(judgements);
        };

        let mut feed_entry_ids = Vec::with_capacity(entries.len());
        let mut timeline_by_feed_entry = HashMap::with_capacity(entries.len());
        for entry in &entries {
            feed_entry_ids.push(entry.feed_entry_id.clone());
            timeline_by_feed_entry.insert(entry.feed_entry_id.clone(), entry.id.clone());
        }

        let feed_entries = self.store.entries(&feed_entry_ids).await?;
        let payload = serde_json::to_string(&feed_entries)
            .map_err(|err| ActivityError::internal(format!("error encoding entries: {err}")))?;

        let claude = self
            .claude
            .as_ref()
            .ok_or_else(|| ActivityError::internal("no claude api key configured"))?;
        let verdicts = claude.judge(&prompt.content, &payload).await?;

        let mut judgements = Judgements::with_capacity(entries.len());
        for verdict in verdicts {
            match timeline_by_feed_entry.get(&verdict.feed_entry_id) {
                Some(timeline_entry_id) => {
                    judgements.insert(timeline_entry_id.clone(), verdict.approved);
                }
                None => warn!(
                    feed_entry_id = %verdict.feed_entry_id,
                    "judgement for unknown feed entry, dropping"
                ),
            }
        }

        // Entries the model failed to rule on are rejected rather than left
        // to be re-judged forever.
        for entry in &entries {
            if !judgements.contains_key(&entry.id) {
                warn!(
                    timeline_entry_id = %entry.id,
                    "entry missing from judgement response, rejecting"
                );
                judgements.insert(entry.id.clone(), false);
            }
        }

        Ok(judgements)
    }

    /// Apply judgements. The store guard keeps terminal statuses absorbing,
    /// so replays are no-ops.
    pub async fn mark_entries_as_judged(&self, judgements: &Judgements) -> Result<(), ActivityError> {
        for (timeline_entry_id, approved) in judgements {
            let status = if *approved {
                TimelineStatus::Approved
            } else {
                TimelineStatus::Rejected
            };
            self.store
                .update_timeline_entry(timeline_entry_id, status)
                .await?;
        }

        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
