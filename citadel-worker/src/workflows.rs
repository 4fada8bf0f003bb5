//! Deterministic orchestrators for the four pipelines.
//!
//! Workflows only compose activities; all I/O and clock reads live behind
//! the activity layer, and every step is idempotent so a rerun from the top
//! converges on the same state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::activities::Activities;
use crate::engine::{self, ActivityError, ActivityOptions, ErrorTag, RetryPolicy, WorkflowHost};

/// Singleton workflow IDs: at most one live execution of each, and a new
/// trigger preempts the old one.
pub const REFRESH_TIMELINE_WORKFLOW_ID: &str = "refresh-timeline";
pub const JUDGE_TIMELINE_WORKFLOW_ID: &str = "judge-timeline";

/// Feeds synced per page of the sync-all fan-out.
const SYNC_BATCH_SIZE: i64 = 50;

/// Entries judged per loop; matches the judgement activity's batch pull.
const JUDGEMENT_BATCH_SIZE: i64 = 20;

/// Bound on judgement loops per run, to cap model spend.
const MAX_JUDGEMENT_LOOPS: i64 = 3;

/// Options for store and fetch activities.
fn db_activity_options() -> ActivityOptions {
    ActivityOptions {
        start_to_close_timeout: Duration::from_secs(3),
        retry_policy: RetryPolicy {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_attempts: 3,
        },
        non_retryable: &[],
    }
}

/// Options for the model call: long per-attempt budget, long backoff for
/// rate limits, and no retries on internal errors.
fn judge_activity_options() -> ActivityOptions {
    ActivityOptions {
        start_to_close_timeout: Duration::from_secs(30),
        retry_policy: RetryPolicy {
            initial_interval: Duration::from_secs(60),
            backoff_coefficient: 2.0,
            maximum_attempts: 3,
        },
        non_retryable: &[ErrorTag::Internal],
    }
}

/// `min(3, n/20 + 1)` judgement loops for `n` pending entries.
fn judgement_loops(pending: i64) -> i64 {
    MAX_JUDGEMENT_LOOPS.min(pending / JUDGEMENT_BATCH_SIZE + 1)
}

/// The workflow surface. Cheap to clone; clones share the activity layer and
/// the singleton host.
#[derive(Clone)]
pub struct Workflows {
    activities: Arc<Activities>,
    host: Arc<WorkflowHost>,
}

impl Workflows {
    pub fn new(activities: Arc<Activities>, host: Arc<WorkflowHost>) -> Self {
        Workflows { activities, host }
    }

    pub fn host(&self) -> &WorkflowHost {
        &self.host
    }

    /// Sync every feed: count, page through IDs in batches, and fan a sync
    /// task out per feed. Per-feed failures are logged and absorbed.
    pub async fn sync_all_feeds(&self) {
        let options = db_activity_options();

        let count = match engine::execute("count all feeds", &options, || {
            self.activities.count_all_feeds()
        })
        .await
        {
            Ok(count) => count,
            Err(err) => {
                error!(error = %err, "failed to count feeds");
                return;
            }
        };

        let batches = (count + SYNC_BATCH_SIZE - 1) / SYNC_BATCH_SIZE;
        info!(feeds = count, batches, "syncing all feeds");

        let mut tasks = JoinSet::new();
        for batch in 0..batches {
            let offset = batch * SYNC_BATCH_SIZE;
            let page = match engine::execute("feed id page", &options, || {
                self.activities.feed_id_page(offset, SYNC_BATCH_SIZE)
            })
            .await
            {
                Ok(page) => page,
                Err(err) => {
                    error!(batch, error = %err, "failed to fetch feed id page");
                    continue;
                }
            };

            for feed_id in page {
                let activities = self.activities.clone();
                tasks.spawn(async move {
                    let result = engine::execute("sync feed", &db_activity_options(), || {
                        activities.sync_feed(&feed_id, true)
                    })
                    .await;
                    if let Err(err) = result {
                        warn!(feed_id = %feed_id, error = %err, "failed to sync feed");
                    }
                });
            }
        }

        while tasks.join_next().await.is_some() {}
        info!("sync all feeds complete");
    }

    /// The create-feed saga: insert (idempotent on URL), sync once, and on
    /// sync failure compensate by removing the feed so the caller can retry
    /// with a corrected URL. On success the timeline refresh child is
    /// started, not awaited, so the API ack stays fast.
    ///
    /// Returns the feed ID.
    pub async fn create_feed(&self, feed_url: &str) -> Result<String, ActivityError> {
        let options = db_activity_options();

        let feed_id = engine::execute("create feed", &options, || {
            self.activities.create_feed(feed_url)
        })
        .await?;

        if let Err(sync_err) = engine::execute("sync feed", &options, || {
            self.activities.sync_feed(&feed_id, false)
        })
        .await
        {
            error!(feed_id = %feed_id, error = %sync_err, "failed to sync feed, removing it");

            if let Err(remove_err) = engine::execute("remove feed", &options, || {
                self.activities.remove_feed(&feed_id)
            })
            .await
            {
                error!(feed_id = %feed_id, error = %remove_err, "failed to remove feed");
                return Err(remove_err);
            }

            return Err(sync_err);
        }

        self.start_refresh_timeline().await;

        Ok(feed_id)
    }

    /// Start the timeline refresh as the `refresh-timeline` singleton,
    /// preempting any execution already running.
    pub async fn start_refresh_timeline(&self) {
        let workflow = self.clone();
        self.host
            .start_singleton(REFRESH_TIMELINE_WORKFLOW_ID, async move {
                workflow.refresh_timeline().await;
            })
            .await;
    }

    /// Materialize owed timeline entries; when anything was inserted, hand
    /// off to the judgement singleton.
    pub async fn refresh_timeline(&self) {
        let inserted = match engine::execute(
            "insert missing timeline entries",
            &db_activity_options(),
            || self.activities.insert_missing_timeline_entries(),
        )
        .await
        {
            Ok(inserted) => inserted,
            Err(err) => {
                error!(error = %err, "failed to insert missing timeline entries");
                return;
            }
        };

        info!(inserted, "timeline refresh complete");
        if inserted == 0 {
            return;
        }

        self.start_judge_timeline().await;
    }

    /// Start judgement as the `judge-timeline` singleton.
    pub async fn start_judge_timeline(&self) {
        let workflow = self.clone();
        self.host
            .start_singleton(JUDGE_TIMELINE_WORKFLOW_ID, async move {
                workflow.judge_timeline().await;
            })
            .await;
    }

    /// Judge pending entries in bounded batches: count, then up to
    /// `min(3, n/20 + 1)` judge-and-mark rounds.
    pub async fn judge_timeline(&self) {
        let pending = match engine::execute(
            "count entries needing judgement",
            &db_activity_options(),
            || self.activities.count_entries_needing_judgement(),
        )
        .await
        {
            Ok(pending) => pending,
            Err(err) => {
                error!(error = %err, "failed to count entries needing judgement");
                return;
            }
        };

        if pending == 0 {
            return;
        }

        let loops = judgement_loops(pending);
        info!(pending, loops, "judging timeline entries");

        for round in 0..loops {
            let judgements = match engine::execute("judge entries", &judge_activity_options(), || {
                self.activities.judge_entries()
            })
            .await
            {
                Ok(judgements) => judgements,
                Err(err) => {
                    error!(round, error = %err, "failed to judge entries");
                    return;
                }
            };

            if judgements.is_empty() {
                return;
            }

            if let Err(err) = engine::execute("mark entries as judged", &db_activity_options(), || {
                self.activities.mark_entries_as_judged(&judgements)
            })
            .await
            {
                error!(round, error = %err, "failed to mark entries as judged");
                return;
            }
        }
    }
}
