//! Named interval schedules.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Specification for a recurring trigger.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub id: &'static str,
    pub every: Duration,
    /// Whether the first tick fires at registration instead of one interval
    /// later.
    pub fire_immediately: bool,
}

/// Owns the schedule loops. Registration is idempotent: registering an ID
/// that already exists replaces the old loop with the new spec.
pub struct Scheduler {
    cancel: CancellationToken,
    jobs: Mutex<HashMap<&'static str, JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            cancel: CancellationToken::new(),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Register (or update) the schedule, driving `tick` at the configured
    /// interval until shutdown.
    pub async fn register<F, Fut>(&self, schedule: Schedule, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.child_token();
        let handle = tokio::spawn(async move {
            if !schedule.fire_immediately {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(schedule.every) => {}
                }
            }

            loop {
                tracing::debug!(schedule_id = schedule.id, "schedule fired");
                tick().await;

                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(schedule.every) => {}
                }
            }
        });

        let mut jobs = self.jobs.lock().await;
        if let Some(previous) = jobs.insert(schedule.id, handle) {
            previous.abort();
            tracing::debug!(schedule_id = schedule.id, "replaced existing schedule");
        } else {
            tracing::info!(
                schedule_id = schedule.id,
                interval_secs = schedule.every.as_secs(),
                "registered schedule"
            );
        }
    }

    /// Stop all schedule loops. In-flight ticks finish on their own.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
