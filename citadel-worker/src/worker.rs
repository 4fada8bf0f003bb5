//! Worker assembly: wires the activity layer to the engine and registers the
//! recurring schedules.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::activities::Activities;
use crate::engine::{Schedule, Scheduler, WorkflowHost};
use crate::workflows::Workflows;

pub const SYNC_ALL_SCHEDULE_ID: &str = "sync_all";
pub const REFRESH_TIMELINES_SCHEDULE_ID: &str = "refresh_timelines";

const SCHEDULE_INTERVAL: Duration = Duration::from_secs(15 * 60);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The background worker: owns the scheduler and the workflow host.
pub struct Worker {
    workflows: Workflows,
    scheduler: Scheduler,
    host: Arc<WorkflowHost>,
}

impl Worker {
    pub fn new(activities: Activities) -> Self {
        let host = Arc::new(WorkflowHost::new());
        let workflows = Workflows::new(Arc::new(activities), host.clone());

        Worker {
            workflows,
            scheduler: Scheduler::new(),
            host,
        }
    }

    /// A handle for triggering workflows from elsewhere (the HTTP API).
    pub fn workflows(&self) -> Workflows {
        self.workflows.clone()
    }

    /// Register the recurring schedules. Safe to call again; an existing
    /// schedule is replaced with the current spec. The feed sync fires
    /// immediately, the timeline refresh waits out its first interval.
    pub async fn start(&self) {
        let workflows = self.workflows.clone();
        self.scheduler
            .register(
                Schedule {
                    id: SYNC_ALL_SCHEDULE_ID,
                    every: SCHEDULE_INTERVAL,
                    fire_immediately: true,
                },
                move || {
                    let workflows = workflows.clone();
                    async move { workflows.sync_all_feeds().await }
                },
            )
            .await;

        let workflows = self.workflows.clone();
        self.scheduler
            .register(
                Schedule {
                    id: REFRESH_TIMELINES_SCHEDULE_ID,
                    every: SCHEDULE_INTERVAL,
                    fire_immediately: false,
                },
                move || {
                    let workflows = workflows.clone();
                    async move { workflows.start_refresh_timeline().await }
                },
            )
            .await;

        info!("worker started");
    }

    /// Stop the schedules, then give in-flight workflows a grace period.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown();
        self.host.shutdown(SHUTDOWN_GRACE).await;
        info!("worker stopped");
    }
}
