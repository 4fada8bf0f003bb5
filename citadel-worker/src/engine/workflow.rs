//! Singleton workflow executions.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Tracks running workflow executions by workflow ID.
///
/// `start_singleton` gives fixed-ID scheduling with terminate-if-running
/// reuse: a still-live execution under the same ID is aborted before the new
/// one is spawned. Workflows are detached once started, so callers observe
/// "started", not "completed".
pub struct WorkflowHost {
    running: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl WorkflowHost {
    pub fn new() -> Self {
        WorkflowHost {
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Start `workflow` under `workflow_id`, preempting any live execution
    /// with the same ID. Returns once the new execution has been spawned.
    pub async fn start_singleton<F>(&self, workflow_id: &str, workflow: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.running.lock().await;
        if let Some(existing) = running.remove(workflow_id) {
            if !existing.is_finished() {
                existing.abort();
                tracing::debug!(workflow_id, "terminated running workflow execution");
            }
        }

        tracing::debug!(workflow_id, "starting workflow execution");
        running.insert(workflow_id.to_string(), tokio::spawn(workflow));
    }

    /// Whether an execution under `workflow_id` is still live.
    pub async fn is_running(&self, workflow_id: &str) -> bool {
        let running = self.running.lock().await;
        running
            .get(workflow_id)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Give in-flight executions up to `grace` to finish, then abort the
    /// stragglers.
    pub async fn shutdown(&self, grace: Duration) {
        let handles: Vec<(String, JoinHandle<()>)> = {
            let mut running = self.running.lock().await;
            running.drain().collect()
        };

        for (workflow_id, handle) in handles {
            let abort = handle.abort_handle();
            if tokio::time::timeout(grace, handle).await.is_err() {
                tracing::warn!(workflow_id, "workflow did not finish in time, aborting");
                abort.abort();
            }
        }
    }
}

impl Default for WorkflowHost {
    fn default() -> Self {
        Self::new()
    }
}
