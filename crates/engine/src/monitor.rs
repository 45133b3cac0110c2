use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crawler_core::{MonitorSnapshot, QueueStatus, TaskAggregates, TaskStatus};

use crate::engine::TaskEngine;

/// Consecutive empty-and-idle ticks required before a task is declared
/// naturally completed (empty frontier and all workers idle), debounced
/// over a few ticks to avoid racing a worker that is between pop and admit.
const TERMINATION_DEBOUNCE_TICKS: u32 = 3;

impl TaskEngine {
    pub(crate) async fn run_monitor(
        self: Arc<Self>,
        interval: Duration,
        on_terminate: impl Fn(crawler_core::TaskId) + Send + Sync + 'static,
    ) {
        let mut idle_ticks = 0u32;

        loop {
            tokio::time::sleep(interval).await;

            if self.stopped.load(Ordering::SeqCst) {
                break;
            }

            let (snapshot, aggregates) = self.build_snapshot(TaskStatus::Running).await;
            let _ = self.store.update_aggregates(self.task_id, &aggregates).await;
            let _ = self.snapshot_tx.send(snapshot.clone());

            let frontier_empty = snapshot.queue_size == 0;
            let all_idle = snapshot.threads.iter().all(|t| {
                matches!(
                    t.status,
                    crawler_core::ThreadState::Idle | crawler_core::ThreadState::Stopped
                )
            });

            if frontier_empty && all_idle && snapshot.total_urls > 0 {
                idle_ticks += 1;
            } else {
                idle_ticks = 0;
            }

            if idle_ticks >= TERMINATION_DEBOUNCE_TICKS {
                tracing::info!(task_id = self.task_id, "task completed naturally");
                self.stopped.store(true, Ordering::SeqCst);
                let _ = self
                    .store
                    .update_task_status(self.task_id, TaskStatus::Completed)
                    .await;
                let (final_snapshot, _) = self.build_snapshot(TaskStatus::Completed).await;
                let _ = self.snapshot_tx.send(final_snapshot);
                on_terminate(self.task_id);
                return;
            }
        }

        on_terminate(self.task_id);
    }

    /// Compute the current snapshot and a copy of the aggregates backing it,
    /// recomputing `progress` from the live frontier size.
    pub(crate) async fn build_snapshot(
        &self,
        status: TaskStatus,
    ) -> (MonitorSnapshot, TaskAggregates) {
        let queue_size = self.frontier.size().await;
        let threads = self.thread_snapshots().await;
        let queue_status = if self.queue_paused.load(Ordering::SeqCst) {
            QueueStatus::Paused
        } else {
            QueueStatus::Active
        };

        let aggregates = {
            let mut state = self.state.lock().await;
            state.aggregates.progress = if state.aggregates.total_urls == 0 {
                0.0
            } else if queue_size == 0 {
                100.0
            } else {
                (state.aggregates.processed() as f64 / state.aggregates.total_urls.max(1) as f64)
                    * 100.0
            };
            state.aggregates.clone()
        };

        let snapshot = MonitorSnapshot {
            task_id: self.task_id,
            status,
            queue_status,
            progress: aggregates.progress,
            total_urls: aggregates.total_urls,
            processed: aggregates.processed(),
            completed_urls: aggregates.completed_urls,
            failed_urls: aggregates.failed_urls,
            queue_size,
            success_rate: aggregates.success_rate,
            total_bytes: aggregates.total_bytes,
            avg_response_time: aggregates.avg_response_time,
            cross_domain_blocked: aggregates.cross_domain_blocked,
            depth_blocked: aggregates.depth_blocked,
            duplicate: aggregates.duplicate,
            robots_blocked: aggregates.robots_blocked,
            threads,
        };

        (snapshot, aggregates)
    }
}
