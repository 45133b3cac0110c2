use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};

use crawler_core::{
    MonitorSnapshot, QueueStatus, TaskAggregates, TaskId, TaskPolicy, TaskStatus, ThreadSnapshot,
    ThreadState,
};
use crawler_fetch::Fetcher;
use crawler_frontier::Frontier;
use crawler_robots::RobotsCache;
use crawler_storage::Store;

use crate::state::EngineState;

/// Runs one task's worker pool and monitor loop.
///
/// `Frontier` owns its own mutex over the queue and seen-set; `EngineState`
/// owns a second mutex over visited-URLs, aggregates, and the response-time
/// window. Splitting these is a deliberate departure from a single
/// do-everything lock: the two own disjoint data and are never both needed
/// by the same caller at once.
pub struct TaskEngine {
    pub(crate) task_id: TaskId,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) frontier: Arc<Frontier>,
    pub(crate) robots: Arc<RobotsCache>,
    pub(crate) fetcher: Arc<Fetcher>,
    pub(crate) policy: TaskPolicy,
    pub(crate) state: Mutex<EngineState>,
    pub(crate) threads: Vec<Mutex<ThreadSnapshot>>,
    pub(crate) stopped: AtomicBool,
    pub(crate) paused: AtomicBool,
    pub(crate) queue_paused: AtomicBool,
    pub(crate) snapshot_tx: watch::Sender<MonitorSnapshot>,
}

impl TaskEngine {
    /// Build an engine for `task_id` and spawn its worker pool plus monitor
    /// loop. `on_terminate` deregisters the task from the `Registry` once the
    /// monitor observes natural completion, without `TaskEngine` holding a
    /// back-reference to its `Registry`.
    pub fn start(
        task_id: TaskId,
        policy: TaskPolicy,
        starting_aggregates: TaskAggregates,
        queue_status: QueueStatus,
        store: Arc<dyn Store>,
        frontier: Arc<Frontier>,
        robots: Arc<RobotsCache>,
        fetcher: Arc<Fetcher>,
        monitor_interval: std::time::Duration,
        on_terminate: impl Fn(TaskId) + Send + Sync + 'static,
    ) -> Arc<Self> {
        let thread_count = policy.thread_count.max(1);
        let threads = (0..thread_count)
            .map(|id| {
                Mutex::new(ThreadSnapshot {
                    id,
                    status: ThreadState::Idle,
                    current_url: None,
                    completed: 0,
                    failed: 0,
                    bytes: 0,
                    speed: 0.0,
                })
            })
            .collect();

        let (snapshot_tx, _rx) = watch::channel(MonitorSnapshot {
            task_id,
            status: TaskStatus::Running,
            queue_status,
            progress: 0.0,
            total_urls: starting_aggregates.total_urls,
            processed: starting_aggregates.processed(),
            completed_urls: starting_aggregates.completed_urls,
            failed_urls: starting_aggregates.failed_urls,
            queue_size: 0,
            success_rate: starting_aggregates.success_rate,
            total_bytes: starting_aggregates.total_bytes,
            avg_response_time: starting_aggregates.avg_response_time,
            cross_domain_blocked: starting_aggregates.cross_domain_blocked,
            depth_blocked: starting_aggregates.depth_blocked,
            duplicate: starting_aggregates.duplicate,
            robots_blocked: starting_aggregates.robots_blocked,
            threads: Vec::new(),
        });

        let engine = Arc::new(Self {
            task_id,
            store,
            frontier,
            robots,
            fetcher,
            policy,
            state: Mutex::new(EngineState::new(starting_aggregates)),
            threads,
            stopped: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            queue_paused: AtomicBool::new(matches!(queue_status, QueueStatus::Paused)),
            snapshot_tx,
        });

        for worker_id in 0..thread_count {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run_worker(worker_id).await });
        }

        {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run_monitor(monitor_interval, on_terminate).await });
        }

        engine
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn set_queue_paused(&self, paused: bool) {
        self.queue_paused.store(paused, Ordering::SeqCst);
    }

    pub(crate) async fn set_thread_state(
        &self,
        worker_id: usize,
        status: ThreadState,
        current_url: Option<String>,
    ) {
        let mut snap = self.threads[worker_id].lock().await;
        snap.status = status;
        snap.current_url = current_url;
    }

    pub(crate) async fn record_thread_outcome(
        &self,
        worker_id: usize,
        completed: bool,
        bytes: u64,
        response_time_seconds: f64,
    ) {
        let mut snap = self.threads[worker_id].lock().await;
        if completed {
            snap.completed += 1;
            snap.bytes += bytes;
            snap.speed = if response_time_seconds > 0.0 {
                1.0 / response_time_seconds
            } else {
                0.0
            };
        } else {
            snap.failed += 1;
        }
        snap.status = ThreadState::Idle;
        snap.current_url = None;
    }

    pub(crate) async fn thread_snapshots(&self) -> Vec<ThreadSnapshot> {
        let mut out = Vec::with_capacity(self.threads.len());
        for t in &self.threads {
            out.push(t.lock().await.clone());
        }
        out
    }

}

pub(crate) fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}
