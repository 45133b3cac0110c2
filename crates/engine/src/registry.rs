use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crawler_core::{
    CrawlError, EngineConfig, FetchConfig, QueueStatus, TaskId, TaskPolicy, TaskStatus,
};
use crawler_fetch::Fetcher;
use crawler_frontier::Frontier;
use crawler_robots::RobotsCache;
use crawler_storage::{aggregates_from_records, Store};

use crate::engine::TaskEngine;

/// Process-wide map of active tasks to their running engines, and the
/// control operations a CLI/control surface drives.
///
/// Control operations that target a task with no running engine still touch
/// the `Store` directly where that matters (e.g. `stop` always records
/// `stopped`, even against a desynced task with no in-memory engine) rather
/// than failing outright.
pub struct Registry {
    store: Arc<dyn Store>,
    fetcher: Arc<Fetcher>,
    robots: Arc<RobotsCache>,
    monitor_interval: Duration,
    tasks: Mutex<HashMap<TaskId, Arc<TaskEngine>>>,
}

impl Registry {
    pub fn new(config: &EngineConfig, store: Arc<dyn Store>) -> Result<Self, CrawlError> {
        let fetch_config = FetchConfig {
            user_agent: config.fetch.user_agent.clone(),
            connect_timeout: Duration::from_secs(config.fetch.connect_timeout_seconds),
            read_timeout: Duration::from_secs(config.fetch.read_timeout_seconds),
            max_body_bytes: config.fetch.max_body_mb * 1024 * 1024,
        };
        let fetcher = Arc::new(Fetcher::new(fetch_config)?);
        let robots = Arc::new(RobotsCache::new(config.fetch.user_agent.clone()));

        Ok(Self {
            store,
            fetcher,
            robots,
            monitor_interval: Duration::from_secs(config.general.monitor_interval_seconds),
            tasks: Mutex::new(HashMap::new()),
        })
    }

    pub async fn create_task(&self, policy: TaskPolicy) -> Result<TaskId, CrawlError> {
        let task = self.store.create_task(policy).await?;
        Ok(task.id)
    }

    /// Start (or resume from a terminal state) a task's worker pool.
    /// Errors if the task is already active in this process.
    pub async fn start(self: &Arc<Self>, task_id: TaskId) -> Result<(), CrawlError> {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&task_id) {
            return Err(CrawlError::TaskAlreadyActive(task_id));
        }

        let task = self.store.get_task(task_id).await?;

        let is_terminal = matches!(
            task.status,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Stopped
        );
        if is_terminal {
            // Clears prior URL records along with the aggregates they backed:
            // starting a finished task re-crawls from the seed rather than
            // resuming a stale frontier.
            self.store.reset_task_aggregates(task_id).await?;
        }

        let frontier = Arc::new(Frontier::new());
        let aggregates = if task.status == TaskStatus::Pending || is_terminal {
            let seed = crawler_core::UrlRecord::pending(task_id, task.policy.seed_url.clone(), 0);
            self.store.insert_url_record(&seed).await?;
            frontier
                .admit(task.policy.seed_url.clone(), 0, 0)
                .await;
            crawler_core::TaskAggregates {
                total_urls: 1,
                ..Default::default()
            }
        } else {
            // Crash recovery for a task left `running` with no in-memory
            // engine: rebuild aggregates and the frontier from what is
            // already durable, instead of re-seeding from scratch.
            let records = self.store.all_url_records(task_id).await?;
            for record in records
                .iter()
                .filter(|r| r.status == crawler_core::UrlStatus::Pending)
            {
                let priority =
                    crawler_frontier::compute_priority(task.policy.strategy, &record.url, record.depth);
                frontier.admit(record.url.clone(), record.depth, priority).await;
            }
            aggregates_from_records(&records)
        };

        self.store
            .update_task_status(task_id, TaskStatus::Running)
            .await?;

        // A start from pending or a terminal state always (re)activates the
        // queue, even if it was queue-paused before the task last stopped.
        // Only a crash-recovery restart of an already-`running` task carries
        // its prior queue status forward.
        let queue_status = if task.status == TaskStatus::Pending || is_terminal {
            self.store.update_queue_status(task_id, QueueStatus::Active).await?;
            QueueStatus::Active
        } else {
            task.queue_status
        };

        let registry = Arc::clone(self);
        let engine = TaskEngine::start(
            task_id,
            task.policy,
            aggregates,
            queue_status,
            Arc::clone(&self.store),
            frontier,
            Arc::clone(&self.robots),
            Arc::clone(&self.fetcher),
            self.monitor_interval,
            move |id| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    registry.tasks.lock().await.remove(&id);
                });
            },
        );

        tasks.insert(task_id, engine);
        Ok(())
    }

    pub async fn pause(&self, task_id: TaskId) -> Result<(), CrawlError> {
        let tasks = self.tasks.lock().await;
        let engine = tasks.get(&task_id).ok_or(CrawlError::TaskNotFound(task_id))?;
        engine.set_paused(true);
        self.store
            .update_task_status(task_id, TaskStatus::Paused)
            .await?;
        Ok(())
    }

    pub async fn resume(&self, task_id: TaskId) -> Result<(), CrawlError> {
        let tasks = self.tasks.lock().await;
        let engine = tasks.get(&task_id).ok_or(CrawlError::TaskNotFound(task_id))?;
        engine.set_paused(false);
        self.store
            .update_task_status(task_id, TaskStatus::Running)
            .await?;
        Ok(())
    }

    pub async fn pause_queue(&self, task_id: TaskId) -> Result<(), CrawlError> {
        let tasks = self.tasks.lock().await;
        if let Some(engine) = tasks.get(&task_id) {
            engine.set_queue_paused(true);
        }
        self.store
            .update_queue_status(task_id, QueueStatus::Paused)
            .await?;
        Ok(())
    }

    pub async fn resume_queue(&self, task_id: TaskId) -> Result<(), CrawlError> {
        let tasks = self.tasks.lock().await;
        if let Some(engine) = tasks.get(&task_id) {
            engine.set_queue_paused(false);
        }
        self.store
            .update_queue_status(task_id, QueueStatus::Active)
            .await?;
        Ok(())
    }

    /// Always records `stopped`, even if no engine is running for this task
    /// in the current process — recovers a task left desynced by a crash.
    pub async fn stop(&self, task_id: TaskId) -> Result<(), CrawlError> {
        let mut tasks = self.tasks.lock().await;
        if let Some(engine) = tasks.remove(&task_id) {
            engine.request_stop();
        }
        self.store
            .update_task_status(task_id, TaskStatus::Stopped)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, task_id: TaskId) -> Result<(), CrawlError> {
        self.stop(task_id).await?;
        self.store.delete_task_and_urls(task_id).await?;
        Ok(())
    }

    pub async fn snapshot(&self, task_id: TaskId) -> Option<crawler_core::MonitorSnapshot> {
        let tasks = self.tasks.lock().await;
        let engine = tasks.get(&task_id)?;
        Some(engine.subscribe().borrow().clone())
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
