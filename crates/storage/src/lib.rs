//! The `Store` abstraction plus a SQLite-backed implementation.
//!
//! Persistence is an external collaborator: this trait names only the
//! operations the engine and control plane actually need. `SqliteStore` is
//! one concrete implementation, not the only schema that could satisfy it.

mod rows;
mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crawler_core::{
    QueueStatus, StoreError, TaskAggregates, TaskId, TaskPolicy, TaskRecord, TaskStatus,
    UrlFilter, UrlRecord, UrlStats, UrlStatus,
};

/// Everything the engine and the control plane need from persistence.
/// Implementations are externally synchronized; callers never assume
/// read-your-writes across connections.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_task(&self, policy: TaskPolicy) -> Result<TaskRecord, StoreError>;
    async fn update_task_config(
        &self,
        task_id: TaskId,
        policy: TaskPolicy,
    ) -> Result<(), StoreError>;
    async fn get_task(&self, task_id: TaskId) -> Result<TaskRecord, StoreError>;
    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, StoreError>;
    async fn delete_task_and_urls(&self, task_id: TaskId) -> Result<(), StoreError>;
    async fn reset_task_aggregates(&self, task_id: TaskId) -> Result<(), StoreError>;
    async fn update_aggregates(
        &self,
        task_id: TaskId,
        aggregates: &TaskAggregates,
    ) -> Result<(), StoreError>;
    async fn update_queue_status(
        &self,
        task_id: TaskId,
        status: QueueStatus,
    ) -> Result<(), StoreError>;
    /// Used to drive task lifecycle transitions, including the
    /// always-write-on-stop rule (`stop` persists `Stopped` even when the
    /// caller has no in-memory engine for the task).
    async fn update_task_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
    ) -> Result<(), StoreError>;
    async fn insert_url_record(&self, record: &UrlRecord) -> Result<(), StoreError>;
    async fn update_url_record(&self, record: &UrlRecord) -> Result<(), StoreError>;
    async fn list_urls(
        &self,
        task_id: TaskId,
        filter: &UrlFilter,
    ) -> Result<Vec<UrlRecord>, StoreError>;
    async fn url_stats(&self, task_id: TaskId) -> Result<UrlStats, StoreError>;
    /// All URL records for a task, used to re-derive aggregates on restart
    /// when a task is found `running` with no in-memory engine (its
    /// counters may be stale relative to what was actually persisted).
    async fn all_url_records(&self, task_id: TaskId) -> Result<Vec<UrlRecord>, StoreError>;
}

/// Recompute aggregates from URL records, for restart reconciliation.
pub fn aggregates_from_records(records: &[UrlRecord]) -> TaskAggregates {
    let mut agg = TaskAggregates {
        total_urls: records.len() as u64,
        ..Default::default()
    };
    for r in records {
        match r.status {
            UrlStatus::Completed => {
                agg.completed_urls += 1;
                agg.total_bytes += r.file_size.unwrap_or(0);
            }
            UrlStatus::Failed => agg.failed_urls += 1,
            UrlStatus::RobotsBlocked => agg.robots_blocked += 1,
            UrlStatus::Pending => {}
        }
    }
    agg.recompute_success_rate();
    agg
}
