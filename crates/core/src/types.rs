use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TaskId = i64;

/// Crawl ordering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Bfs,
    Dfs,
    Priority,
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Paused,
    Stopped,
    Completed,
    Failed,
}

/// Queue admission state, orthogonal to `TaskStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Active,
    Paused,
}

/// Per-URL lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlStatus {
    Pending,
    Completed,
    Failed,
    RobotsBlocked,
}

/// Per-worker status published in a monitor snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadState {
    Idle,
    Crawling,
    Paused,
    Error,
    Stopped,
}

/// The policy + identity a task is created with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPolicy {
    pub seed_url: String,
    pub strategy: Strategy,
    pub max_depth: u32,
    pub thread_count: usize,
    pub request_interval_seconds: f64,
    pub retry_times: u32,
    pub respect_robots: bool,
    pub allow_cross_domain: bool,
}

/// Running aggregates tracked per task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskAggregates {
    pub total_urls: u64,
    pub completed_urls: u64,
    pub failed_urls: u64,
    pub success_rate: f64,
    pub total_bytes: u64,
    pub avg_response_time: f64,
    pub progress: f64,
    pub duplicate: u64,
    pub cross_domain_blocked: u64,
    pub robots_blocked: u64,
    pub depth_blocked: u64,
}

impl TaskAggregates {
    pub fn processed(&self) -> u64 {
        self.completed_urls + self.failed_urls
    }

    /// Recompute `success_rate` from `completed_urls`/`failed_urls`.
    pub fn recompute_success_rate(&mut self) {
        let processed = self.processed();
        self.success_rate = if processed > 0 {
            self.completed_urls as f64 / processed as f64
        } else {
            0.0
        };
    }
}

/// The durable record for a crawl task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub policy: TaskPolicy,
    pub status: TaskStatus,
    pub queue_status: QueueStatus,
    pub aggregates: TaskAggregates,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(id: TaskId, policy: TaskPolicy) -> Self {
        Self {
            id,
            policy,
            status: TaskStatus::Pending,
            queue_status: QueueStatus::Active,
            aggregates: TaskAggregates::default(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

/// Page metadata extracted by the `LinkExtractor`.
///
/// Typed columns are the authoritative contract; `raw` is an opaque
/// forward-compatible JSON envelope, never a second source of truth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub publish_time: Option<String>,
    pub raw: String,
}

/// A durable record for a single normalized URL within a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRecord {
    pub task_id: TaskId,
    pub url: String,
    pub depth: u32,
    pub status: UrlStatus,
    pub status_code: Option<u16>,
    pub response_time_seconds: Option<f64>,
    pub file_size: Option<u64>,
    pub content_type: Option<String>,
    pub metadata: Metadata,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UrlRecord {
    pub fn pending(task_id: TaskId, url: String, depth: u32) -> Self {
        Self {
            task_id,
            url,
            depth,
            status: UrlStatus::Pending,
            status_code: None,
            response_time_seconds: None,
            file_size: None,
            content_type: None,
            metadata: Metadata::default(),
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn robots_blocked(task_id: TaskId, url: String, depth: u32) -> Self {
        Self {
            status: UrlStatus::RobotsBlocked,
            completed_at: Some(Utc::now()),
            ..Self::pending(task_id, url, depth)
        }
    }
}

/// A unit of frontier work: a candidate URL admitted at a given depth
/// and priority.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub url: String,
    pub depth: u32,
    pub priority: i64,
}

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_body_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// A successful fetch result.
#[derive(Debug, Clone)]
pub struct FetchSuccess {
    pub final_url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: Option<String>,
    pub byte_count: u64,
    pub elapsed: Duration,
}

/// A published progress snapshot for one worker thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub id: usize,
    pub status: ThreadState,
    pub current_url: Option<String>,
    pub completed: u64,
    pub failed: u64,
    pub bytes: u64,
    /// Pages/sec derived from the response time of the most recent
    /// successful fetch on this worker; 0.0 until the first one completes.
    pub speed: f64,
}

/// The full monitor snapshot published per tick and on final transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub queue_status: QueueStatus,
    pub progress: f64,
    pub total_urls: u64,
    pub processed: u64,
    pub completed_urls: u64,
    pub failed_urls: u64,
    pub queue_size: usize,
    pub success_rate: f64,
    pub total_bytes: u64,
    pub avg_response_time: f64,
    pub cross_domain_blocked: u64,
    pub depth_blocked: u64,
    pub duplicate: u64,
    pub robots_blocked: u64,
    pub threads: Vec<ThreadSnapshot>,
}

/// Filter for `Store::list_urls`.
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    pub status: Option<UrlStatus>,
    pub content_class: Option<ContentClass>,
    pub url_prefix: Option<String>,
    pub extension: Option<String>,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentClass {
    Image,
    Video,
    Audio,
    Other,
    Exact(String),
}

/// Aggregate URL statistics for a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlStats {
    pub by_status: HashMap<String, u64>,
    pub by_content_type: HashMap<String, u64>,
}
