use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crawler_core::{
    Metadata, QueueStatus, Strategy, TaskAggregates, TaskId, TaskPolicy, TaskRecord, TaskStatus,
    UrlRecord, UrlStatus,
};

pub fn strategy_to_str(s: Strategy) -> &'static str {
    match s {
        Strategy::Bfs => "bfs",
        Strategy::Dfs => "dfs",
        Strategy::Priority => "priority",
    }
}

pub fn strategy_from_str(s: &str) -> Strategy {
    match s {
        "dfs" => Strategy::Dfs,
        "priority" => Strategy::Priority,
        _ => Strategy::Bfs,
    }
}

pub fn task_status_to_str(s: TaskStatus) -> &'static str {
    match s {
        TaskStatus::Pending => "pending",
        TaskStatus::Running => "running",
        TaskStatus::Paused => "paused",
        TaskStatus::Stopped => "stopped",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
    }
}

pub fn task_status_from_str(s: &str) -> TaskStatus {
    match s {
        "running" => TaskStatus::Running,
        "paused" => TaskStatus::Paused,
        "stopped" => TaskStatus::Stopped,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        _ => TaskStatus::Pending,
    }
}

pub fn queue_status_to_str(s: QueueStatus) -> &'static str {
    match s {
        QueueStatus::Active => "active",
        QueueStatus::Paused => "paused",
    }
}

pub fn queue_status_from_str(s: &str) -> QueueStatus {
    match s {
        "paused" => QueueStatus::Paused,
        _ => QueueStatus::Active,
    }
}

pub fn url_status_to_str(s: UrlStatus) -> &'static str {
    match s {
        UrlStatus::Pending => "pending",
        UrlStatus::Completed => "completed",
        UrlStatus::Failed => "failed",
        UrlStatus::RobotsBlocked => "robots_blocked",
    }
}

pub fn url_status_from_str(s: &str) -> UrlStatus {
    match s {
        "completed" => UrlStatus::Completed,
        "failed" => UrlStatus::Failed,
        "robots_blocked" => UrlStatus::RobotsBlocked,
        _ => UrlStatus::Pending,
    }
}

pub fn task_record_from_row(row: &SqliteRow) -> TaskRecord {
    let policy = TaskPolicy {
        seed_url: row.get::<String, _>("seed_url"),
        strategy: strategy_from_str(row.get::<String, _>("strategy").as_str()),
        max_depth: row.get::<i64, _>("max_depth") as u32,
        thread_count: row.get::<i64, _>("thread_count") as usize,
        request_interval_seconds: row.get("request_interval_seconds"),
        retry_times: row.get::<i64, _>("retry_times") as u32,
        respect_robots: row.get::<i64, _>("respect_robots") != 0,
        allow_cross_domain: row.get::<i64, _>("allow_cross_domain") != 0,
    };

    let aggregates = TaskAggregates {
        total_urls: row.get::<i64, _>("total_urls") as u64,
        completed_urls: row.get::<i64, _>("completed_urls") as u64,
        failed_urls: row.get::<i64, _>("failed_urls") as u64,
        success_rate: row.get("success_rate"),
        total_bytes: row.get::<i64, _>("total_bytes") as u64,
        avg_response_time: row.get("avg_response_time"),
        progress: row.get("progress"),
        duplicate: row.get::<i64, _>("duplicate") as u64,
        cross_domain_blocked: row.get::<i64, _>("cross_domain_blocked") as u64,
        robots_blocked: row.get::<i64, _>("robots_blocked") as u64,
        depth_blocked: row.get::<i64, _>("depth_blocked") as u64,
    };

    TaskRecord {
        id: row.get::<i64, _>("id") as TaskId,
        policy,
        status: task_status_from_str(row.get::<String, _>("status").as_str()),
        queue_status: queue_status_from_str(row.get::<String, _>("queue_status").as_str()),
        aggregates,
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        started_at: row
            .get::<Option<String>, _>("started_at")
            .map(|s| parse_timestamp(&s)),
        finished_at: row
            .get::<Option<String>, _>("finished_at")
            .map(|s| parse_timestamp(&s)),
    }
}

pub fn url_record_from_row(row: &SqliteRow) -> UrlRecord {
    let metadata = Metadata {
        title: row.get::<Option<String>, _>("title"),
        author: row.get::<Option<String>, _>("author"),
        description: row.get::<Option<String>, _>("description"),
        keywords: row.get::<Option<String>, _>("keywords"),
        publish_time: row.get::<Option<String>, _>("publish_time"),
        raw: row.get::<Option<String>, _>("metadata_raw").unwrap_or_default(),
    };

    UrlRecord {
        task_id: row.get::<i64, _>("task_id") as TaskId,
        url: row.get::<String, _>("url"),
        depth: row.get::<i64, _>("depth") as u32,
        status: url_status_from_str(row.get::<String, _>("status").as_str()),
        status_code: row.get::<Option<i64>, _>("status_code").map(|v| v as u16),
        response_time_seconds: row.get::<Option<f64>, _>("response_time_seconds"),
        file_size: row.get::<Option<i64>, _>("file_size").map(|v| v as u64),
        content_type: row.get::<Option<String>, _>("content_type"),
        metadata,
        error_message: row.get::<Option<String>, _>("error_message"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        completed_at: row
            .get::<Option<String>, _>("completed_at")
            .map(|s| parse_timestamp(&s)),
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
