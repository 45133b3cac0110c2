use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;

use crawler_core::{
    ContentClass, QueueStatus, StoreError, TaskAggregates, TaskId, TaskPolicy, TaskRecord,
    TaskStatus, UrlFilter, UrlRecord, UrlStats,
};

use crate::rows::{
    queue_status_to_str, strategy_to_str, task_record_from_row, task_status_to_str,
    url_record_from_row, url_status_to_str,
};
use crate::Store;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        info!(max_connections, "connected to sqlite store");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(include_str!("../migrations/001_init.sql"))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        info!("storage migrations complete");
        Ok(())
    }

    fn map_err(e: sqlx::Error) -> StoreError {
        StoreError::Backend(e.to_string())
    }
}

fn build_list_urls_query(task_id: TaskId, filter: &UrlFilter) -> (String, Vec<String>) {
    let mut sql = String::from("SELECT * FROM url_records WHERE task_id = ?");
    let mut binds = vec![task_id.to_string()];

    if let Some(status) = filter.status {
        sql.push_str(" AND status = ?");
        binds.push(url_status_to_str(status).to_string());
    }
    if let Some(class) = &filter.content_class {
        match class {
            ContentClass::Image => sql.push_str(" AND content_type LIKE 'image/%'"),
            ContentClass::Video => sql.push_str(" AND content_type LIKE 'video/%'"),
            ContentClass::Audio => sql.push_str(" AND content_type LIKE 'audio/%'"),
            ContentClass::Other => sql.push_str(
                " AND (content_type IS NULL OR (content_type NOT LIKE 'image/%' \
                 AND content_type NOT LIKE 'video/%' AND content_type NOT LIKE 'audio/%'))",
            ),
            ContentClass::Exact(value) => {
                sql.push_str(" AND content_type = ?");
                binds.push(value.clone());
            }
        }
    }
    if let Some(ref prefix) = filter.url_prefix {
        if prefix.starts_with("http://") || prefix.starts_with("https://") {
            sql.push_str(" AND url LIKE ?");
            binds.push(format!("{prefix}%"));
        } else {
            sql.push_str(" AND (url LIKE ? OR url LIKE ? OR url LIKE ?)");
            binds.push(format!("https://{prefix}%"));
            binds.push(format!("http://{prefix}%"));
            binds.push(format!("%{prefix}%"));
        }
    }
    if let Some(ref ext) = filter.extension {
        sql.push_str(" AND url LIKE ?");
        binds.push(format!("%.{ext}"));
    }
    sql.push_str(" ORDER BY created_at LIMIT ? OFFSET ?");
    let limit = if filter.limit == 0 { 100 } else { filter.limit };
    binds.push(limit.to_string());
    binds.push(filter.offset.to_string());

    (sql, binds)
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_task(&self, policy: TaskPolicy) -> Result<TaskRecord, StoreError> {
        let now = chrono::Utc::now();
        let row = sqlx::query(
            r#"INSERT INTO tasks
               (seed_url, strategy, max_depth, thread_count, request_interval_seconds,
                retry_times, respect_robots, allow_cross_domain, status, queue_status, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', 'active', ?)
               RETURNING id"#,
        )
        .bind(&policy.seed_url)
        .bind(strategy_to_str(policy.strategy))
        .bind(policy.max_depth as i64)
        .bind(policy.thread_count as i64)
        .bind(policy.request_interval_seconds)
        .bind(policy.retry_times as i64)
        .bind(policy.respect_robots as i64)
        .bind(policy.allow_cross_domain as i64)
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(Self::map_err)?;

        let id: i64 = row.get("id");
        Ok(TaskRecord::new(id as TaskId, policy))
    }

    async fn update_task_config(
        &self,
        task_id: TaskId,
        policy: TaskPolicy,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE tasks SET seed_url = ?, strategy = ?, max_depth = ?, thread_count = ?,
               request_interval_seconds = ?, retry_times = ?, respect_robots = ?,
               allow_cross_domain = ? WHERE id = ?"#,
        )
        .bind(&policy.seed_url)
        .bind(strategy_to_str(policy.strategy))
        .bind(policy.max_depth as i64)
        .bind(policy.thread_count as i64)
        .bind(policy.request_interval_seconds)
        .bind(policy.retry_times as i64)
        .bind(policy.respect_robots as i64)
        .bind(policy.allow_cross_domain as i64)
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(Self::map_err)?;
        Ok(())
    }

    async fn get_task(&self, task_id: TaskId) -> Result<TaskRecord, StoreError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_err)?
            .ok_or(StoreError::NotFound(task_id))?;
        Ok(task_record_from_row(&row))
    }

    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM tasks ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_err)?;
        Ok(rows.iter().map(task_record_from_row).collect())
    }

    async fn delete_task_and_urls(&self, task_id: TaskId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(Self::map_err)?;
        sqlx::query("DELETE FROM url_records WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(Self::map_err)?;
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(Self::map_err)?;
        tx.commit().await.map_err(Self::map_err)?;
        Ok(())
    }

    async fn reset_task_aggregates(&self, task_id: TaskId) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE tasks SET total_urls = 0, completed_urls = 0, failed_urls = 0,
               success_rate = 0, total_bytes = 0, avg_response_time = 0, progress = 0,
               duplicate = 0, cross_domain_blocked = 0, robots_blocked = 0, depth_blocked = 0,
               started_at = NULL, finished_at = NULL WHERE id = ?"#,
        )
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(Self::map_err)?;
        sqlx::query("DELETE FROM url_records WHERE task_id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn update_aggregates(
        &self,
        task_id: TaskId,
        aggregates: &TaskAggregates,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE tasks SET total_urls = ?, completed_urls = ?, failed_urls = ?,
               success_rate = ?, total_bytes = ?, avg_response_time = ?, progress = ?,
               duplicate = ?, cross_domain_blocked = ?, robots_blocked = ?, depth_blocked = ?
               WHERE id = ?"#,
        )
        .bind(aggregates.total_urls as i64)
        .bind(aggregates.completed_urls as i64)
        .bind(aggregates.failed_urls as i64)
        .bind(aggregates.success_rate)
        .bind(aggregates.total_bytes as i64)
        .bind(aggregates.avg_response_time)
        .bind(aggregates.progress)
        .bind(aggregates.duplicate as i64)
        .bind(aggregates.cross_domain_blocked as i64)
        .bind(aggregates.robots_blocked as i64)
        .bind(aggregates.depth_blocked as i64)
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(Self::map_err)?;
        Ok(())
    }

    async fn update_queue_status(
        &self,
        task_id: TaskId,
        status: QueueStatus,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE tasks SET queue_status = ? WHERE id = ?")
            .bind(queue_status_to_str(status))
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn update_task_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
    ) -> Result<(), StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        match status {
            TaskStatus::Running => {
                sqlx::query(
                    "UPDATE tasks SET status = ?, started_at = COALESCE(started_at, ?) WHERE id = ?",
                )
                .bind(task_status_to_str(status))
                .bind(now)
                .bind(task_id)
                .execute(&self.pool)
                .await
            }
            TaskStatus::Stopped | TaskStatus::Completed | TaskStatus::Failed => {
                sqlx::query("UPDATE tasks SET status = ?, finished_at = ? WHERE id = ?")
                    .bind(task_status_to_str(status))
                    .bind(now)
                    .bind(task_id)
                    .execute(&self.pool)
                    .await
            }
            TaskStatus::Pending | TaskStatus::Paused => {
                sqlx::query("UPDATE tasks SET status = ? WHERE id = ?")
                    .bind(task_status_to_str(status))
                    .bind(task_id)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(Self::map_err)?;
        Ok(())
    }

    async fn insert_url_record(&self, record: &UrlRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO url_records
               (task_id, url, depth, status, status_code, response_time_seconds, file_size,
                content_type, title, author, description, keywords, publish_time, metadata_raw,
                error_message, created_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (task_id, url) DO NOTHING"#,
        )
        .bind(record.task_id)
        .bind(&record.url)
        .bind(record.depth as i64)
        .bind(url_status_to_str(record.status))
        .bind(record.status_code.map(|v| v as i64))
        .bind(record.response_time_seconds)
        .bind(record.file_size.map(|v| v as i64))
        .bind(&record.content_type)
        .bind(&record.metadata.title)
        .bind(&record.metadata.author)
        .bind(&record.metadata.description)
        .bind(&record.metadata.keywords)
        .bind(&record.metadata.publish_time)
        .bind(&record.metadata.raw)
        .bind(&record.error_message)
        .bind(record.created_at.to_rfc3339())
        .bind(record.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(Self::map_err)?;
        Ok(())
    }

    async fn update_url_record(&self, record: &UrlRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE url_records SET status = ?, status_code = ?, response_time_seconds = ?,
               file_size = ?, content_type = ?, title = ?, author = ?, description = ?,
               keywords = ?, publish_time = ?, metadata_raw = ?, error_message = ?,
               completed_at = ? WHERE task_id = ? AND url = ?"#,
        )
        .bind(url_status_to_str(record.status))
        .bind(record.status_code.map(|v| v as i64))
        .bind(record.response_time_seconds)
        .bind(record.file_size.map(|v| v as i64))
        .bind(&record.content_type)
        .bind(&record.metadata.title)
        .bind(&record.metadata.author)
        .bind(&record.metadata.description)
        .bind(&record.metadata.keywords)
        .bind(&record.metadata.publish_time)
        .bind(&record.metadata.raw)
        .bind(&record.error_message)
        .bind(record.completed_at.map(|t| t.to_rfc3339()))
        .bind(record.task_id)
        .bind(&record.url)
        .execute(&self.pool)
        .await
        .map_err(Self::map_err)?;
        Ok(())
    }

    async fn list_urls(
        &self,
        task_id: TaskId,
        filter: &UrlFilter,
    ) -> Result<Vec<UrlRecord>, StoreError> {
        let (sql, binds) = build_list_urls_query(task_id, filter);
        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(Self::map_err)?;
        Ok(rows.iter().map(url_record_from_row).collect())
    }

    async fn url_stats(&self, task_id: TaskId) -> Result<UrlStats, StoreError> {
        let mut stats = UrlStats::default();

        let by_status = sqlx::query(
            "SELECT status, COUNT(*) as n FROM url_records WHERE task_id = ? GROUP BY status",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_err)?;
        for row in by_status {
            let status: String = row.get("status");
            let n: i64 = row.get("n");
            stats.by_status.insert(status, n as u64);
        }

        let by_content_type = sqlx::query(
            r#"SELECT COALESCE(content_type, 'unknown') as content_type, COUNT(*) as n
               FROM url_records WHERE task_id = ? GROUP BY content_type"#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_err)?;
        for row in by_content_type {
            let content_type: String = row.get("content_type");
            let n: i64 = row.get("n");
            stats.by_content_type.insert(content_type, n as u64);
        }

        Ok(stats)
    }

    async fn all_url_records(&self, task_id: TaskId) -> Result<Vec<UrlRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM url_records WHERE task_id = ?")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_err)?;
        Ok(rows.iter().map(url_record_from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawler_core::Strategy;

    fn policy() -> TaskPolicy {
        TaskPolicy {
            seed_url: "http://h/".to_string(),
            strategy: Strategy::Bfs,
            max_depth: 3,
            thread_count: 2,
            request_interval_seconds: 0.0,
            retry_times: 3,
            respect_robots: true,
            allow_cross_domain: false,
        }
    }

    async fn store() -> SqliteStore {
        let store = SqliteStore::connect("sqlite::memory:", 1).await.unwrap();
        store.run_migrations().await.unwrap();
        store
    }

    #[tokio::test]
    async fn create_and_fetch_task_round_trips_policy() {
        let store = store().await;
        let created = store.create_task(policy()).await.unwrap();
        let fetched = store.get_task(created.id).await.unwrap();
        assert_eq!(fetched.policy.seed_url, "http://h/");
        assert_eq!(fetched.policy.max_depth, 3);
        assert!(matches!(fetched.status, TaskStatus::Pending));
    }

    #[tokio::test]
    async fn reset_aggregates_clears_url_records() {
        let store = store().await;
        let task = store.create_task(policy()).await.unwrap();
        let record = UrlRecord::pending(task.id, "http://h/".to_string(), 0);
        store.insert_url_record(&record).await.unwrap();

        store.reset_task_aggregates(task.id).await.unwrap();

        let records = store.all_url_records(task.id).await.unwrap();
        assert!(records.is_empty());
        let refetched = store.get_task(task.id).await.unwrap();
        assert_eq!(refetched.aggregates.total_urls, 0);
    }

    #[tokio::test]
    async fn list_urls_filters_by_status() {
        let store = store().await;
        let task = store.create_task(policy()).await.unwrap();
        let mut completed = UrlRecord::pending(task.id, "http://h/a".to_string(), 0);
        completed.status = crawler_core::UrlStatus::Completed;
        store.insert_url_record(&completed).await.unwrap();
        let pending = UrlRecord::pending(task.id, "http://h/b".to_string(), 0);
        store.insert_url_record(&pending).await.unwrap();

        let filter = crawler_core::UrlFilter {
            status: Some(crawler_core::UrlStatus::Completed),
            ..Default::default()
        };
        let results = store.list_urls(task.id, &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "http://h/a");
    }

    #[tokio::test]
    async fn list_urls_filters_by_content_class() {
        let store = store().await;
        let task = store.create_task(policy()).await.unwrap();
        let mut image = UrlRecord::pending(task.id, "http://h/a.jpg".to_string(), 0);
        image.content_type = Some("image/jpeg".to_string());
        store.insert_url_record(&image).await.unwrap();
        let mut page = UrlRecord::pending(task.id, "http://h/b".to_string(), 0);
        page.content_type = Some("text/html".to_string());
        store.insert_url_record(&page).await.unwrap();

        let filter = crawler_core::UrlFilter {
            content_class: Some(crawler_core::ContentClass::Image),
            ..Default::default()
        };
        let results = store.list_urls(task.id, &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "http://h/a.jpg");
    }

    #[tokio::test]
    async fn delete_task_removes_its_url_records() {
        let store = store().await;
        let task = store.create_task(policy()).await.unwrap();
        let record = UrlRecord::pending(task.id, "http://h/".to_string(), 0);
        store.insert_url_record(&record).await.unwrap();

        store.delete_task_and_urls(task.id).await.unwrap();

        assert!(matches!(
            store.get_task(task.id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
