use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crawler_core::{ContentClass, Strategy, TaskId, TaskPolicy, UrlFilter, UrlStatus};
use crawler_engine::Registry;
use crawler_storage::Store;

use crate::cli::PolicyArgs;

pub fn policy_from_args(seed: String, args: PolicyArgs, default_max_depth: u32) -> Result<TaskPolicy> {
    let strategy = match args.strategy.to_lowercase().as_str() {
        "bfs" => Strategy::Bfs,
        "dfs" => Strategy::Dfs,
        "priority" => Strategy::Priority,
        other => return Err(anyhow!("unknown strategy: {other} (expected bfs, dfs, or priority)")),
    };

    Ok(TaskPolicy {
        seed_url: seed,
        strategy,
        max_depth: args.max_depth.unwrap_or(default_max_depth),
        thread_count: args.thread_count.max(1),
        request_interval_seconds: args.request_interval_seconds,
        retry_times: args.retry_times,
        respect_robots: args.respect_robots,
        allow_cross_domain: args.allow_cross_domain,
    })
}

pub async fn create_task(registry: &Registry, policy: TaskPolicy) -> Result<TaskId> {
    let task_id = registry.create_task(policy).await?;
    println!("created task {task_id}");
    Ok(task_id)
}

/// Create a task, start it, and print progress until it reaches a terminal
/// state.
pub async fn run_to_completion(registry: Arc<Registry>, policy: TaskPolicy) -> Result<()> {
    let task_id = create_task(&registry, policy).await?;
    registry.start(task_id).await?;

    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let Some(snapshot) = registry.snapshot(task_id).await else {
            // Engine already deregistered: task reached a terminal state.
            break;
        };
        println!(
            "[{task_id}] {:?} progress={:.1}% processed={}/{} completed={} failed={} queue={}",
            snapshot.status,
            snapshot.progress,
            snapshot.processed,
            snapshot.total_urls,
            snapshot.completed_urls,
            snapshot.failed_urls,
            snapshot.queue_size,
        );
    }

    print_status(registry.store(), task_id).await
}

pub async fn print_status(store: &Arc<dyn Store>, task_id: TaskId) -> Result<()> {
    let task = store.get_task(task_id).await?;
    println!("task {task_id}: status={:?} queue={:?}", task.status, task.queue_status);
    println!(
        "  total={} completed={} failed={} success_rate={:.2} bytes={} avg_response_time={:.3}s",
        task.aggregates.total_urls,
        task.aggregates.completed_urls,
        task.aggregates.failed_urls,
        task.aggregates.success_rate,
        task.aggregates.total_bytes,
        task.aggregates.avg_response_time,
    );
    println!(
        "  duplicate={} cross_domain_blocked={} robots_blocked={} depth_blocked={}",
        task.aggregates.duplicate,
        task.aggregates.cross_domain_blocked,
        task.aggregates.robots_blocked,
        task.aggregates.depth_blocked,
    );
    Ok(())
}

pub async fn list_tasks(store: &Arc<dyn Store>) -> Result<()> {
    let tasks = store.list_tasks().await?;
    if tasks.is_empty() {
        println!("no tasks");
        return Ok(());
    }
    for task in tasks {
        println!(
            "{:>4}  {:<9}  {:<7}  {}",
            task.id,
            format!("{:?}", task.status).to_lowercase(),
            format!("{:?}", task.queue_status).to_lowercase(),
            task.policy.seed_url,
        );
    }
    Ok(())
}

pub async fn list_urls(
    store: &Arc<dyn Store>,
    task_id: TaskId,
    status: Option<String>,
    prefix: Option<String>,
    extension: Option<String>,
    content_type: Option<String>,
    offset: u64,
    limit: u64,
) -> Result<()> {
    let status = status
        .map(|s| parse_url_status(&s))
        .transpose()?;
    let content_class = content_type.map(|c| parse_content_class(&c));

    let filter = UrlFilter {
        status,
        content_class,
        url_prefix: prefix,
        extension,
        offset,
        limit,
    };

    let records = store.list_urls(task_id, &filter).await?;
    for record in records {
        println!(
            "{:<7}  {:>3}  {}",
            format!("{:?}", record.status).to_lowercase(),
            record.status_code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            record.url,
        );
    }
    Ok(())
}

fn parse_content_class(s: &str) -> ContentClass {
    match s.to_lowercase().as_str() {
        "image" => ContentClass::Image,
        "video" => ContentClass::Video,
        "audio" => ContentClass::Audio,
        "other" => ContentClass::Other,
        _ => ContentClass::Exact(s.to_string()),
    }
}

fn parse_url_status(s: &str) -> Result<UrlStatus> {
    match s {
        "pending" => Ok(UrlStatus::Pending),
        "completed" => Ok(UrlStatus::Completed),
        "failed" => Ok(UrlStatus::Failed),
        "robots_blocked" => Ok(UrlStatus::RobotsBlocked),
        other => Err(anyhow!(
            "unknown status: {other} (expected pending, completed, failed, or robots_blocked)"
        )),
    }
}
