use std::sync::Arc;
use std::time::{Duration, Instant};

use crawler_core::{EngineConfig, Strategy, TaskPolicy, TaskStatus};
use crawler_engine::Registry;
use crawler_storage::{SqliteStore, Store};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> EngineConfig {
    toml::from_str(
        r#"
        [general]
        data_dir = "."
        monitor_interval_seconds = 1
        "#,
    )
    .unwrap()
}

async fn memory_store() -> Arc<dyn Store> {
    let store = SqliteStore::connect("sqlite::memory:", 1).await.unwrap();
    store.run_migrations().await.unwrap();
    Arc::new(store)
}

fn policy(seed: String) -> TaskPolicy {
    TaskPolicy {
        seed_url: seed,
        strategy: Strategy::Bfs,
        max_depth: 2,
        thread_count: 2,
        request_interval_seconds: 0.0,
        retry_times: 1,
        respect_robots: false,
        allow_cross_domain: false,
    }
}

async fn wait_for_terminal(
    store: &Arc<dyn Store>,
    task_id: i64,
    timeout: Duration,
) -> crawler_core::TaskRecord {
    let deadline = Instant::now() + timeout;
    loop {
        let task = store.get_task(task_id).await.unwrap();
        if matches!(
            task.status,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Stopped
        ) {
            return task;
        }
        if Instant::now() > deadline {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test]
async fn crawls_linked_pages_to_completion() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!(
                    r#"<html><body><a href="{}/page-a">a</a></body></html>"#,
                    server.uri()
                )),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page-a"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><body>no links here</body></html>"),
        )
        .mount(&server)
        .await;

    let store = memory_store().await;
    let registry = Arc::new(Registry::new(&config(), Arc::clone(&store)).unwrap());

    let task_id = registry.create_task(policy(server.uri())).await.unwrap();
    registry.start(task_id).await.unwrap();

    let task = wait_for_terminal(&store, task_id, Duration::from_secs(15)).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.aggregates.completed_urls, 2);
    assert_eq!(task.aggregates.failed_urls, 0);
}

#[tokio::test]
async fn robots_disallow_blocks_linked_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!(
                    r#"<html><body><a href="{}/private">nope</a></body></html>"#,
                    server.uri()
                )),
        )
        .mount(&server)
        .await;

    let store = memory_store().await;
    let registry = Arc::new(Registry::new(&config(), Arc::clone(&store)).unwrap());

    let mut p = policy(server.uri());
    p.respect_robots = true;
    let task_id = registry.create_task(p).await.unwrap();
    registry.start(task_id).await.unwrap();

    let task = wait_for_terminal(&store, task_id, Duration::from_secs(15)).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.aggregates.completed_urls, 1);
    assert_eq!(task.aggregates.robots_blocked, 1);
}

#[tokio::test]
async fn stop_transitions_task_to_stopped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><body>hi</body></html>"),
        )
        .mount(&server)
        .await;

    let store = memory_store().await;
    let registry = Arc::new(Registry::new(&config(), Arc::clone(&store)).unwrap());

    let task_id = registry.create_task(policy(server.uri())).await.unwrap();
    registry.start(task_id).await.unwrap();
    registry.stop(task_id).await.unwrap();

    let task = store.get_task(task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Stopped);

    // A second start should be accepted now that the engine deregistered.
    registry.start(task_id).await.unwrap();
}

/// BFS, depth 2, single domain: `/` links to `/a`
/// and `/b`; `/a` links to `/c`; `/b` links to `/a` (a duplicate).
#[tokio::test]
async fn bfs_depth_two_dedups_link_seen_from_two_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    let html = |links: &[&str]| {
        let body: String = links
            .iter()
            .map(|l| format!(r#"<a href="{base}{l}">{l}</a>"#))
            .collect();
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string(format!("<html><body>{body}</body></html>"))
    };

    Mock::given(method("GET")).and(path("/")).respond_with(html(&["/a", "/b"])).mount(&server).await;
    Mock::given(method("GET")).and(path("/a")).respond_with(html(&["/c"])).mount(&server).await;
    Mock::given(method("GET")).and(path("/b")).respond_with(html(&["/a"])).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html").set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let store = memory_store().await;
    let registry = Arc::new(Registry::new(&config(), Arc::clone(&store)).unwrap());

    let mut p = policy(base);
    p.max_depth = 2;
    p.thread_count = 1;
    let task_id = registry.create_task(p).await.unwrap();
    registry.start(task_id).await.unwrap();

    let task = wait_for_terminal(&store, task_id, Duration::from_secs(15)).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.aggregates.total_urls, 4);
    assert_eq!(task.aggregates.completed_urls, 4);
    assert_eq!(task.aggregates.duplicate, 1);
    assert_eq!(task.aggregates.depth_blocked, 0);
}

/// Cross-domain block: a link to another origin is
/// rejected without ever fetching that origin's `robots.txt`.
#[tokio::test]
async fn cross_domain_block_never_touches_other_origin_robots() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!(r#"<html><body><a href="{}/p">other</a></body></html>"#, other.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow:\n"))
        .expect(0)
        .mount(&other)
        .await;

    let store = memory_store().await;
    let registry = Arc::new(Registry::new(&config(), Arc::clone(&store)).unwrap());

    let mut p = policy(server.uri());
    p.respect_robots = true;
    p.allow_cross_domain = false;
    let task_id = registry.create_task(p).await.unwrap();
    registry.start(task_id).await.unwrap();

    let task = wait_for_terminal(&store, task_id, Duration::from_secs(15)).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.aggregates.cross_domain_blocked, 1);
    assert_eq!(task.aggregates.total_urls, 1);

    let urls = store.list_urls(task_id, &Default::default()).await.unwrap();
    assert!(urls.iter().all(|u| !u.url.starts_with(&other.uri())));
    // `other`'s mounted `/robots.txt` mock (expect(0)) is verified on drop.
}

/// Redirect collapsing: `/x` redirects to `/y`,
/// which is also linked directly from `/`. `/y` is fetched exactly once.
#[tokio::test]
async fn redirect_target_is_fetched_once_even_when_also_linked_directly() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("content-type", "text/html").set_body_string(format!(
                r#"<html><body><a href="{base}/x">x</a><a href="{base}/y">y</a></body></html>"#
            )),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", &format!("{base}/y")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/y"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><body>target</body></html>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = memory_store().await;
    let registry = Arc::new(Registry::new(&config(), Arc::clone(&store)).unwrap());

    // Single worker so `/x` (whose redirect target is `/y`) is always
    // processed before the directly-linked `/y` is dequeued.
    let mut p = policy(base);
    p.thread_count = 1;
    let task_id = registry.create_task(p).await.unwrap();
    registry.start(task_id).await.unwrap();

    let task = wait_for_terminal(&store, task_id, Duration::from_secs(15)).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.aggregates.total_urls, 3);
    assert_eq!(task.aggregates.completed_urls, 3);
    // `/y`'s mock (expect(1)) is verified on drop — it must be fetched exactly once.
}

/// Retry and give up: a connection-level failure on
/// every attempt exhausts `retryTimes` and fails the URL.
#[tokio::test]
async fn exhausting_retries_on_connection_error_fails_the_url() {
    let store = memory_store().await;
    let registry = Arc::new(Registry::new(&config(), Arc::clone(&store)).unwrap());

    // Port 1 is a reserved, unbound port: the connection is refused
    // immediately, giving a deterministic `connection` classification
    // without relying on real network flakiness.
    let mut p = policy("http://127.0.0.1:1/".to_string());
    p.retry_times = 2;
    p.thread_count = 1;
    let task_id = registry.create_task(p).await.unwrap();
    registry.start(task_id).await.unwrap();

    let task = wait_for_terminal(&store, task_id, Duration::from_secs(15)).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.aggregates.failed_urls, 1);
    assert_eq!(task.aggregates.completed_urls, 0);

    let urls = store.list_urls(task_id, &Default::default()).await.unwrap();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].error_message.as_deref().unwrap().starts_with("Connection Error:"));
}

/// Queue-pause semantics: pausing the queue while a
/// slow page is in flight suppresses admission of links it discovers.
#[tokio::test]
async fn queue_pause_suppresses_admission_of_newly_discovered_links() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("content-type", "text/html").set_body_string(format!(
                r#"<html><body><a href="{base}/a">a</a><a href="{base}/b">b</a></body></html>"#
            )),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!(r#"<html><body><a href="{base}/c">c</a></body></html>"#))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html").set_body_string("<html></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html").set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let store = memory_store().await;
    let registry = Arc::new(Registry::new(&config(), Arc::clone(&store)).unwrap());

    let mut p = policy(base);
    p.thread_count = 2;
    let task_id = registry.create_task(p).await.unwrap();
    registry.start(task_id).await.unwrap();

    // Give `/` time to be fetched and `/a`/`/b` admitted, and `/a`'s
    // (delayed) fetch time to start, before suppressing new admissions.
    tokio::time::sleep(Duration::from_millis(150)).await;
    registry.pause_queue(task_id).await.unwrap();

    let task = wait_for_terminal(&store, task_id, Duration::from_secs(15)).await;

    assert_eq!(task.status, TaskStatus::Completed);
    let urls = store.list_urls(task_id, &Default::default()).await.unwrap();
    assert!(!urls.iter().any(|u| u.url.ends_with("/c")));
    assert_eq!(task.aggregates.completed_urls, 3);
}
