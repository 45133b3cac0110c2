use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "crawlctl", about = "Managed multi-tenant web crawler control CLI")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a task and immediately start crawling from its seed URL,
    /// printing progress until the task reaches a terminal state.
    Run {
        /// Seed URL to crawl from
        seed: String,

        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Create a task without starting it
    CreateTask {
        /// Seed URL to crawl from
        seed: String,

        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Start (or resume from a terminal state) a task's worker pool
    Start {
        task_id: i64,
    },
    /// Pause a running task's workers
    Pause {
        task_id: i64,
    },
    /// Resume a paused task
    Resume {
        task_id: i64,
    },
    /// Stop admitting new URLs to the frontier without stopping workers
    PauseQueue {
        task_id: i64,
    },
    /// Resume admitting new URLs to the frontier
    ResumeQueue {
        task_id: i64,
    },
    /// Stop a task's workers and mark it stopped
    Stop {
        task_id: i64,
    },
    /// Stop (if active) and delete a task and its URL records
    Delete {
        task_id: i64,
    },
    /// Show a task's current status and aggregates
    Status {
        task_id: i64,
    },
    /// List all known tasks
    ListTasks,
    /// List URL records for a task
    ListUrls {
        task_id: i64,

        /// Filter by status: pending, completed, failed, robots_blocked
        #[arg(long)]
        status: Option<String>,

        /// Filter by URL prefix (scheme optional)
        #[arg(long)]
        prefix: Option<String>,

        /// Filter by file extension, e.g. ".pdf"
        #[arg(long)]
        extension: Option<String>,

        /// Filter by content type class: image, video, audio, other, or an
        /// exact MIME type (e.g. "application/pdf")
        #[arg(long = "content-type")]
        content_type: Option<String>,

        #[arg(long, default_value = "0")]
        offset: u64,

        #[arg(long, default_value = "100")]
        limit: u64,
    },
}

#[derive(clap::Args)]
pub struct PolicyArgs {
    /// Crawl ordering strategy: bfs, dfs, priority
    #[arg(long, default_value = "bfs")]
    pub strategy: String,

    /// Falls back to the configured default depth when not given
    #[arg(long)]
    pub max_depth: Option<u32>,

    #[arg(long, default_value = "4")]
    pub thread_count: usize,

    #[arg(long, default_value = "0.0")]
    pub request_interval_seconds: f64,

    #[arg(long, default_value = "3")]
    pub retry_times: u32,

    #[arg(long, default_value = "true")]
    pub respect_robots: bool,

    #[arg(long, default_value = "false")]
    pub allow_cross_domain: bool,
}
