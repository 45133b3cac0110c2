mod cli;
mod commands;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use crawler_core::EngineConfig;
use crawler_engine::Registry;
use crawler_storage::{SqliteStore, Store};

use crate::cli::{Cli, Commands};

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        warn!(path = %cli.config, "config file not found, using defaults");
        include_str!("../config/default.toml").to_string()
    });
    let mut config: EngineConfig = toml::from_str(&config_str)?;

    if let Ok(v) = std::env::var("CRAWLER_DATABASE_URL") {
        config.storage.database_url = v;
    }
    if let Ok(v) = std::env::var("CRAWLER_MAX_DEPTH") {
        if let Ok(n) = v.parse::<u32>() {
            config.general.max_depth = n;
        }
    }

    let sqlite_store =
        SqliteStore::connect(&config.storage.database_url, config.storage.max_connections).await?;
    sqlite_store.run_migrations().await?;
    let store: Arc<dyn Store> = Arc::new(sqlite_store);
    let registry = Arc::new(Registry::new(&config, Arc::clone(&store))?);

    match cli.command {
        Commands::Run { seed, policy } => {
            let policy = commands::policy_from_args(seed, policy, config.general.max_depth)?;
            commands::run_to_completion(registry, policy).await?;
        }
        Commands::CreateTask { seed, policy } => {
            let policy = commands::policy_from_args(seed, policy, config.general.max_depth)?;
            commands::create_task(&registry, policy).await?;
        }
        Commands::Start { task_id } => registry.start(task_id).await?,
        Commands::Pause { task_id } => registry.pause(task_id).await?,
        Commands::Resume { task_id } => registry.resume(task_id).await?,
        Commands::PauseQueue { task_id } => registry.pause_queue(task_id).await?,
        Commands::ResumeQueue { task_id } => registry.resume_queue(task_id).await?,
        Commands::Stop { task_id } => registry.stop(task_id).await?,
        Commands::Delete { task_id } => registry.delete(task_id).await?,
        Commands::Status { task_id } => commands::print_status(registry.store(), task_id).await?,
        Commands::ListTasks => commands::list_tasks(registry.store()).await?,
        Commands::ListUrls {
            task_id,
            status,
            prefix,
            extension,
            content_type,
            offset,
            limit,
        } => {
            commands::list_urls(
                registry.store(),
                task_id,
                status,
                prefix,
                extension,
                content_type,
                offset,
                limit,
            )
            .await?
        }
    }

    Ok(())
}
