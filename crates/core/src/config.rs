use serde::Deserialize;

/// Top-level engine configuration, loaded from TOML with env-var overrides
/// (see root `src/main.rs`).
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetch: FetchSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    /// Directory used for the default SQLite database file and default config.
    pub data_dir: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_pool_size")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_pool_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchSettings {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_seconds: u64,
    #[serde(default = "default_max_body_mb")]
    pub max_body_mb: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_seconds: default_connect_timeout(),
            read_timeout_seconds: default_read_timeout(),
            max_body_mb: default_max_body_mb(),
        }
    }
}

fn default_max_depth() -> u32 {
    5
}
fn default_monitor_interval() -> u64 {
    2
}
fn default_database_url() -> String {
    "sqlite://crawler.db".to_string()
}
fn default_pool_size() -> u32 {
    5
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_read_timeout() -> u64 {
    30
}
fn default_max_body_mb() -> u64 {
    10
}
