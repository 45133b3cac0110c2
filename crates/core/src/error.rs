use thiserror::Error;

/// Failure taxonomy for a single fetch attempt.
///
/// The variant drives retry/backoff policy in the engine and the message
/// prefix persisted to a failed `UrlRecord`.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("SSL Error: {0}")]
    Ssl(String),

    #[error("Connection Error: {0}")]
    Connection(String),

    #[error("Timeout Error: {0}")]
    Timeout(String),

    #[error("{0}")]
    Http(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// True for an SSL error that looks like a premature EOF — these get
    /// exponential backoff instead of a flat sleep.
    pub fn is_premature_eof(&self) -> bool {
        matches!(self, FetchError::Ssl(msg) if {
            let lower = msg.to_lowercase();
            lower.contains("eof") || lower.contains("unexpected_eof")
        })
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Crate-wide error type for everything that isn't a per-URL fetch failure.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("task {0} not found")]
    TaskNotFound(i64),

    #[error("task {0} already active")]
    TaskAlreadyActive(i64),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Errors surfaced by a `Store` implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(i64),

    #[error("backend error: {0}")]
    Backend(String),
}
