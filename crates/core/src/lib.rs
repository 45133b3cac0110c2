pub mod config;
pub mod error;
pub mod normalize;
pub mod types;

pub use config::EngineConfig;
pub use error::{CrawlError, FetchError, StoreError};
pub use types::*;
