//! Shared domain types, request validation and process configuration for
//! the feed-to-table ingestion service.

mod app_config;
mod config;
mod request;
mod types;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, PartitionScheme, RowKeyPolicy};
pub use config::{load_app_config, load_app_config_from_env};
pub use request::{IngestRequest, IngestTarget};
pub use types::{
    EntryOutcome, EntryResult, FailureKind, FeedEntry, IngestionOutcome, NormalizedRecord,
    StorageKey,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}
