use feedtable_core::ConfigError;
use feedtable_feed::{FetchError, ParseError};
use feedtable_table::StoreError;
use serde::Serialize;
use thiserror::Error;

/// The step at which a request was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Validate,
    Fetch,
    Parse,
}

impl std::fmt::Display for IngestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestStage::Validate => write!(f, "validate"),
            IngestStage::Fetch => write!(f, "fetch"),
            IngestStage::Parse => write!(f, "parse"),
        }
    }
}

/// A request-level failure. No entry was processed.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid request: {0}")]
    Config(#[from] ConfigError),

    #[error("feed fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("feed parse failed: {0}")]
    Parse(#[from] ParseError),

    /// The table target could not be opened.
    #[error("table store unavailable: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    #[must_use]
    pub fn stage(&self) -> IngestStage {
        match self {
            IngestError::Config(_) | IngestError::Store(_) => IngestStage::Validate,
            IngestError::Fetch(_) => IngestStage::Fetch,
            IngestError::Parse(_) => IngestStage::Parse,
        }
    }

    /// Stable machine-readable code, used in API error bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Config(_) => "validation_error",
            IngestError::Fetch(FetchError::Timeout { .. }) => "fetch_timeout",
            IngestError::Fetch(_) => "fetch_failed",
            IngestError::Parse(_) => "parse_failed",
            IngestError::Store(_) => "store_unavailable",
        }
    }
}
