use thiserror::Error;

/// Errors returned while writing entities to the table store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Network or TLS failure talking to the store or the token authority.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// No access token could be obtained for the configured identity.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The store answered with a non-success status.
    #[error("store rejected entity with status {status} ({code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("failed to serialize entity: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The request deadline passed before the store answered.
    #[error("store request exceeded the request deadline")]
    Timeout,

    /// The account/table pair does not form a usable endpoint.
    #[error("invalid table target: {0}")]
    InvalidTarget(String),
}

impl StoreError {
    /// Returns `true` for failures worth retrying after a back-off delay:
    /// transport errors and 408/429/5xx answers from the store.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            StoreError::Rejected { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            StoreError::Client(_)
            | StoreError::Auth(_)
            | StoreError::Serialize(_)
            | StoreError::Timeout
            | StoreError::InvalidTarget(_) => false,
        }
    }
}
