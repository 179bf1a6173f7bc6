//! End-to-end handling of one ingestion request.

use std::sync::Arc;
use std::time::Duration;

use feedtable_core::{AppConfig, IngestRequest, IngestTarget, IngestionOutcome};
use feedtable_feed::{parse_feed, FeedClient, FetchError};
use feedtable_table::{KeyAssigner, StoreProvider, StoreSettings, TableServiceClient};
use tokio::time::{timeout_at, Instant};

use crate::error::IngestError;
use crate::pipeline::ingest_entries;

/// Per-request limits and request defaults.
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    /// Bounds the fetch and every upsert of one request.
    pub request_deadline: Duration,
    pub default_account: Option<String>,
    pub default_table: Option<String>,
}

impl HandlerSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            request_deadline: Duration::from_secs(config.request_deadline_secs),
            default_account: config.default_account.clone(),
            default_table: config.default_table.clone(),
        }
    }
}

/// Runs ingestion requests. One instance serves every request of the
/// process; the key assigner inside it is the only state shared between
/// concurrent requests.
pub struct IngestionHandler<P> {
    feeds: FeedClient,
    stores: P,
    keys: Arc<KeyAssigner>,
    settings: HandlerSettings,
}

impl IngestionHandler<TableServiceClient> {
    /// Builds a handler writing to the configured table service.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be constructed.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, IngestError> {
        let feeds = FeedClient::new(
            config.fetch_timeout_secs,
            &config.user_agent,
            config.max_feed_bytes,
        )?;
        let stores = TableServiceClient::new(&StoreSettings::from_app_config(config))?;
        let keys = KeyAssigner::new(config.row_key_policy, config.partition.clone());
        Ok(Self::new(
            feeds,
            stores,
            Arc::new(keys),
            HandlerSettings::from_app_config(config),
        ))
    }
}

impl<P: StoreProvider> IngestionHandler<P> {
    #[must_use]
    pub fn new(
        feeds: FeedClient,
        stores: P,
        keys: Arc<KeyAssigner>,
        settings: HandlerSettings,
    ) -> Self {
        Self {
            feeds,
            stores,
            keys,
            settings,
        }
    }

    /// Number of storage keys issued since the handler was built.
    #[must_use]
    pub fn keys_issued(&self) -> u64 {
        self.keys.issued()
    }

    /// Validates `request`, fetches and parses the feed, and stores its
    /// entries.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] when the request is aborted before any entry
    /// is processed: invalid request fields or target, fetch failure or
    /// timeout, or a feed that does not parse. Entry-level failures are
    /// reported in the returned outcome instead.
    pub async fn handle(&self, request: IngestRequest) -> Result<IngestionOutcome, IngestError> {
        let deadline = Instant::now() + self.settings.request_deadline;

        let result = match request.validate(
            self.settings.default_account.as_deref(),
            self.settings.default_table.as_deref(),
        ) {
            Ok(target) => self.run(&target, deadline).await,
            Err(e) => Err(e.into()),
        };

        match &result {
            Ok(outcome) => tracing::info!(
                seen = outcome.seen,
                stored = outcome.stored,
                failed = outcome.failed,
                "ingestion completed"
            ),
            Err(e) => tracing::warn!(
                stage = %e.stage(),
                code = e.code(),
                error = %e,
                "ingestion aborted"
            ),
        }
        result
    }

    async fn run(
        &self,
        target: &IngestTarget,
        deadline: Instant,
    ) -> Result<IngestionOutcome, IngestError> {
        tracing::debug!(
            url = %target.feed_url,
            account = %target.account,
            table = %target.table,
            "request validated"
        );
        let store = self.stores.open(&target.account, &target.table)?;

        let body = timeout_at(deadline, self.feeds.fetch(&target.feed_url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: target.feed_url.to_string(),
            })??;
        tracing::debug!(bytes = body.len(), "feed fetched");

        let entries = parse_feed(&body)?;
        tracing::debug!(entries = entries.len(), "feed parsed");

        Ok(ingest_entries(&entries, &store, &self.keys, deadline).await)
    }
}
