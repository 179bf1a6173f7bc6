//! HTTP client for table-store entity upserts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use feedtable_core::AppConfig;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header, Client, StatusCode, Url};
use serde::Deserialize;

use crate::credential::ClientSecretCredential;
use crate::entity::StorageEntity;
use crate::error::StoreError;
use crate::retry::retry_with_backoff;

const API_VERSION: &str = "2019-02-02";
const DATA_SERVICE_VERSION: &str = "3.0;NetFx";

/// Characters kept literal inside a quoted key in an entity path.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Anything entities can be upserted into.
///
/// Implemented by [`TableClient`]; tests substitute in-memory stores.
pub trait EntityStore: Send + Sync {
    /// Insert the entity, or replace the one stored under the same key.
    fn upsert(&self, entity: &StorageEntity)
        -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Resolves an account/table pair to a store handle.
pub trait StoreProvider: Send + Sync {
    type Store: EntityStore;

    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTarget`] when the pair does not address a
    /// usable table.
    fn open(&self, account: &str, table: &str) -> Result<Self::Store, StoreError>;
}

/// Connection settings for the table service.
#[derive(Clone)]
pub struct StoreSettings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub authority_host: String,
    pub token_scope: String,
    /// Endpoint template; `{account}` is replaced with the account name.
    pub endpoint_template: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl StoreSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tenant_id: config.tenant_id.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            authority_host: config.authority_host.clone(),
            token_scope: config.token_scope.clone(),
            endpoint_template: config.table_endpoint.clone(),
            user_agent: config.user_agent.clone(),
            timeout_secs: config.store_timeout_secs,
            max_retries: config.store_max_retries,
            retry_backoff_ms: config.store_retry_backoff_ms,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    backoff_base_ms: u64,
}

/// Shared entry point to the table service: one HTTP client and one
/// credential for every account/table the process writes to.
#[derive(Debug, Clone)]
pub struct TableServiceClient {
    http: Client,
    credential: Arc<ClientSecretCredential>,
    endpoint_template: String,
    retry: RetryPolicy,
}

impl TableServiceClient {
    /// # Errors
    ///
    /// Returns [`StoreError::Client`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(settings: &StoreSettings) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(StoreError::Client)?;

        let credential = ClientSecretCredential::new(
            http.clone(),
            &settings.authority_host,
            &settings.tenant_id,
            &settings.client_id,
            &settings.client_secret,
            &settings.token_scope,
        );

        Ok(Self {
            http,
            credential: Arc::new(credential),
            endpoint_template: settings.endpoint_template.clone(),
            retry: RetryPolicy {
                max_retries: settings.max_retries,
                backoff_base_ms: settings.retry_backoff_ms,
            },
        })
    }

    /// Client for one table under one account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTarget`] if the endpoint template does
    /// not produce a valid URL for `account`.
    pub fn table(&self, account: &str, table: &str) -> Result<TableClient, StoreError> {
        let endpoint = self.endpoint_template.replace("{account}", account);
        let normalised = format!("{}/", endpoint.trim_end_matches('/'));
        let endpoint = Url::parse(&normalised)
            .map_err(|e| StoreError::InvalidTarget(format!("endpoint '{normalised}': {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(StoreError::InvalidTarget(format!(
                "endpoint '{normalised}' cannot carry a table path"
            )));
        }

        Ok(TableClient {
            http: self.http.clone(),
            credential: Arc::clone(&self.credential),
            endpoint,
            table: table.to_owned(),
            retry: self.retry,
        })
    }
}

/// Writes entities into one table.
#[derive(Debug, Clone)]
pub struct TableClient {
    http: Client,
    credential: Arc<ClientSecretCredential>,
    endpoint: Url,
    table: String,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct ODataErrorEnvelope {
    #[serde(rename = "odata.error")]
    error: ODataError,
}

#[derive(Deserialize)]
struct ODataError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: ODataMessage,
}

#[derive(Default, Deserialize)]
struct ODataMessage {
    #[serde(default)]
    value: String,
}

impl TableClient {
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Full URL addressing one entity, e.g.
    /// `https://acct.table.cosmos.azure.com/news(PartitionKey='id',RowKey='42')`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTarget`] if the result is not a valid URL.
    pub fn entity_url(&self, partition_key: &str, row_key: &str) -> Result<Url, StoreError> {
        let path = format!(
            "{}(PartitionKey='{}',RowKey='{}')",
            self.table,
            encode_key(partition_key),
            encode_key(row_key)
        );
        self.endpoint
            .join(&path)
            .map_err(|e| StoreError::InvalidTarget(format!("entity path '{path}': {e}")))
    }

    async fn put_entity(&self, url: &Url, body: &[u8]) -> Result<(), StoreError> {
        let token = self.credential.token().await?;
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let response = self
            .http
            .put(url.clone())
            .bearer_auth(token)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-date", date)
            .header("DataServiceVersion", DATA_SERVICE_VERSION)
            .header("MaxDataServiceVersion", DATA_SERVICE_VERSION)
            .header(header::ACCEPT, "application/json;odata=nometadata")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::UNAUTHORIZED {
            self.credential.invalidate().await;
        }

        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ODataErrorEnvelope>(&text) {
            Ok(envelope) => (envelope.error.code, envelope.error.message.value),
            Err(_) => (String::from("Unknown"), truncate(&text, 512)),
        };
        Err(StoreError::Rejected {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

impl StoreProvider for TableServiceClient {
    type Store = TableClient;

    fn open(&self, account: &str, table: &str) -> Result<TableClient, StoreError> {
        self.table(account, table)
    }
}

impl EntityStore for TableClient {
    /// Upserts with insert-or-replace semantics, retrying transient failures.
    async fn upsert(&self, entity: &StorageEntity) -> Result<(), StoreError> {
        let url = self.entity_url(&entity.key.partition_key, &entity.key.row_key)?;
        let body = serde_json::to_vec(entity)?;

        retry_with_backoff(self.retry.max_retries, self.retry.backoff_base_ms, || {
            self.put_entity(&url, &body)
        })
        .await?;

        tracing::debug!(
            table = %self.table,
            partition_key = %entity.key.partition_key,
            row_key = %entity.key.row_key,
            "upserted entity"
        );
        Ok(())
    }
}

/// Quote-escape a key value and percent-encode it for use in an entity path.
fn encode_key(key: &str) -> String {
    utf8_percent_encode(&key.replace('\'', "''"), KEY_ENCODE_SET).to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
