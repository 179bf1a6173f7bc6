use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// How row keys are derived for stored entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKeyPolicy {
    /// Process-epoch prefix plus an in-memory sequence. Distinct across
    /// restarts as long as the wall clock does not move backwards.
    Sequence,
    /// SHA-256 of the entry's feed identity. Re-ingesting the same entry
    /// replaces the same row.
    Content,
}

/// How partition keys are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionScheme {
    /// Every entity lands in one named partition.
    Constant(String),
    /// Entities are spread over `p0..p{n-1}`.
    Buckets(u32),
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub authority_host: String,
    pub token_scope: String,
    /// Endpoint template; `{account}` is replaced with the target account.
    pub table_endpoint: String,
    pub default_account: Option<String>,
    pub default_table: Option<String>,
    pub user_agent: String,
    pub fetch_timeout_secs: u64,
    pub max_feed_bytes: usize,
    pub store_timeout_secs: u64,
    pub store_max_retries: u32,
    pub store_retry_backoff_ms: u64,
    pub request_deadline_secs: u64,
    pub row_key_policy: RowKeyPolicy,
    pub partition: PartitionScheme,
    pub cors_origins: Vec<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("authority_host", &self.authority_host)
            .field("token_scope", &self.token_scope)
            .field("table_endpoint", &self.table_endpoint)
            .field("default_account", &self.default_account)
            .field("default_table", &self.default_table)
            .field("user_agent", &self.user_agent)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("max_feed_bytes", &self.max_feed_bytes)
            .field("store_timeout_secs", &self.store_timeout_secs)
            .field("store_max_retries", &self.store_max_retries)
            .field("store_retry_backoff_ms", &self.store_retry_backoff_ms)
            .field("request_deadline_secs", &self.request_deadline_secs)
            .field("row_key_policy", &self.row_key_policy)
            .field("partition", &self.partition)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}
