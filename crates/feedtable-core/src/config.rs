use crate::app_config::{AppConfig, Environment, PartitionScheme, RowKeyPolicy};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load a `.env` file before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        optional(var).unwrap_or_else(|| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let tenant_id = require("AZURE_TENANT_ID")?;
    let client_id = require("AZURE_CLIENT_ID")?;
    let client_secret = require("AZURE_CLIENT_SECRET")?;

    let env = parse_environment(&or_default("FEEDTABLE_ENV", "development"));

    // A function host hands custom handlers their port; it wins over the bind address.
    let bind_addr = match optional("FUNCTIONS_CUSTOMHANDLER_PORT") {
        Some(port) => {
            let port = port
                .parse::<u16>()
                .map_err(|e| invalid("FUNCTIONS_CUSTOMHANDLER_PORT", e.to_string()))?;
            SocketAddr::from(([0, 0, 0, 0], port))
        }
        None => or_default("FEEDTABLE_BIND_ADDR", "0.0.0.0:8080")
            .parse::<SocketAddr>()
            .map_err(|e| invalid("FEEDTABLE_BIND_ADDR", e.to_string()))?,
    };

    let log_level = or_default("FEEDTABLE_LOG_LEVEL", "info");
    let authority_host = or_default("AZURE_AUTHORITY_HOST", "https://login.microsoftonline.com")
        .trim_end_matches('/')
        .to_string();
    let token_scope = or_default("FEEDTABLE_TOKEN_SCOPE", "https://cosmos.azure.com/.default");
    let table_endpoint = or_default(
        "FEEDTABLE_TABLE_ENDPOINT",
        "https://{account}.table.cosmos.azure.com",
    );
    let default_account = optional("FEEDTABLE_DEFAULT_ACCOUNT");
    let default_table = optional("FEEDTABLE_DEFAULT_TABLE");
    let user_agent = or_default("FEEDTABLE_USER_AGENT", "feedtable/0.1 (feed-ingestion)");

    let fetch_timeout_secs = parse_u64("FEEDTABLE_FETCH_TIMEOUT_SECS", "30")?;
    let max_feed_bytes = parse_usize("FEEDTABLE_MAX_FEED_BYTES", "10485760")?;
    let store_timeout_secs = parse_u64("FEEDTABLE_STORE_TIMEOUT_SECS", "30")?;
    let store_max_retries = parse_u32("FEEDTABLE_STORE_MAX_RETRIES", "2")?;
    let store_retry_backoff_ms = parse_u64("FEEDTABLE_STORE_RETRY_BACKOFF_MS", "250")?;
    let request_deadline_secs = parse_u64("FEEDTABLE_REQUEST_DEADLINE_SECS", "120")?;
    if request_deadline_secs == 0 {
        return Err(invalid(
            "FEEDTABLE_REQUEST_DEADLINE_SECS",
            "must be greater than zero".to_string(),
        ));
    }

    let row_key_policy = parse_row_key_policy(&or_default("FEEDTABLE_ROW_KEY_POLICY", "sequence"))
        .ok_or_else(|| {
            invalid(
                "FEEDTABLE_ROW_KEY_POLICY",
                "expected `sequence` or `content`".to_string(),
            )
        })?;

    let buckets = parse_u32("FEEDTABLE_PARTITION_BUCKETS", "0")?;
    let partition = if buckets > 0 {
        PartitionScheme::Buckets(buckets)
    } else {
        PartitionScheme::Constant(or_default("FEEDTABLE_PARTITION_KEY", "id"))
    };

    let cors_origins = or_default(
        "FEEDTABLE_CORS_ORIGINS",
        "http://localhost,https://portal.azure.com",
    )
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(ToOwned::to_owned)
    .collect();

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        tenant_id,
        client_id,
        client_secret,
        authority_host,
        token_scope,
        table_endpoint,
        default_account,
        default_table,
        user_agent,
        fetch_timeout_secs,
        max_feed_bytes,
        store_timeout_secs,
        store_max_retries,
        store_retry_backoff_ms,
        request_deadline_secs,
        row_key_policy,
        partition,
        cors_origins,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_row_key_policy(s: &str) -> Option<RowKeyPolicy> {
    match s.to_ascii_lowercase().as_str() {
        "sequence" => Some(RowKeyPolicy::Sequence),
        "content" => Some(RowKeyPolicy::Content),
        _ => None,
    }
}
