use serde::Deserialize;
use url::Url;

use crate::ConfigError;

/// Body of an ingestion request.
///
/// ```json
/// { "url": "https://dorzeczy.pl/feed", "account": "myaccount1234jb", "table": "mytable123" }
/// ```
///
/// `account` and `table` may be omitted when the process has defaults configured.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
}

/// A validated ingestion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestTarget {
    pub feed_url: Url,
    pub account: String,
    pub table: String,
}

impl IngestRequest {
    /// Validates the request, filling `account`/`table` from the given defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a field is absent and has no
    /// default, or [`ConfigError::InvalidField`] when a value is malformed.
    pub fn validate(
        self,
        default_account: Option<&str>,
        default_table: Option<&str>,
    ) -> Result<IngestTarget, ConfigError> {
        let raw_url = non_blank(self.url).ok_or(ConfigError::MissingField("url"))?;
        let feed_url = parse_feed_url(&raw_url)?;

        let account = non_blank(self.account)
            .or_else(|| default_account.map(ToOwned::to_owned))
            .ok_or(ConfigError::MissingField("account"))?;
        validate_account(&account)?;

        let table = non_blank(self.table)
            .or_else(|| default_table.map(ToOwned::to_owned))
            .ok_or(ConfigError::MissingField("table"))?;
        validate_table(&table)?;

        Ok(IngestTarget {
            feed_url,
            account,
            table,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_feed_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidField {
        field: "url",
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::InvalidField {
                field: "url",
                reason: format!("unsupported scheme `{other}`"),
            })
        }
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidField {
            field: "url",
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

/// Account names are substituted into the endpoint host, so only
/// 3-44 lowercase alphanumerics and inner hyphens are accepted.
fn validate_account(account: &str) -> Result<(), ConfigError> {
    let valid_chars = account
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !(3..=44).contains(&account.len())
        || !valid_chars
        || account.starts_with('-')
        || account.ends_with('-')
    {
        return Err(ConfigError::InvalidField {
            field: "account",
            reason: format!(
                "`{account}` must be 3-44 lowercase letters, digits or inner hyphens"
            ),
        });
    }
    Ok(())
}

fn validate_table(table: &str) -> Result<(), ConfigError> {
    let starts_with_letter = table.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if !(3..=63).contains(&table.len())
        || !starts_with_letter
        || !table.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(ConfigError::InvalidField {
            field: "table",
            reason: format!(
                "`{table}` must be 3-63 alphanumerics starting with a letter"
            ),
        });
    }
    Ok(())
}
