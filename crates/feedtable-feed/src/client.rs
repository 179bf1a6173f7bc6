//! HTTP retrieval of raw feed documents.

use std::time::Duration;

use reqwest::{header::CONTENT_LENGTH, Client, Url};

use crate::error::FetchError;

/// Fetches raw feed bodies over HTTP.
///
/// One GET per call, no retries: a failed fetch is reported to the caller,
/// which owns any retry policy. Bodies larger than `max_bytes` are rejected
/// without being buffered in full.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    max_bytes: usize,
}

impl FeedClient {
    /// Creates a client with the given per-request timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str, max_bytes: usize) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client, max_bytes })
    }

    /// Downloads the feed at `url` and returns its body.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] if the request exceeds the client timeout.
    /// - [`FetchError::Http`] on any other network failure.
    /// - [`FetchError::Status`] on a non-2xx response.
    /// - [`FetchError::TooLarge`] if the body exceeds the configured cap.
    pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.max_bytes) {
            return Err(self.too_large(url));
        }

        let mut body = Vec::with_capacity(declared.unwrap_or(0));
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error(url, e))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(url = %url, bytes = body.len(), "fetched feed");
        Ok(body)
    }

    fn too_large(&self, url: &Url) -> FetchError {
        FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        }
    }
}

fn transport_error(url: &Url, source: reqwest::Error) -> FetchError {
    if source.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source,
        }
    }
}
