use thiserror::Error;

/// Failure to retrieve a feed body.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Network or TLS failure talking to the feed host.
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("feed at {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

/// The feed body is not a well-formed RSS channel document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("feed is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("document has no root element")]
    NoRoot,

    #[error("expected <rss> root element, found <{0}>")]
    UnexpectedRoot(String),

    #[error("document does not match the channel/item layout: {0}")]
    Schema(String),
}

/// An entry's publish date is not in the expected layout.
#[derive(Debug, Error)]
#[error("publish date {value:?} does not match `{expected}`: {reason}")]
pub struct DateFormatError {
    pub value: String,
    pub expected: &'static str,
    pub reason: String,
}
