//! Feed retrieval and decoding.
//!
//! [`FeedClient`] downloads a feed body, [`parse_feed`] decodes an RSS
//! channel into [`FeedEntry`](feedtable_core::FeedEntry) values in document
//! order, and [`normalize_entry`] turns one entry into a storable record.

pub mod client;
pub mod error;
pub mod normalize;
pub mod parse;

pub use client::FeedClient;
pub use error::{DateFormatError, FetchError, ParseError};
pub use normalize::{normalize_entry, parse_publish_date, PUBLISH_DATE_FORMAT};
pub use parse::parse_feed;
