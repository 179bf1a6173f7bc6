//! Request-level orchestration of feed ingestion.
//!
//! [`IngestionHandler`] takes one [`IngestRequest`](feedtable_core::IngestRequest)
//! through validation, fetch and parse, then stores each entry in document
//! order. Failures before the first entry abort the request with an
//! [`IngestError`]; failures of individual entries are recorded in the
//! returned [`IngestionOutcome`](feedtable_core::IngestionOutcome) and the
//! remaining entries are still processed.

pub mod error;
pub mod handler;
pub mod pipeline;

pub use error::{IngestError, IngestStage};
pub use handler::{HandlerSettings, IngestionHandler};
pub use pipeline::ingest_entries;
