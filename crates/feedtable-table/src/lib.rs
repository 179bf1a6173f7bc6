//! Table-store side of the pipeline: key assignment, entity encoding and
//! authenticated upserts against a partitioned table endpoint.

pub mod client;
pub mod credential;
pub mod entity;
pub mod error;
pub mod keys;

mod retry;

pub use client::{EntityStore, StoreProvider, StoreSettings, TableClient, TableServiceClient};
pub use credential::ClientSecretCredential;
pub use entity::{EntityProperty, StorageEntity};
pub use error::StoreError;
pub use keys::KeyAssigner;
