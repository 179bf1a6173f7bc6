//! Per-entry processing of a parsed feed: normalize, key, upsert.

use feedtable_core::{FailureKind, FeedEntry, IngestionOutcome};
use feedtable_feed::normalize_entry;
use feedtable_table::{EntityStore, KeyAssigner, StorageEntity, StoreError};
use tokio::time::{timeout_at, Instant};

const DEADLINE_PASSED: &str = "request deadline passed before the entry was stored";

/// Stores `entries` one at a time, in document order, and reports every
/// entry's result.
///
/// An entry whose publish date does not parse is recorded as failed and no
/// upsert is attempted for it. A store failure is recorded and the next
/// entry is still processed. Each upsert is bounded by `deadline`; once it
/// has passed, the remaining entries are reported as failed without being
/// attempted. Entries stored before that point stay stored.
pub async fn ingest_entries<S: EntityStore>(
    entries: &[FeedEntry],
    store: &S,
    keys: &KeyAssigner,
    deadline: Instant,
) -> IngestionOutcome {
    let mut outcome = IngestionOutcome::default();

    for (position, entry) in entries.iter().enumerate() {
        let record = match normalize_entry(entry) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    position,
                    guid = %entry.guid,
                    title = %entry.title,
                    error = %e,
                    "entry has an unparseable publish date; not stored"
                );
                outcome.record_failure(position, entry, FailureKind::DateFormat, e.to_string());
                continue;
            }
        };

        if Instant::now() >= deadline {
            outcome.record_failure(position, entry, FailureKind::Deadline, DEADLINE_PASSED);
            continue;
        }

        let key = keys.assign(&record);
        let entity = StorageEntity::from_record(&record, key.clone());

        match timeout_at(deadline, store.upsert(&entity)).await {
            Ok(Ok(())) => outcome.record_stored(position, entry, key),
            Ok(Err(e)) => {
                tracing::warn!(
                    position,
                    guid = %entry.guid,
                    row_key = %key.row_key,
                    error = %e,
                    "entry upsert failed"
                );
                outcome.record_failure(position, entry, FailureKind::Store, e.to_string());
            }
            Err(_) => {
                tracing::warn!(
                    position,
                    guid = %entry.guid,
                    row_key = %key.row_key,
                    "entry upsert cut off by request deadline"
                );
                outcome.record_failure(
                    position,
                    entry,
                    FailureKind::Deadline,
                    StoreError::Timeout.to_string(),
                );
            }
        }
    }

    outcome
}
