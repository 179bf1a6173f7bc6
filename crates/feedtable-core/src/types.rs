use chrono::{DateTime, Utc};
use serde::Serialize;

/// One `<item>` of a feed, as decoded from the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    /// Raw description payload (usually CDATA-wrapped HTML), unmodified.
    pub description: String,
    /// Publish date exactly as the feed wrote it.
    pub publish_date: String,
    pub categories: Vec<String>,
    pub enclosure: Option<String>,
    pub guid: String,
}

impl FeedEntry {
    /// Stable identity of the entry within its feed: guid, else link, else title.
    #[must_use]
    pub fn identity(&self) -> &str {
        [&self.guid, &self.link, &self.title]
            .into_iter()
            .map(String::as_str)
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }
}

/// A feed entry reduced to what gets stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub title: String,
    pub publish_timestamp: DateTime<Utc>,
    pub description: String,
    /// [`FeedEntry::identity`] of the source entry; used for content-derived keys.
    pub source_id: String,
}

/// Two-part key of a table entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StorageKey {
    pub partition_key: String,
    pub row_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The publish date did not match the expected layout.
    DateFormat,
    /// The store rejected the upsert or could not be reached.
    Store,
    /// The request deadline passed before the upsert completed.
    Deadline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryResult {
    Stored {
        partition_key: String,
        row_key: String,
    },
    Failed {
        kind: FailureKind,
        reason: String,
    },
}

/// Result for one entry, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryOutcome {
    /// Zero-based position of the entry in the feed.
    pub position: usize,
    pub guid: String,
    pub title: String,
    #[serde(flatten)]
    pub result: EntryResult,
}

impl EntryOutcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.result, EntryResult::Failed { .. })
    }
}

/// Per-request aggregate of entry outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionOutcome {
    pub seen: usize,
    pub stored: usize,
    pub failed: usize,
    pub entries: Vec<EntryOutcome>,
}

impl IngestionOutcome {
    pub fn record_stored(&mut self, position: usize, entry: &FeedEntry, key: StorageKey) {
        self.seen += 1;
        self.stored += 1;
        self.entries.push(EntryOutcome {
            position,
            guid: entry.guid.clone(),
            title: entry.title.clone(),
            result: EntryResult::Stored {
                partition_key: key.partition_key,
                row_key: key.row_key,
            },
        });
    }

    pub fn record_failure(
        &mut self,
        position: usize,
        entry: &FeedEntry,
        kind: FailureKind,
        reason: impl Into<String>,
    ) {
        self.seen += 1;
        self.failed += 1;
        self.entries.push(EntryOutcome {
            position,
            guid: entry.guid.clone(),
            title: entry.title.clone(),
            result: EntryResult::Failed {
                kind,
                reason: reason.into(),
            },
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.entries.iter().filter(|e| e.is_failed())
    }

    /// Human-readable description of the first failed entry, if any.
    #[must_use]
    pub fn first_failure(&self) -> Option<String> {
        self.failures().next().map(|e| match &e.result {
            EntryResult::Failed { reason, .. } => {
                let label = if e.title.is_empty() { &e.guid } else { &e.title };
                format!("entry {} ({label}): {reason}", e.position)
            }
            EntryResult::Stored { .. } => String::new(),
        })
    }
}
