//! Partition/row key assignment.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use feedtable_core::{NormalizedRecord, PartitionScheme, RowKeyPolicy, StorageKey};
use sha2::{Digest, Sha256};

/// Issues storage keys for records. One instance is shared by every request
/// the process serves.
///
/// With [`RowKeyPolicy::Sequence`] each record draws a number from a single
/// atomic counter, so concurrent requests never receive the same row key.
/// Keys are prefixed with the process start time in milliseconds, which
/// keeps them distinct from keys issued before a restart and keeps them
/// ordered by issue time. With [`RowKeyPolicy::Content`] the row key is
/// derived from the entry's feed identity, so ingesting the same entry again
/// replaces the earlier row instead of adding a new one.
#[derive(Debug)]
pub struct KeyAssigner {
    policy: RowKeyPolicy,
    partition: PartitionScheme,
    epoch_ms: u64,
    next: AtomicU64,
}

impl KeyAssigner {
    #[must_use]
    pub fn new(policy: RowKeyPolicy, partition: PartitionScheme) -> Self {
        let epoch_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        Self::with_epoch(policy, partition, epoch_ms)
    }

    /// Like [`KeyAssigner::new`] with an explicit process epoch.
    #[must_use]
    pub fn with_epoch(policy: RowKeyPolicy, partition: PartitionScheme, epoch_ms: u64) -> Self {
        Self {
            policy,
            partition,
            epoch_ms,
            next: AtomicU64::new(0),
        }
    }

    /// Assign the key for one record.
    pub fn assign(&self, record: &NormalizedRecord) -> StorageKey {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);

        match self.policy {
            RowKeyPolicy::Content if !record.source_id.is_empty() => {
                let digest = Sha256::digest(record.source_id.as_bytes());
                let bucket_seed = u64::from(u32::from_be_bytes([
                    digest[0], digest[1], digest[2], digest[3],
                ]));
                StorageKey {
                    partition_key: self.partition_for(bucket_seed),
                    row_key: to_hex(&digest[..16]),
                }
            }
            RowKeyPolicy::Content => {
                tracing::debug!(seq, "record has no identity; falling back to sequence key");
                self.sequence_key(seq)
            }
            RowKeyPolicy::Sequence => self.sequence_key(seq),
        }
    }

    /// Number of keys issued so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }

    fn sequence_key(&self, seq: u64) -> StorageKey {
        StorageKey {
            partition_key: self.partition_for(seq),
            row_key: format!("{:013}-{seq:010}", self.epoch_ms),
        }
    }

    fn partition_for(&self, seed: u64) -> String {
        match &self.partition {
            PartitionScheme::Constant(key) => key.clone(),
            PartitionScheme::Buckets(n) => format!("p{}", seed % u64::from((*n).max(1))),
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(DIGITS[usize::from(b >> 4)]));
        out.push(char::from(DIGITS[usize::from(b & 0x0f)]));
    }
    out
}
