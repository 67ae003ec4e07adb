//! In-memory needle map rebuilt from a volume index file

use std::collections::HashMap;

use tracing::info;

use super::idx::{walk_index_file, ReadAt};
use super::types::{IndexRecord, NeedleId, Offset};
use crate::error::Result;

/// Location of a live needle inside its volume data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeedleValue {
    pub offset: Offset,
    pub size: u32,
}

/// Key -> location map with the counters a volume reports
#[derive(Debug, Default)]
pub struct NeedleMap {
    entries: HashMap<NeedleId, NeedleValue>,
    /// Records applied, puts and deletions alike
    pub record_count: u64,
    /// Deletion records that removed a live needle
    pub deletion_count: u64,
    /// Bytes held by needles that were overwritten or deleted
    pub deletion_bytes: u64,
    /// Largest key seen in any record
    pub max_key: NeedleId,
}

impl NeedleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay an index source; the last record for each key wins
    pub fn load<R: ReadAt + ?Sized>(reader: &R) -> Result<Self> {
        let mut map = Self::new();
        walk_index_file(reader, |key, offset, size| {
            map.apply(IndexRecord::new(key, offset, size));
            Ok(())
        })?;

        info!(
            "Loaded needle map: {} live, {} records, {} deletions",
            map.len(),
            map.record_count,
            map.deletion_count
        );
        Ok(map)
    }

    /// Apply one index record on top of the current state
    pub fn apply(&mut self, record: IndexRecord) {
        self.record_count += 1;
        self.max_key = self.max_key.max(record.key);

        if record.is_deletion() {
            if let Some(old) = self.entries.remove(&record.key) {
                self.deletion_count += 1;
                self.deletion_bytes += old.size as u64;
            }
            return;
        }

        let value = NeedleValue {
            offset: record.offset,
            size: record.size,
        };
        if let Some(old) = self.entries.insert(record.key, value) {
            self.deletion_bytes += old.size as u64;
        }
    }

    pub fn get(&self, key: NeedleId) -> Option<NeedleValue> {
        self.entries.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of live needle sizes
    pub fn content_size(&self) -> u64 {
        self.entries.values().map(|v| v.size as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NeedleId, &NeedleValue)> {
        self.entries.iter()
    }
}
