use std::collections::HashMap;

use prep_core::model::{ContentId, ProgressRecord};

/// Session-local replica of the user's progress records.
///
/// Authoritative for the current session only; the remote store is the
/// source of truth across sessions. Updated optimistically on every
/// mutation, independent of store latency, so reads reflect the change
/// even while the remote write is in flight.
#[derive(Debug, Default)]
pub struct ProgressCache {
    records: HashMap<ContentId, ProgressRecord>,
}

impl ProgressCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire cache with freshly loaded records.
    pub fn load(&mut self, records: Vec<ProgressRecord>) {
        self.records = records
            .into_iter()
            .map(|record| (record.content_id().clone(), record))
            .collect();
    }

    #[must_use]
    pub fn get(&self, content_id: &ContentId) -> Option<&ProgressRecord> {
        self.records.get(content_id)
    }

    #[must_use]
    pub fn contains(&self, content_id: &ContentId) -> bool {
        self.records.contains_key(content_id)
    }

    /// Replace the record for `content_id` with `updater(current)`.
    ///
    /// This is the only mutation path. Per-key replace-with-updater
    /// semantics avoid lost updates as long as calls for one key are
    /// sequenced, which they are within a session.
    pub fn apply<F>(&mut self, content_id: &ContentId, updater: F) -> &ProgressRecord
    where
        F: FnOnce(Option<ProgressRecord>) -> ProgressRecord,
    {
        let current = self.records.remove(content_id);
        let updated = updater(current);
        self.records
            .entry(content_id.clone())
            .insert_entry(updated)
            .into_mut()
    }

    pub fn records(&self) -> impl Iterator<Item = &ProgressRecord> {
        self.records.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
