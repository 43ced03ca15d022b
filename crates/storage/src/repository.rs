use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use prep_core::model::{
    ContentId, CourseId, ProgressKind, ProgressRecord, ProgressStatus, StreakState, UserId,
};

use crate::mapping::{
    ProgressDocument, deep_merge, patch_to_value, progress_doc_key, streak_from_profile,
    streak_to_patch,
};

/// Errors surfaced by store adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The remote store could not be reached or refused the call.
    /// Callers degrade locally rather than failing the user action.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── MERGE PATCH ──────────────────────────────────────────────────────────────
//

/// Field subset for a merge-write against one progress document.
///
/// Every write the engine issues goes through a patch; absent fields are
/// left untouched in the store, which is what makes out-of-order write
/// completion safe for unrelated fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressPatch {
    pub kind: Option<ProgressKind>,
    pub status: Option<ProgressStatus>,
    pub completion_percent: Option<u8>,
    pub correct: Option<bool>,
    pub time_spent_seconds: Option<u64>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub course_id: Option<CourseId>,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub subject_slug: Option<String>,
}

impl ProgressPatch {
    /// Patch carrying every field of the record, used when first
    /// creating a document.
    #[must_use]
    pub fn full(record: &ProgressRecord) -> Self {
        Self {
            kind: Some(record.kind()),
            status: Some(record.status()),
            completion_percent: Some(record.completion_percent()),
            correct: record.correct(),
            time_spent_seconds: Some(record.time_spent_seconds()),
            last_accessed_at: Some(record.last_accessed_at()),
            course_id: record.course_id().cloned(),
            title: record.title().map(str::to_owned),
            subject: record.subject().map(str::to_owned),
            subject_slug: record.subject_slug().map(str::to_owned),
        }
    }
}

//
// ─── STORE CONTRACTS ──────────────────────────────────────────────────────────
//

/// Store contract for per-content progress documents.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Fetch every progress record belonging to a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store cannot be
    /// reached; callers treat this as "no progress yet, retry later".
    async fn load_all(&self, user_id: &UserId) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Merge the patch into the document for `(user, content)`,
    /// creating it when absent. Never a destructive replacement.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the write cannot be
    /// performed.
    async fn upsert(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
        patch: &ProgressPatch,
    ) -> Result<(), StorageError>;
}

/// Store contract for the streak fields on the user profile document.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Read the user's streak, `None` if never recorded.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be read or decoded.
    async fn read_streak(&self, user_id: &UserId) -> Result<Option<StreakState>, StorageError>;

    /// Merge the streak fields into the profile document, leaving
    /// unrelated profile data untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write cannot be performed.
    async fn write_streak(
        &self,
        user_id: &UserId,
        streak: &StreakState,
    ) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY STORE ──────────────────────────────────────────────────────────
//

/// In-memory document store for testing and prototyping.
///
/// Holds raw JSON documents and applies genuine field-level merges, so
/// it exercises the same wire mapping as the remote adapter. The
/// availability toggle simulates outages for failure-path tests.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    progress: Arc<Mutex<HashMap<String, Value>>>,
    profiles: Arc<Mutex<HashMap<String, Value>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StorageError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }

    /// Raw profile document, for asserting merge behavior in tests.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the lock is poisoned.
    pub fn profile_document(&self, user_id: &UserId) -> Result<Option<Value>, StorageError> {
        let guard = self
            .profiles
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(guard.get(user_id.as_str()).cloned())
    }

    /// Seed a profile document with arbitrary fields, as the rest of the
    /// platform would have written it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the lock is poisoned.
    pub fn seed_profile(&self, user_id: &UserId, doc: Value) -> Result<(), StorageError> {
        let mut guard = self
            .profiles
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        guard.insert(user_id.as_str().to_owned(), doc);
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for InMemoryStore {
    async fn load_all(&self, user_id: &UserId) -> Result<Vec<ProgressRecord>, StorageError> {
        self.check_available()?;
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let mut records = Vec::new();
        for doc in guard.values() {
            let document: ProgressDocument = serde_json::from_value(doc.clone())
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            if document.user_id == user_id.as_str() {
                records.push(document.into_record()?);
            }
        }
        Ok(records)
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
        patch: &ProgressPatch,
    ) -> Result<(), StorageError> {
        self.check_available()?;
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let key = progress_doc_key(user_id, content_id);
        let doc = guard.entry(key).or_insert_with(|| {
            serde_json::json!({
                "userId": user_id.as_str(),
                "contentId": content_id.as_str(),
            })
        });
        deep_merge(doc, &patch_to_value(patch));
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn read_streak(&self, user_id: &UserId) -> Result<Option<StreakState>, StorageError> {
        self.check_available()?;
        let guard = self
            .profiles
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        match guard.get(user_id.as_str()) {
            Some(doc) => streak_from_profile(doc),
            None => Ok(None),
        }
    }

    async fn write_streak(
        &self,
        user_id: &UserId,
        streak: &StreakState,
    ) -> Result<(), StorageError> {
        self.check_available()?;
        let mut guard = self
            .profiles
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let doc = guard
            .entry(user_id.as_str().to_owned())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        deep_merge(doc, &streak_to_patch(streak));
        Ok(())
    }
}

//
// ─── STORE AGGREGATE ──────────────────────────────────────────────────────────
//

/// Bundles the two store contracts behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Stores {
    pub progress: Arc<dyn ProgressStore>,
    pub profiles: Arc<dyn ProfileStore>,
}

impl Stores {
    #[must_use]
    pub fn in_memory() -> Self {
        let store = InMemoryStore::new();
        let progress: Arc<dyn ProgressStore> = Arc::new(store.clone());
        let profiles: Arc<dyn ProfileStore> = Arc::new(store);
        Self { progress, profiles }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
