//! Wire shapes for the remote document store.
//!
//! Documents are stored as camelCase JSON, keyed by `{userId}_{contentId}`
//! for progress records and by `userId` for profiles. These structs mirror
//! the domain types so adapters can serialize without leaking storage
//! concerns into the domain layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use prep_core::model::{
    ContentId, CourseId, ProgressKind, ProgressRecord, ProgressStatus, StreakState, UserId,
};

use crate::repository::{ProgressPatch, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Composite document key for a progress record.
#[must_use]
pub fn progress_doc_key(user_id: &UserId, content_id: &ContentId) -> String {
    format!("{user_id}_{content_id}")
}

//
// ─── ENUM ENCODING ────────────────────────────────────────────────────────────
//

pub(crate) fn kind_to_str(kind: ProgressKind) -> &'static str {
    match kind {
        ProgressKind::Topic => "topic",
        ProgressKind::Question => "question",
    }
}

pub(crate) fn kind_from_str(s: &str) -> Result<ProgressKind, StorageError> {
    match s {
        "topic" => Ok(ProgressKind::Topic),
        "question" => Ok(ProgressKind::Question),
        _ => Err(StorageError::Serialization(format!("invalid kind: {s}"))),
    }
}

pub(crate) fn status_to_str(status: ProgressStatus) -> &'static str {
    match status {
        ProgressStatus::NotStarted => "not_started",
        ProgressStatus::InProgress => "in_progress",
        ProgressStatus::Completed => "completed",
    }
}

pub(crate) fn status_from_str(s: &str) -> Result<ProgressStatus, StorageError> {
    match s {
        "not_started" => Ok(ProgressStatus::NotStarted),
        "in_progress" => Ok(ProgressStatus::InProgress),
        "completed" => Ok(ProgressStatus::Completed),
        _ => Err(StorageError::Serialization(format!("invalid status: {s}"))),
    }
}

//
// ─── PROGRESS DOCUMENT ────────────────────────────────────────────────────────
//

/// Full stored shape of a progress record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDocument {
    pub user_id: String,
    pub content_id: String,
    pub kind: String,
    pub status: String,
    #[serde(default)]
    pub completion_percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
    #[serde(default)]
    pub time_spent_seconds: u64,
    pub last_accessed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_slug: Option<String>,
}

impl ProgressDocument {
    #[must_use]
    pub fn from_record(record: &ProgressRecord) -> Self {
        Self {
            user_id: record.user_id().as_str().to_owned(),
            content_id: record.content_id().as_str().to_owned(),
            kind: kind_to_str(record.kind()).to_owned(),
            status: status_to_str(record.status()).to_owned(),
            completion_percent: record.completion_percent(),
            correct: record.correct(),
            time_spent_seconds: record.time_spent_seconds(),
            last_accessed_at: record.last_accessed_at(),
            course_id: record.course_id().map(|c| c.as_str().to_owned()),
            title: record.title().map(str::to_owned),
            subject: record.subject().map(str::to_owned),
            subject_slug: record.subject_slug().map(str::to_owned),
        }
    }

    /// Convert the document back into a domain record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for unknown enum encodings
    /// or records violating domain invariants.
    pub fn into_record(self) -> Result<ProgressRecord, StorageError> {
        let kind = kind_from_str(&self.kind)?;
        let status = status_from_str(&self.status)?;
        ProgressRecord::from_persisted(
            UserId::new(self.user_id),
            ContentId::new(self.content_id),
            kind,
            status,
            self.completion_percent,
            self.correct,
            self.time_spent_seconds,
            self.last_accessed_at,
            self.course_id.map(CourseId::new),
            self.title,
            self.subject,
            self.subject_slug,
        )
        .map_err(ser)
    }
}

/// Encode a merge patch as a partial document.
///
/// Only fields present in the patch appear in the output, so the store
/// write touches nothing else.
#[must_use]
pub fn patch_to_value(patch: &ProgressPatch) -> Value {
    let mut fields = Map::new();
    if let Some(kind) = patch.kind {
        fields.insert("kind".into(), kind_to_str(kind).into());
    }
    if let Some(status) = patch.status {
        fields.insert("status".into(), status_to_str(status).into());
    }
    if let Some(percent) = patch.completion_percent {
        fields.insert("completionPercent".into(), percent.into());
    }
    if let Some(correct) = patch.correct {
        fields.insert("correct".into(), correct.into());
    }
    if let Some(seconds) = patch.time_spent_seconds {
        fields.insert("timeSpentSeconds".into(), seconds.into());
    }
    if let Some(at) = patch.last_accessed_at {
        fields.insert("lastAccessedAt".into(), Value::String(at.to_rfc3339()));
    }
    if let Some(course_id) = &patch.course_id {
        fields.insert("courseId".into(), course_id.as_str().into());
    }
    if let Some(title) = &patch.title {
        fields.insert("title".into(), title.as_str().into());
    }
    if let Some(subject) = &patch.subject {
        fields.insert("subject".into(), subject.as_str().into());
    }
    if let Some(slug) = &patch.subject_slug {
        fields.insert("subjectSlug".into(), slug.as_str().into());
    }
    Value::Object(fields)
}

//
// ─── PROFILE DOCUMENT ─────────────────────────────────────────────────────────
//

/// Streak fields nested under the profile's `stats` object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak: Option<u32>,
    #[serde(
        default,
        rename = "lastAccess",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_access: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ProfileDocument {
    #[serde(default)]
    pub stats: Option<ProfileStats>,
}

/// Extract the streak from a profile document, if both fields are set.
///
/// Profiles hold unrelated data and may predate streak tracking, so a
/// missing or partial `stats` object reads as "no streak yet".
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the document is not an
/// object of the expected shape.
pub fn streak_from_profile(doc: &Value) -> Result<Option<StreakState>, StorageError> {
    let profile: ProfileDocument = serde_json::from_value(doc.clone()).map_err(ser)?;
    let Some(stats) = profile.stats else {
        return Ok(None);
    };
    match (stats.streak, stats.last_access) {
        (Some(days), Some(last_study_date)) => Ok(Some(StreakState {
            days,
            last_study_date,
        })),
        _ => Ok(None),
    }
}

/// Encode a streak update as a merge patch against the profile document.
#[must_use]
pub fn streak_to_patch(streak: &StreakState) -> Value {
    serde_json::json!({
        "stats": {
            "streak": streak.days,
            "lastAccess": streak.last_study_date,
        }
    })
}

//
// ─── MERGE SEMANTICS ──────────────────────────────────────────────────────────
//

/// Field-level merge of `patch` into `doc`.
///
/// Nested objects merge recursively; any other value replaces the
/// destination. This mirrors the hosted store's merge-write behavior and
/// is what keeps unrelated profile fields intact.
pub fn deep_merge(doc: &mut Value, patch: &Value) {
    match (doc, patch) {
        (Value::Object(doc_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                deep_merge(doc_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (doc, patch) => *doc = patch.clone(),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::time::fixed_now;
    use serde_json::json;

    #[test]
    fn document_round_trips_a_topic_record() {
        let mut record = ProgressRecord::started_topic(
            UserId::new("u1"),
            ContentId::new("t1"),
            Some(CourseId::new("courseA")),
            None,
            fixed_now(),
        );
        record.apply_topic_update(60, 45, fixed_now()).unwrap();

        let doc = ProgressDocument::from_record(&record);
        assert_eq!(doc.kind, "topic");
        assert_eq!(doc.status, "in_progress");

        let back = doc.into_record().unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn unknown_kind_is_a_serialization_error() {
        let doc = ProgressDocument {
            user_id: "u1".into(),
            content_id: "t1".into(),
            kind: "lesson".into(),
            status: "in_progress".into(),
            completion_percent: 0,
            correct: None,
            time_spent_seconds: 0,
            last_accessed_at: fixed_now(),
            course_id: None,
            title: None,
            subject: None,
            subject_slug: None,
        };
        assert!(matches!(
            doc.into_record(),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = ProgressPatch {
            completion_percent: Some(70),
            time_spent_seconds: Some(120),
            ..ProgressPatch::default()
        };
        let value = patch_to_value(&patch);
        assert_eq!(
            value,
            json!({"completionPercent": 70, "timeSpentSeconds": 120})
        );
    }

    #[test]
    fn doc_key_is_user_then_content() {
        assert_eq!(
            progress_doc_key(&UserId::new("u1"), &ContentId::new("t9")),
            "u1_t9"
        );
    }

    #[test]
    fn profile_without_stats_has_no_streak() {
        assert_eq!(streak_from_profile(&json!({"name": "Ana"})).unwrap(), None);
        assert_eq!(
            streak_from_profile(&json!({"stats": {"streak": 3}})).unwrap(),
            None
        );
    }

    #[test]
    fn profile_streak_round_trips_through_patch() {
        let streak = StreakState {
            days: 4,
            last_study_date: "2024-06-01".parse().unwrap(),
        };
        let mut doc = json!({"name": "Ana", "stats": {"streak": 1, "lastAccess": "2024-05-20", "plan": "pro"}});
        deep_merge(&mut doc, &streak_to_patch(&streak));

        assert_eq!(streak_from_profile(&doc).unwrap(), Some(streak));
        // unrelated fields survive the merge
        assert_eq!(doc["name"], "Ana");
        assert_eq!(doc["stats"]["plan"], "pro");
    }

    #[test]
    fn deep_merge_replaces_scalars_and_merges_objects() {
        let mut doc = json!({"a": 1, "nested": {"x": 1, "y": 2}});
        deep_merge(&mut doc, &json!({"a": 9, "nested": {"y": 5}, "b": true}));
        assert_eq!(doc, json!({"a": 9, "b": true, "nested": {"x": 1, "y": 5}}));
    }
}
