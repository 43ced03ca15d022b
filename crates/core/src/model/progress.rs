use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{ContentId, CourseId, UserId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors that can occur when mutating or rehydrating progress records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    /// A topic-only operation was aimed at a question record.
    #[error("record {0} is not a topic")]
    NotATopic(ContentId),

    /// Persisted data violates a record invariant.
    #[error("invalid persisted state: {0}")]
    InvalidPersistedState(String),
}

//
// ─── KIND & STATUS ────────────────────────────────────────────────────────────
//

/// Discriminates the two content shapes tracked by the engine.
///
/// Topics carry partial progress (0-100%); questions are single-shot
/// practice items created already terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Topic,
    Question,
}

/// Lifecycle status of a topic record.
///
/// `NotStarted` → `InProgress` → `Completed`; `Completed` is terminal,
/// there is no reset. Question records are born `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

//
// ─── CONTENT META ─────────────────────────────────────────────────────────────
//

/// Denormalized display metadata for a content item.
///
/// Best-effort copies from the content catalog; never authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMeta {
    pub title: String,
    pub subject: String,
    pub subject_slug: String,
}

//
// ─── TOPIC UPDATE OUTCOME ─────────────────────────────────────────────────────
//

/// Outcome of applying a progress update to a topic record.
///
/// `completed` reports the post-update status; `newly_completed` is true
/// only on the transition into `Completed`, letting callers distinguish
/// a first completion from a re-study of an already-finished topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicUpdate {
    pub completed: bool,
    pub newly_completed: bool,
}

//
// ─── PROGRESS RECORD ──────────────────────────────────────────────────────────
//

/// One learner's state for one content item.
///
/// Exactly one record exists per `(user, content)` pair. Records are
/// created on first interaction and never deleted by the engine.
/// `completion_percent`, `time_spent_seconds` and `last_accessed_at`
/// only move forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    user_id: UserId,
    content_id: ContentId,
    kind: ProgressKind,
    status: ProgressStatus,
    completion_percent: u8,
    correct: Option<bool>,
    time_spent_seconds: u64,
    last_accessed_at: DateTime<Utc>,
    course_id: Option<CourseId>,
    title: Option<String>,
    subject: Option<String>,
    subject_slug: Option<String>,
}

impl ProgressRecord {
    /// Creates the record for a topic the user has just opened.
    ///
    /// Starts at `InProgress` with 0% and no time logged. Callers are
    /// responsible for idempotence: if a record already exists for this
    /// content id, this constructor must not be used to replace it.
    #[must_use]
    pub fn started_topic(
        user_id: UserId,
        content_id: ContentId,
        course_id: Option<CourseId>,
        meta: Option<ContentMeta>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut record = Self {
            user_id,
            content_id,
            kind: ProgressKind::Topic,
            status: ProgressStatus::InProgress,
            completion_percent: 0,
            correct: None,
            time_spent_seconds: 0,
            last_accessed_at: now,
            course_id,
            title: None,
            subject: None,
            subject_slug: None,
        };
        if let Some(meta) = meta {
            record.merge_meta(&meta);
        }
        record
    }

    /// Creates the terminal record for an answered practice question.
    ///
    /// Questions have no partial-progress state: the record is born
    /// `Completed` at 100% with the outcome set.
    #[must_use]
    pub fn answered_question(
        user_id: UserId,
        content_id: ContentId,
        correct: bool,
        time_spent_seconds: u64,
        course_id: Option<CourseId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            content_id,
            kind: ProgressKind::Question,
            status: ProgressStatus::Completed,
            completion_percent: 100,
            correct: Some(correct),
            time_spent_seconds,
            last_accessed_at: now,
            course_id,
            title: None,
            subject: None,
            subject_slug: None,
        }
    }

    /// Rebuild a record from persisted fields.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidPersistedState` if the percent is
    /// out of range or a topic violates the completed ⇔ 100% invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        content_id: ContentId,
        kind: ProgressKind,
        status: ProgressStatus,
        completion_percent: u8,
        correct: Option<bool>,
        time_spent_seconds: u64,
        last_accessed_at: DateTime<Utc>,
        course_id: Option<CourseId>,
        title: Option<String>,
        subject: Option<String>,
        subject_slug: Option<String>,
    ) -> Result<Self, ProgressError> {
        if completion_percent > 100 {
            return Err(ProgressError::InvalidPersistedState(format!(
                "completion percent {completion_percent} out of range"
            )));
        }
        if kind == ProgressKind::Topic
            && (status == ProgressStatus::Completed) != (completion_percent == 100)
        {
            return Err(ProgressError::InvalidPersistedState(format!(
                "topic status {status:?} inconsistent with {completion_percent}%"
            )));
        }
        Ok(Self {
            user_id,
            content_id,
            kind,
            status,
            completion_percent,
            correct,
            time_spent_seconds,
            last_accessed_at,
            course_id,
            title,
            subject,
            subject_slug,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    #[must_use]
    pub fn kind(&self) -> ProgressKind {
        self.kind
    }

    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    #[must_use]
    pub fn completion_percent(&self) -> u8 {
        self.completion_percent
    }

    #[must_use]
    pub fn correct(&self) -> Option<bool> {
        self.correct
    }

    #[must_use]
    pub fn time_spent_seconds(&self) -> u64 {
        self.time_spent_seconds
    }

    #[must_use]
    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    #[must_use]
    pub fn course_id(&self) -> Option<&CourseId> {
        self.course_id.as_ref()
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[must_use]
    pub fn subject_slug(&self) -> Option<&str> {
        self.subject_slug.as_deref()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == ProgressStatus::Completed
    }

    /// True if any display metadata field is still missing.
    #[must_use]
    pub fn needs_meta(&self) -> bool {
        self.title.is_none() || self.subject.is_none() || self.subject_slug.is_none()
    }

    /// Apply a progress update to a topic record.
    ///
    /// The reported percent is clamped to 100 and folded with
    /// `max(current, reported)`, which keeps `completion_percent`
    /// monotonic and makes `Completed` terminal by construction.
    /// Status tracks percent: 100 ⇔ `Completed`, otherwise
    /// `InProgress`. Time accumulates; the access timestamp only moves
    /// forward.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotATopic` when called on a question
    /// record.
    pub fn apply_topic_update(
        &mut self,
        percent: u8,
        delta_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<TopicUpdate, ProgressError> {
        if self.kind != ProgressKind::Topic {
            return Err(ProgressError::NotATopic(self.content_id.clone()));
        }

        let was_complete = self.is_complete();
        self.completion_percent = self.completion_percent.max(percent.min(100));
        self.status = if self.completion_percent == 100 {
            ProgressStatus::Completed
        } else {
            ProgressStatus::InProgress
        };
        self.time_spent_seconds = self.time_spent_seconds.saturating_add(delta_seconds);
        self.touch(now);

        let completed = self.is_complete();
        Ok(TopicUpdate {
            completed,
            newly_completed: completed && !was_complete,
        })
    }

    /// Fill in missing display metadata; fields already present win.
    pub fn merge_meta(&mut self, meta: &ContentMeta) {
        if self.title.is_none() {
            self.title = Some(meta.title.clone());
        }
        if self.subject.is_none() {
            self.subject = Some(meta.subject.clone());
        }
        if self.subject_slug.is_none() {
            self.subject_slug = Some(meta.subject_slug.clone());
        }
    }

    /// Record an access without letting the timestamp move backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed_at = self.last_accessed_at.max(now);
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn topic() -> ProgressRecord {
        ProgressRecord::started_topic(
            UserId::new("u1"),
            ContentId::new("t1"),
            Some(CourseId::new("courseA")),
            None,
            fixed_now(),
        )
    }

    #[test]
    fn started_topic_begins_in_progress_at_zero() {
        let record = topic();
        assert_eq!(record.status(), ProgressStatus::InProgress);
        assert_eq!(record.completion_percent(), 0);
        assert_eq!(record.time_spent_seconds(), 0);
        assert_eq!(record.correct(), None);
    }

    #[test]
    fn update_moves_percent_and_accumulates_time() {
        let mut record = topic();
        let update = record
            .apply_topic_update(40, 60, fixed_now() + Duration::minutes(1))
            .unwrap();
        assert!(!update.completed);
        assert_eq!(record.completion_percent(), 40);
        assert_eq!(record.time_spent_seconds(), 60);

        record
            .apply_topic_update(70, 30, fixed_now() + Duration::minutes(2))
            .unwrap();
        assert_eq!(record.time_spent_seconds(), 90);
    }

    #[test]
    fn percent_is_monotonic_and_clamped() {
        let mut record = topic();
        record.apply_topic_update(80, 0, fixed_now()).unwrap();
        record.apply_topic_update(30, 0, fixed_now()).unwrap();
        assert_eq!(record.completion_percent(), 80);

        record.apply_topic_update(250, 0, fixed_now()).unwrap();
        assert_eq!(record.completion_percent(), 100);
        assert_eq!(record.status(), ProgressStatus::Completed);
    }

    #[test]
    fn completion_tracks_percent_exactly() {
        let mut record = topic();
        record.apply_topic_update(99, 0, fixed_now()).unwrap();
        assert!(!record.is_complete());

        let update = record.apply_topic_update(100, 0, fixed_now()).unwrap();
        assert!(update.completed);
        assert!(update.newly_completed);
        assert!(record.is_complete());
    }

    #[test]
    fn recompletion_is_completed_but_not_newly() {
        let mut record = topic();
        record.apply_topic_update(100, 10, fixed_now()).unwrap();

        let update = record.apply_topic_update(100, 20, fixed_now()).unwrap();
        assert!(update.completed);
        assert!(!update.newly_completed);
        assert_eq!(record.completion_percent(), 100);
        assert_eq!(record.time_spent_seconds(), 30);
    }

    #[test]
    fn updating_a_question_is_rejected() {
        let mut record = ProgressRecord::answered_question(
            UserId::new("u1"),
            ContentId::new("q1"),
            true,
            12,
            None,
            fixed_now(),
        );
        let err = record.apply_topic_update(50, 0, fixed_now()).unwrap_err();
        assert!(matches!(err, ProgressError::NotATopic(_)));
        assert!(record.is_complete());
        assert_eq!(record.correct(), Some(true));
    }

    #[test]
    fn access_timestamp_never_goes_backwards() {
        let mut record = topic();
        let later = fixed_now() + Duration::hours(1);
        record.apply_topic_update(10, 0, later).unwrap();
        record.apply_topic_update(20, 0, fixed_now()).unwrap();
        assert_eq!(record.last_accessed_at(), later);
    }

    #[test]
    fn merge_meta_fills_only_missing_fields() {
        let mut record = topic();
        record.merge_meta(&ContentMeta {
            title: "Kinematics".into(),
            subject: "Physics".into(),
            subject_slug: "physics".into(),
        });
        record.merge_meta(&ContentMeta {
            title: "Other".into(),
            subject: "Other".into(),
            subject_slug: "other".into(),
        });
        assert_eq!(record.title(), Some("Kinematics"));
        assert_eq!(record.subject_slug(), Some("physics"));
        assert!(!record.needs_meta());
    }

    #[test]
    fn from_persisted_rejects_invariant_violations() {
        let err = ProgressRecord::from_persisted(
            UserId::new("u1"),
            ContentId::new("t1"),
            ProgressKind::Topic,
            ProgressStatus::Completed,
            80,
            None,
            0,
            fixed_now(),
            None,
            None,
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ProgressError::InvalidPersistedState(_)));

        let err = ProgressRecord::from_persisted(
            UserId::new("u1"),
            ContentId::new("t1"),
            ProgressKind::Topic,
            ProgressStatus::InProgress,
            130,
            None,
            0,
            fixed_now(),
            None,
            None,
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ProgressError::InvalidPersistedState(_)));
    }
}
