use std::sync::Arc;

use tracing::{debug, warn};

use prep_core::model::{
    ContentId, ContentMeta, CourseId, CourseRollup, ProgressError, ProgressKind, ProgressRecord,
    Statistics, StreakState, UserId,
};
use prep_core::time::Clock;
use storage::repository::{ProgressPatch, Stores};

use crate::cache::ProgressCache;
use crate::catalog::ContentCatalog;

//
// ─── PENDING WRITES ───────────────────────────────────────────────────────────
//

/// A store write that failed and awaits retry.
///
/// The optimistic cache update it belongs to is never rolled back; the
/// queue makes the durability gap observable and replayable instead of
/// silently dropping the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub content_id: ContentId,
    pub patch: ProgressPatch,
}

//
// ─── ENGINE ───────────────────────────────────────────────────────────────────
//

/// Progress-tracking engine for one user session.
///
/// Records interactions with topics and questions, keeps the local
/// cache consistent with the remote store under overlapping updates,
/// derives statistics after every mutation, and maintains the daily
/// study streak on topic completions. The statistics it exposes are
/// the only thing the UI reads; store failures degrade locally and
/// never surface as user-visible errors.
pub struct ProgressEngine {
    user_id: UserId,
    clock: Clock,
    stores: Stores,
    catalog: Arc<dyn ContentCatalog>,
    cache: ProgressCache,
    stats: Statistics,
    streak: Option<StreakState>,
    pending: Vec<PendingWrite>,
}

impl ProgressEngine {
    /// Create an engine bound to one user.
    ///
    /// The user context is explicit per instance; independent sessions
    /// (or tests) each get their own engine.
    #[must_use]
    pub fn new(user_id: UserId, stores: Stores, catalog: Arc<dyn ContentCatalog>) -> Self {
        Self {
            user_id,
            clock: Clock::default(),
            stores,
            catalog,
            cache: ProgressCache::new(),
            stats: Statistics::default(),
            streak: None,
            pending: Vec::new(),
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Derived statistics for display. Recomputed after every mutation.
    #[must_use]
    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    #[must_use]
    pub fn streak(&self) -> Option<StreakState> {
        self.streak
    }

    /// Store writes that failed and are queued for `retry_pending`.
    #[must_use]
    pub fn pending_writes(&self) -> &[PendingWrite] {
        &self.pending
    }

    /// Rebuild the cache from the store and recompute statistics.
    ///
    /// On store failure the engine starts from an empty cache (logged,
    /// not escalated); the profile read for the streak is equally
    /// best-effort. Returns the number of records loaded.
    pub async fn load(&mut self) -> usize {
        let loaded = match self.stores.progress.load_all(&self.user_id).await {
            Ok(records) => {
                let count = records.len();
                self.cache.load(records);
                count
            }
            Err(err) => {
                warn!(user = %self.user_id, %err, "progress load failed, starting empty");
                self.cache.clear();
                0
            }
        };

        match self.stores.profiles.read_streak(&self.user_id).await {
            Ok(streak) => self.streak = streak,
            Err(err) => {
                warn!(user = %self.user_id, %err, "profile read failed, streak unknown");
            }
        }

        self.recompute();
        loaded
    }

    /// Record that the user opened a topic.
    ///
    /// Creates the record at `InProgress`/0% on first open. Idempotent:
    /// a second start on the same content id is a no-op and never
    /// overwrites existing progress.
    pub async fn start_topic(
        &mut self,
        content_id: &ContentId,
        course_id: Option<&CourseId>,
        meta: Option<ContentMeta>,
    ) {
        if self.cache.contains(content_id) {
            debug!(content = %content_id, "topic already started, keeping progress");
            return;
        }

        let record = ProgressRecord::started_topic(
            self.user_id.clone(),
            content_id.clone(),
            course_id.cloned(),
            meta,
            self.clock.now(),
        );
        let patch = ProgressPatch::full(&record);

        self.cache.apply(content_id, move |_| record);
        self.recompute();
        self.persist(content_id, patch).await;
    }

    /// Record progress on a topic.
    ///
    /// Creates the record if the topic was never started. Missing
    /// display metadata is looked up from the catalog on first update,
    /// best-effort. Any update landing at `Completed` touches the
    /// streak, including re-completions: a re-study still counts as
    /// study activity for the day, and the streak advance is a
    /// same-day no-op.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotATopic` if the content id belongs to
    /// a question record. Store failures are queued, never returned.
    pub async fn update_topic_progress(
        &mut self,
        content_id: &ContentId,
        percent: u8,
        delta_seconds: u64,
    ) -> Result<(), ProgressError> {
        let now = self.clock.now();
        let existed = self.cache.contains(content_id);
        let mut record = match self.cache.get(content_id) {
            Some(record) => record.clone(),
            None => ProgressRecord::started_topic(
                self.user_id.clone(),
                content_id.clone(),
                None,
                None,
                now,
            ),
        };

        let mut enriched = false;
        if record.needs_meta() {
            match self.catalog.lookup(content_id).await {
                Ok(Some(meta)) => {
                    record.merge_meta(&meta);
                    enriched = true;
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(content = %content_id, %err, "catalog lookup failed, saving without metadata");
                }
            }
        }

        let update = record.apply_topic_update(percent, delta_seconds, now)?;

        let patch = if existed {
            let mut patch = ProgressPatch {
                status: Some(record.status()),
                completion_percent: Some(record.completion_percent()),
                time_spent_seconds: Some(record.time_spent_seconds()),
                last_accessed_at: Some(record.last_accessed_at()),
                ..ProgressPatch::default()
            };
            if enriched {
                patch.title = record.title().map(str::to_owned);
                patch.subject = record.subject().map(str::to_owned);
                patch.subject_slug = record.subject_slug().map(str::to_owned);
            }
            patch
        } else {
            ProgressPatch::full(&record)
        };

        self.cache.apply(content_id, move |_| record);
        self.recompute();
        self.persist(content_id, patch).await;

        if update.completed {
            self.touch_streak().await;
        }
        Ok(())
    }

    /// Record an answered practice question.
    ///
    /// Single-shot: the record is created terminal with the outcome
    /// set. Answering the same question again is an unusual but
    /// harmless merge overwrite.
    pub async fn answer_question(
        &mut self,
        content_id: &ContentId,
        correct: bool,
        time_spent_seconds: u64,
        course_id: Option<&CourseId>,
    ) {
        let record = ProgressRecord::answered_question(
            self.user_id.clone(),
            content_id.clone(),
            correct,
            time_spent_seconds,
            course_id.cloned(),
            self.clock.now(),
        );
        let patch = ProgressPatch::full(&record);

        self.cache.apply(content_id, move |_| record);
        self.recompute();
        self.persist(content_id, patch).await;
    }

    /// Completion rollup for one course, queried directly against the
    /// store rather than the cache. Falls back to the cached rollup
    /// when the store is unavailable.
    pub async fn progress_for_course(&self, course_id: &CourseId) -> CourseRollup {
        match self.stores.progress.load_all(&self.user_id).await {
            Ok(records) => {
                let mut total = 0;
                let mut completed = 0;
                for record in &records {
                    if record.kind() == ProgressKind::Topic
                        && record.course_id() == Some(course_id)
                    {
                        total += 1;
                        if record.is_complete() {
                            completed += 1;
                        }
                    }
                }
                CourseRollup::new(total, completed)
            }
            Err(err) => {
                warn!(course = %course_id, %err, "course query failed, using cached rollup");
                self.stats.course(course_id)
            }
        }
    }

    /// Re-attempt every queued write; failures go back on the queue.
    pub async fn retry_pending(&mut self) {
        let queued = std::mem::take(&mut self.pending);
        for write in queued {
            if let Err(err) = self
                .stores
                .progress
                .upsert(&self.user_id, &write.content_id, &write.patch)
                .await
            {
                warn!(content = %write.content_id, %err, "retry failed, write stays queued");
                self.pending.push(write);
            }
        }
    }

    fn recompute(&mut self) {
        let streak_days = self.streak.map_or(0, |s| s.days);
        self.stats = Statistics::aggregate(self.cache.records(), streak_days);
    }

    async fn persist(&mut self, content_id: &ContentId, patch: ProgressPatch) {
        if let Err(err) = self
            .stores
            .progress
            .upsert(&self.user_id, content_id, &patch)
            .await
        {
            warn!(content = %content_id, %err, "progress write failed, queued for retry");
            self.pending.push(PendingWrite {
                content_id: content_id.clone(),
                patch,
            });
        }
    }

    /// Fold today's completion into the streak and persist it.
    ///
    /// A profile read or write failure leaves the streak untouched for
    /// this event; the feature degrades silently.
    async fn touch_streak(&mut self) {
        let today = self.clock.today();

        let current = match self.streak {
            Some(streak) => Some(streak),
            None => match self.stores.profiles.read_streak(&self.user_id).await {
                Ok(streak) => streak,
                Err(err) => {
                    warn!(user = %self.user_id, %err, "profile read failed, streak not updated");
                    return;
                }
            },
        };

        let next = match current {
            Some(streak) => streak.advance(today),
            None => StreakState::start(today),
        };
        if current == Some(next) {
            // already counted today (or stale clock); nothing to persist
            self.streak = current;
            self.stats.streak_days = next.days;
            return;
        }

        match self.stores.profiles.write_streak(&self.user_id, &next).await {
            Ok(()) => {
                self.streak = Some(next);
                self.stats.streak_days = next.days;
            }
            Err(err) => {
                warn!(user = %self.user_id, %err, "profile write failed, streak not updated");
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
