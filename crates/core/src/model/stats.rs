use std::collections::HashMap;

use crate::model::ids::CourseId;
use crate::model::progress::{ProgressKind, ProgressRecord, ProgressStatus};

//
// ─── COURSE ROLLUP ────────────────────────────────────────────────────────────
//

/// Per-course completion rollup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CourseRollup {
    pub total: usize,
    pub completed: usize,
    pub percent: u8,
}

impl CourseRollup {
    /// Rollup for a set of topic counts, with the percent rounded to
    /// the nearest integer and 0 when the course has no topics.
    #[must_use]
    pub fn new(total: usize, completed: usize) -> Self {
        Self {
            total,
            completed,
            percent: rollup_percent(completed, total),
        }
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn rollup_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    // Counts are bounded to low hundreds per user, far within f64 precision.
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

//
// ─── STATISTICS ───────────────────────────────────────────────────────────────
//

/// Derived statistics over a user's full set of progress records.
///
/// Never persisted; recomputed in full after every cache mutation. The
/// UI reads only this structure, never the store. Recomputation is
/// O(n) in the record count, which is fine at per-user scale
/// (low hundreds of records).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    pub total_topics: usize,
    pub completed_topics: usize,
    pub in_progress_topics: usize,
    pub total_questions: usize,
    pub correct_questions: usize,
    pub total_time_seconds: u64,
    pub streak_days: u32,
    pub by_course: HashMap<CourseId, CourseRollup>,
}

impl Statistics {
    /// Compute statistics from the full record set in a single pass.
    ///
    /// A topic at `NotStarted` counts toward `total_topics` (and its
    /// course total) but toward neither the completed nor the
    /// in-progress bucket.
    #[must_use]
    pub fn aggregate<'a>(
        records: impl IntoIterator<Item = &'a ProgressRecord>,
        streak_days: u32,
    ) -> Self {
        let mut stats = Self {
            streak_days,
            ..Self::default()
        };
        let mut course_counts: HashMap<CourseId, (usize, usize)> = HashMap::new();

        for record in records {
            stats.total_time_seconds = stats
                .total_time_seconds
                .saturating_add(record.time_spent_seconds());

            match record.kind() {
                ProgressKind::Topic => {
                    stats.total_topics += 1;
                    match record.status() {
                        ProgressStatus::Completed => stats.completed_topics += 1,
                        ProgressStatus::InProgress => stats.in_progress_topics += 1,
                        ProgressStatus::NotStarted => {}
                    }
                    if let Some(course_id) = record.course_id() {
                        let (total, completed) =
                            course_counts.entry(course_id.clone()).or_default();
                        *total += 1;
                        if record.is_complete() {
                            *completed += 1;
                        }
                    }
                }
                ProgressKind::Question => {
                    stats.total_questions += 1;
                    if record.correct() == Some(true) {
                        stats.correct_questions += 1;
                    }
                }
            }
        }

        stats.by_course = course_counts
            .into_iter()
            .map(|(course_id, (total, completed))| (course_id, CourseRollup::new(total, completed)))
            .collect();
        stats
    }

    /// Rollup for one course; zeroed when the course has no topics.
    #[must_use]
    pub fn course(&self, course_id: &CourseId) -> CourseRollup {
        self.by_course.get(course_id).copied().unwrap_or_default()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{ContentId, UserId};
    use crate::time::fixed_now;

    fn topic(id: &str, course: Option<&str>, percent: u8, secs: u64) -> ProgressRecord {
        let mut record = ProgressRecord::started_topic(
            UserId::new("u1"),
            ContentId::new(id),
            course.map(CourseId::new),
            None,
            fixed_now(),
        );
        record.apply_topic_update(percent, secs, fixed_now()).unwrap();
        record
    }

    fn question(id: &str, correct: bool, secs: u64) -> ProgressRecord {
        ProgressRecord::answered_question(
            UserId::new("u1"),
            ContentId::new(id),
            correct,
            secs,
            None,
            fixed_now(),
        )
    }

    #[test]
    fn empty_record_set_yields_zeroes() {
        let stats = Statistics::aggregate(std::iter::empty::<&ProgressRecord>(), 0);
        assert_eq!(stats, Statistics::default());
        assert_eq!(stats.course(&CourseId::new("missing")).percent, 0);
    }

    #[test]
    fn partitions_topics_and_questions() {
        let records = vec![
            topic("t1", None, 100, 30),
            topic("t2", None, 50, 20),
            question("q1", true, 12),
            question("q2", false, 8),
        ];
        let stats = Statistics::aggregate(&records, 3);

        assert_eq!(stats.total_topics, 2);
        assert_eq!(stats.completed_topics, 1);
        assert_eq!(stats.in_progress_topics, 1);
        assert_eq!(stats.total_questions, 2);
        assert_eq!(stats.correct_questions, 1);
        assert_eq!(stats.total_time_seconds, 70);
        assert_eq!(stats.streak_days, 3);
    }

    #[test]
    fn not_started_topic_counts_toward_total_only() {
        let record = ProgressRecord::from_persisted(
            UserId::new("u1"),
            ContentId::new("t1"),
            ProgressKind::Topic,
            ProgressStatus::NotStarted,
            0,
            None,
            0,
            fixed_now(),
            Some(CourseId::new("courseA")),
            None,
            None,
            None,
        )
        .unwrap();
        let stats = Statistics::aggregate([&record], 0);

        assert_eq!(stats.total_topics, 1);
        assert_eq!(stats.completed_topics, 0);
        assert_eq!(stats.in_progress_topics, 0);
        assert_eq!(stats.course(&CourseId::new("courseA")).total, 1);
    }

    #[test]
    fn course_rollup_rounds_to_nearest_percent() {
        let records = vec![
            topic("t1", Some("courseA"), 100, 0),
            topic("t2", Some("courseA"), 10, 0),
            topic("t3", Some("courseA"), 20, 0),
            topic("t4", Some("courseB"), 100, 0),
        ];
        let stats = Statistics::aggregate(&records, 0);

        let a = stats.course(&CourseId::new("courseA"));
        assert_eq!(a, CourseRollup { total: 3, completed: 1, percent: 33 });

        let b = stats.course(&CourseId::new("courseB"));
        assert_eq!(b, CourseRollup { total: 1, completed: 1, percent: 100 });
    }

    #[test]
    fn rollup_percent_guards_division_by_zero() {
        assert_eq!(CourseRollup::new(0, 0).percent, 0);
        assert_eq!(CourseRollup::new(3, 2).percent, 67);
    }

    #[test]
    fn topics_without_course_skip_rollup() {
        let records = vec![topic("t1", None, 100, 0)];
        let stats = Statistics::aggregate(&records, 0);
        assert!(stats.by_course.is_empty());
    }
}
