use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Consecutive-study-day counter stored on the user profile.
///
/// `days` counts consecutive calendar days with at least one topic
/// completion; `last_study_date` is the most recent such day. Stored
/// alongside unrelated profile data and merge-written, so this struct
/// carries only the two streak fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub days: u32,
    pub last_study_date: NaiveDate,
}

impl StreakState {
    /// The streak a user earns on their first-ever completion.
    #[must_use]
    pub fn start(today: NaiveDate) -> Self {
        Self {
            days: 1,
            last_study_date: today,
        }
    }

    /// Fold a completion on `today` into the streak.
    ///
    /// Calendar-day arithmetic, not elapsed time:
    /// - same day: unchanged (already counted);
    /// - next day: streak grows by one;
    /// - gap of two or more days: streak restarts at one;
    /// - `today` before `last_study_date` (clock skew or stale data):
    ///   unchanged, the streak never decrements.
    #[must_use]
    pub fn advance(self, today: NaiveDate) -> Self {
        let days_diff = (today - self.last_study_date).num_days();
        match days_diff {
            i64::MIN..=0 => self,
            1 => Self {
                days: self.days + 1,
                last_study_date: today,
            },
            _ => Self::start(today),
        }
    }
}
