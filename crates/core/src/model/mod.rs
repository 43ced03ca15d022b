mod ids;
mod progress;
mod stats;
mod streak;

pub use ids::{ContentId, CourseId, UserId};
pub use progress::{
    ContentMeta, ProgressError, ProgressKind, ProgressRecord, ProgressStatus, TopicUpdate,
};
pub use stats::{CourseRollup, Statistics};
pub use streak::StreakState;
