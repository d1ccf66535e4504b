//! Lesson-count based progress for course enrollments.

use crate::model::{EnrollmentStatus, Percentage};

/// New `progress`/`status` pair produced by [`recompute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub progress: Percentage,
    pub status: EnrollmentStatus,
}

impl ProgressUpdate {
    /// True when this update moved the enrollment into `Completed`.
    #[must_use]
    pub fn completes(&self, previous: EnrollmentStatus) -> bool {
        previous != EnrollmentStatus::Completed && self.status == EnrollmentStatus::Completed
    }
}

/// Derive progress from `completed` out of `total` lessons.
///
/// - With no lessons the stored status decides: a completed enrollment stays
///   at 100, anything else is 0.
/// - Otherwise progress is `completed / total * 100`, rounded half up to two
///   decimals; reaching 100 clamps and forces `Completed`.
/// - A completed status is never reverted here, even if lessons were added
///   later and progress dropped below 100.
#[must_use]
pub fn recompute(completed: usize, total: usize, status: EnrollmentStatus) -> ProgressUpdate {
    let progress = match Percentage::from_ratio(completed, total) {
        Some(p) => p,
        None if status == EnrollmentStatus::Completed => Percentage::FULL,
        None => Percentage::ZERO,
    };

    let status = if progress.is_full() {
        EnrollmentStatus::Completed
    } else {
        status
    };

    ProgressUpdate { progress, status }
}
