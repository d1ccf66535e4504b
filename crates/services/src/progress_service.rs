use std::sync::Arc;

use academy_core::model::{CourseId, Enrollment, EnrollmentId, LessonId};
use academy_core::progress::ProgressUpdate;
use storage::repository::{CatalogRepository, EnrollmentRepository, ProgressRecount, StorageError};
use tracing::{debug, info};

use crate::Clock;
use crate::error::{Entity, ProgressServiceError};

/// Records lesson completion and keeps course progress in step with it.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            enrollments,
        }
    }

    /// Mark `lesson_id` complete for a course enrollment and recompute progress.
    ///
    /// Completing the same lesson again leaves the completed set unchanged and
    /// yields the same progress.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` for unknown enrollments or lessons,
    /// `NotCourseEnrollment` for learning-path enrollments and
    /// `LessonNotInCourse` when the lesson belongs to another course.
    pub async fn mark_lesson_complete(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<Enrollment, ProgressServiceError> {
        let enrollment = self.load(enrollment_id).await?;
        let course_id = enrollment
            .target()
            .as_course()
            .ok_or(ProgressServiceError::NotCourseEnrollment(enrollment_id))?;

        let lesson = self
            .catalog
            .get_lesson(lesson_id)
            .await?
            .ok_or_else(|| ProgressServiceError::NotFound(Entity::Lesson, lesson_id.to_string()))?;
        if lesson.course_id() != course_id {
            return Err(ProgressServiceError::LessonNotInCourse {
                lesson_id,
                course_id,
            });
        }

        let newly_completed = self
            .enrollments
            .add_completed_lesson(enrollment_id, lesson_id, self.clock.now())
            .await
            .map_err(|e| not_found(e, enrollment_id))?;
        if !newly_completed {
            debug!(%enrollment_id, %lesson_id, "lesson already completed");
        }

        self.recount(enrollment_id, course_id).await?;
        self.load(enrollment_id).await
    }

    /// Re-derive progress from the current lesson count.
    ///
    /// Learning-path enrollments carry no lesson-based progress and return
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` for unknown enrollments.
    pub async fn recompute(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Option<ProgressUpdate>, ProgressServiceError> {
        let enrollment = self.load(enrollment_id).await?;
        let Some(course_id) = enrollment.target().as_course() else {
            return Ok(None);
        };
        self.recount(enrollment_id, course_id).await.map(Some)
    }

    async fn load(&self, enrollment_id: EnrollmentId) -> Result<Enrollment, ProgressServiceError> {
        self.enrollments
            .get_enrollment(enrollment_id)
            .await?
            .ok_or_else(|| ProgressServiceError::NotFound(Entity::Enrollment, enrollment_id.to_string()))
    }

    async fn recount(
        &self,
        enrollment_id: EnrollmentId,
        course_id: CourseId,
    ) -> Result<ProgressUpdate, ProgressServiceError> {
        let ProgressRecount { previous, update } = self
            .enrollments
            .recount_progress(enrollment_id, course_id)
            .await
            .map_err(|e| not_found(e, enrollment_id))?;

        if update.completes(previous) {
            info!(%enrollment_id, %course_id, "enrollment completed");
        } else {
            debug!(%enrollment_id, progress = %update.progress, "progress updated");
        }
        Ok(update)
    }
}

fn not_found(err: StorageError, enrollment_id: EnrollmentId) -> ProgressServiceError {
    match err {
        StorageError::NotFound => {
            ProgressServiceError::NotFound(Entity::Enrollment, enrollment_id.to_string())
        }
        other => ProgressServiceError::Storage(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use academy_core::model::{
        AttemptId, EnrollableTarget, EnrollmentStatus, LessonContent, Percentage, QuizAttempt,
        SubjectId,
    };
    use academy_core::time::fixed_clock;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Holds the first recount back so a later completion overtakes it.
    struct SlowFirstRecount {
        inner: Arc<dyn EnrollmentRepository>,
        delayed: AtomicBool,
    }

    #[async_trait]
    impl EnrollmentRepository for SlowFirstRecount {
        async fn get_or_create(
            &self,
            subject: SubjectId,
            target: EnrollableTarget,
            enrolled_at: DateTime<Utc>,
        ) -> Result<(Enrollment, bool), StorageError> {
            self.inner.get_or_create(subject, target, enrolled_at).await
        }

        async fn get_enrollment(
            &self,
            id: EnrollmentId,
        ) -> Result<Option<Enrollment>, StorageError> {
            self.inner.get_enrollment(id).await
        }

        async fn find_enrollment(
            &self,
            subject: SubjectId,
            target: EnrollableTarget,
        ) -> Result<Option<Enrollment>, StorageError> {
            self.inner.find_enrollment(subject, target).await
        }

        async fn enrollments_for_subject(
            &self,
            subject: SubjectId,
        ) -> Result<Vec<Enrollment>, StorageError> {
            self.inner.enrollments_for_subject(subject).await
        }

        async fn enrollments_for_target(
            &self,
            target: EnrollableTarget,
        ) -> Result<Vec<Enrollment>, StorageError> {
            self.inner.enrollments_for_target(target).await
        }

        async fn count_enrollments(&self) -> Result<u64, StorageError> {
            self.inner.count_enrollments().await
        }

        async fn set_last_accessed(
            &self,
            id: EnrollmentId,
            lesson: LessonId,
        ) -> Result<(), StorageError> {
            self.inner.set_last_accessed(id, lesson).await
        }

        async fn add_completed_lesson(
            &self,
            id: EnrollmentId,
            lesson: LessonId,
            completed_at: DateTime<Utc>,
        ) -> Result<bool, StorageError> {
            self.inner.add_completed_lesson(id, lesson, completed_at).await
        }

        async fn recount_progress(
            &self,
            id: EnrollmentId,
            course: CourseId,
        ) -> Result<ProgressRecount, StorageError> {
            if !self.delayed.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            self.inner.recount_progress(id, course).await
        }

        async fn update_progress(
            &self,
            id: EnrollmentId,
            update: ProgressUpdate,
        ) -> Result<(), StorageError> {
            self.inner.update_progress(id, update).await
        }

        async fn append_quiz_attempt(
            &self,
            id: EnrollmentId,
            attempt: &QuizAttempt,
        ) -> Result<(), StorageError> {
            self.inner.append_quiz_attempt(id, attempt).await
        }

        async fn get_quiz_attempt(
            &self,
            id: EnrollmentId,
            attempt: AttemptId,
        ) -> Result<Option<QuizAttempt>, StorageError> {
            self.inner.get_quiz_attempt(id, attempt).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overtaken_completion_does_not_undo_course_completion() {
        let fx = Fixture::new().await;
        let course = fx.course("Rust").await;
        let lessons = fx.lessons(course, 2).await;
        let enrollment = fx.enroll(fx.student, course.into()).await;
        let service = ProgressService::new(
            fixed_clock(),
            Arc::clone(&fx.storage.catalog),
            Arc::new(SlowFirstRecount {
                inner: Arc::clone(&fx.storage.enrollments),
                delayed: AtomicBool::new(false),
            }),
        );

        let slow = {
            let service = service.clone();
            let (id, lesson) = (enrollment.id(), lessons[0]);
            tokio::spawn(async move { service.mark_lesson_complete(id, lesson).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let fast = service
            .mark_lesson_complete(enrollment.id(), lessons[1])
            .await
            .unwrap();
        assert_eq!(fast.status(), EnrollmentStatus::Completed);
        slow.await.unwrap().unwrap();

        let stored = fx
            .storage
            .enrollments
            .get_enrollment(enrollment.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.completed_lesson_ids().len(), 2);
        assert_eq!(stored.progress(), Percentage::FULL);
        assert_eq!(stored.status(), EnrollmentStatus::Completed);
    }

    #[tokio::test]
    async fn four_lessons_reach_half_then_full() {
        let fx = Fixture::new().await;
        let course = fx.course("Rust").await;
        let lessons = fx.lessons(course, 4).await;
        let enrollment = fx.enroll(fx.student, course.into()).await;
        let service = fx.progress_service();

        service
            .mark_lesson_complete(enrollment.id(), lessons[0])
            .await
            .unwrap();
        let halfway = service
            .mark_lesson_complete(enrollment.id(), lessons[1])
            .await
            .unwrap();
        assert_eq!(halfway.progress().to_string(), "50.00");
        assert_eq!(halfway.status(), EnrollmentStatus::InProgress);

        service
            .mark_lesson_complete(enrollment.id(), lessons[2])
            .await
            .unwrap();
        let done = service
            .mark_lesson_complete(enrollment.id(), lessons[3])
            .await
            .unwrap();
        assert_eq!(done.progress(), Percentage::FULL);
        assert_eq!(done.status(), EnrollmentStatus::Completed);
        assert_eq!(done.last_accessed_lesson_id(), Some(lessons[3]));
    }

    #[tokio::test]
    async fn completing_twice_is_idempotent() {
        let fx = Fixture::new().await;
        let course = fx.course("Rust").await;
        let lessons = fx.lessons(course, 3).await;
        let enrollment = fx.enroll(fx.student, course.into()).await;
        let service = fx.progress_service();

        let first = service
            .mark_lesson_complete(enrollment.id(), lessons[0])
            .await
            .unwrap();
        let second = service
            .mark_lesson_complete(enrollment.id(), lessons[0])
            .await
            .unwrap();
        assert_eq!(first.completed_lesson_ids(), second.completed_lesson_ids());
        assert_eq!(second.progress().to_string(), "33.33");
    }

    #[tokio::test]
    async fn completion_survives_new_lessons() {
        let fx = Fixture::new().await;
        let course = fx.course("Rust").await;
        let lessons = fx.lessons(course, 1).await;
        let enrollment = fx.enroll(fx.student, course.into()).await;
        let service = fx.progress_service();

        service
            .mark_lesson_complete(enrollment.id(), lessons[0])
            .await
            .unwrap();
        fx.lesson(course, "Bonus", LessonContent::Quiz).await;

        let update = service.recompute(enrollment.id()).await.unwrap().unwrap();
        assert_eq!(update.progress.to_string(), "50.00");
        assert_eq!(update.status, EnrollmentStatus::Completed);
    }

    #[tokio::test]
    async fn empty_course_has_zero_progress() {
        let fx = Fixture::new().await;
        let course = fx.course("Empty").await;
        let enrollment = fx.enroll(fx.student, course.into()).await;

        let update = fx
            .progress_service()
            .recompute(enrollment.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.progress, Percentage::ZERO);
        assert_eq!(update.status, EnrollmentStatus::InProgress);
    }

    #[tokio::test]
    async fn rejects_foreign_lessons_and_path_enrollments() {
        let fx = Fixture::new().await;
        let course = fx.course("Rust").await;
        let other = fx.course("Go").await;
        let foreign = fx.lessons(other, 1).await;
        let enrollment = fx.enroll(fx.student, course.into()).await;
        let service = fx.progress_service();

        assert!(matches!(
            service
                .mark_lesson_complete(enrollment.id(), foreign[0])
                .await,
            Err(ProgressServiceError::LessonNotInCourse { .. })
        ));

        let path = fx.path("Backend", &[course]).await;
        let path_enrollment = fx.enroll(fx.student, path.into()).await;
        assert!(matches!(
            service
                .mark_lesson_complete(path_enrollment.id(), foreign[0])
                .await,
            Err(ProgressServiceError::NotCourseEnrollment(_))
        ));
        assert!(service.recompute(path_enrollment.id()).await.unwrap().is_none());
    }
}
