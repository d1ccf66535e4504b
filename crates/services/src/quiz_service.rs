use std::sync::Arc;

use academy_core::grading::{self, QuizGrade};
use academy_core::model::{
    AttemptId, EnrollableTarget, Enrollment, EnrollmentId, Lesson, LessonId, Question,
    QuizAttempt, SubmittedAnswers,
};
use storage::repository::{CatalogRepository, EnrollmentRepository, StorageError};
use tracing::info;

use crate::Clock;
use crate::error::{Entity, QuizServiceError};

/// Outcome of a graded submission.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSubmission {
    pub grade: QuizGrade,
    pub attempt: QuizAttempt,
}

/// A stored attempt re-scored question by question for display.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptReview {
    pub lesson: Lesson,
    pub attempt: QuizAttempt,
    pub grade: QuizGrade,
}

/// Grades quiz submissions and keeps the attempt history.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl QuizService {
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

    /// Questions of a quiz lesson in grading order.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::NotFound` for unknown lessons.
    pub async fn questions(&self, lesson_id: LessonId) -> Result<Vec<Question>, QuizServiceError> {
        self.lesson(lesson_id).await?;
        Ok(self.catalog.questions_for_lesson(lesson_id).await?)
    }

    /// Grade `answers` for a quiz lesson and append the attempt.
    ///
    /// Progress and status are left alone; only the attempt history grows.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::NotFound` for unknown enrollments or lessons,
    /// `LessonNotEnrolled` when the lesson is outside the enrolled target and
    /// `Grading` when the lesson is not a quiz.
    pub async fn submit_quiz(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
        answers: SubmittedAnswers,
    ) -> Result<QuizSubmission, QuizServiceError> {
        let enrollment = self
            .enrollments
            .get_enrollment(enrollment_id)
            .await?
            .ok_or_else(|| QuizServiceError::NotFound(Entity::Enrollment, enrollment_id.to_string()))?;
        let lesson = self.lesson(lesson_id).await?;
        if !self.covers(&enrollment, &lesson).await? {
            return Err(QuizServiceError::LessonNotEnrolled {
                lesson_id,
                enrollment_id,
            });
        }

        let questions = self.catalog.questions_for_lesson(lesson_id).await?;
        let (grade, attempt) = grading::grade(
            &lesson,
            &questions,
            answers,
            AttemptId::generate(),
            self.clock.now(),
        )?;

        self.enrollments
            .append_quiz_attempt(enrollment_id, &attempt)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => {
                    QuizServiceError::NotFound(Entity::Enrollment, enrollment_id.to_string())
                }
                other => QuizServiceError::Storage(other),
            })?;

        info!(
            %enrollment_id,
            %lesson_id,
            attempt_id = %attempt.attempt_id(),
            score = %grade.score,
            correct = grade.correct,
            total = grade.total,
            "quiz graded"
        );
        Ok(QuizSubmission { grade, attempt })
    }

    /// Look up a stored attempt and re-score it against the current questions.
    ///
    /// The stored score is returned untouched on the attempt; the per-question
    /// breakdown reflects the questions as they are now.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::NotFound` when the attempt is not recorded on
    /// this enrollment or its lesson has been removed.
    pub async fn attempt_review(
        &self,
        enrollment_id: EnrollmentId,
        attempt_id: AttemptId,
    ) -> Result<AttemptReview, QuizServiceError> {
        let attempt = self
            .enrollments
            .get_quiz_attempt(enrollment_id, attempt_id)
            .await?
            .ok_or_else(|| QuizServiceError::NotFound(Entity::Attempt, attempt_id.to_string()))?;
        let lesson = self.lesson(attempt.lesson_id()).await?;
        let questions = self.catalog.questions_for_lesson(lesson.id()).await?;
        let grade = grading::score(&lesson, &questions, attempt.answers())?;
        Ok(AttemptReview {
            lesson,
            attempt,
            grade,
        })
    }

    async fn lesson(&self, lesson_id: LessonId) -> Result<Lesson, QuizServiceError> {
        self.catalog
            .get_lesson(lesson_id)
            .await?
            .ok_or_else(|| QuizServiceError::NotFound(Entity::Lesson, lesson_id.to_string()))
    }

    async fn covers(&self, enrollment: &Enrollment, lesson: &Lesson) -> Result<bool, QuizServiceError> {
        match enrollment.target() {
            EnrollableTarget::Course(course_id) => Ok(lesson.course_id() == course_id),
            EnrollableTarget::LearningPath(path_id) => Ok(self
                .catalog
                .get_learning_path(path_id)
                .await?
                .is_some_and(|path| path.course_ids().contains(&lesson.course_id()))),
        }
    }
}
