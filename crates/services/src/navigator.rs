use std::sync::Arc;

use academy_core::model::{CourseId, Enrollment, Lesson, Percentage, SubjectId};
use storage::repository::CatalogRepository;
use tracing::debug;

use crate::enrollment_service::EnrollmentService;
use crate::error::{Entity, NavigationError};

/// What the learner sees when a lesson is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonView {
    pub lesson: Lesson,
    pub enrollment: Enrollment,
    pub previous_order: Option<u32>,
    pub next_order: Option<u32>,
    pub lesson_count: usize,
    pub progress: Percentage,
    pub is_completed: bool,
}

/// Opens lessons by position, enrolling the subject on first visit.
#[derive(Clone)]
pub struct LessonNavigator {
    catalog: Arc<dyn CatalogRepository>,
    enrollments: Arc<EnrollmentService>,
}

impl LessonNavigator {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogRepository>, enrollments: Arc<EnrollmentService>) -> Self {
        Self {
            catalog,
            enrollments,
        }
    }

    /// Open the lesson at `order`, or the first lesson when `order` is absent
    /// or does not match any lesson.
    ///
    /// # Errors
    ///
    /// Returns `NavigationError::NotFound` for unknown courses and
    /// `EmptyCourse` when the course has no lessons.
    pub async fn open_lesson(
        &self,
        subject: SubjectId,
        course_id: CourseId,
        order: Option<u32>,
    ) -> Result<LessonView, NavigationError> {
        if self.catalog.get_course(course_id).await?.is_none() {
            return Err(NavigationError::NotFound(
                Entity::Course,
                course_id.to_string(),
            ));
        }
        let lessons = self.catalog.lessons_for_course(course_id).await?;
        let index = order
            .and_then(|o| lessons.iter().position(|l| l.order() == o))
            .unwrap_or(0);
        let Some(lesson) = lessons.get(index).cloned() else {
            return Err(NavigationError::EmptyCourse(course_id));
        };

        let (mut enrollment, _) = self
            .enrollments
            .get_or_create(subject, course_id.into())
            .await?;
        self.enrollments
            .record_lesson_access(enrollment.id(), lesson.id())
            .await?;
        enrollment.record_access(lesson.id());

        let previous_order = index
            .checked_sub(1)
            .and_then(|i| lessons.get(i))
            .map(Lesson::order);
        let next_order = lessons.get(index + 1).map(Lesson::order);
        debug!(
            enrollment_id = %enrollment.id(),
            lesson_id = %lesson.id(),
            order = lesson.order(),
            "lesson opened"
        );

        Ok(LessonView {
            is_completed: enrollment.has_completed(lesson.id()),
            progress: enrollment.progress(),
            lesson,
            enrollment,
            previous_order,
            next_order,
            lesson_count: lessons.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    #[tokio::test]
    async fn opens_requested_lesson_with_neighbours() {
        let fx = Fixture::new().await;
        let course = fx.course("Rust").await;
        let lessons = fx.lessons(course, 3).await;
        let navigator = fx.navigator();

        let view = navigator
            .open_lesson(fx.student, course, Some(2))
            .await
            .unwrap();
        assert_eq!(view.lesson.id(), lessons[1]);
        assert_eq!(view.previous_order, Some(1));
        assert_eq!(view.next_order, Some(3));
        assert_eq!(view.lesson_count, 3);
        assert_eq!(view.enrollment.last_accessed_lesson_id(), Some(lessons[1]));

        let stored = fx
            .storage
            .enrollments
            .get_enrollment(view.enrollment.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.last_accessed_lesson_id(), Some(lessons[1]));
    }

    #[tokio::test]
    async fn falls_back_to_first_lesson() {
        let fx = Fixture::new().await;
        let course = fx.course("Rust").await;
        let lessons = fx.lessons(course, 2).await;
        let navigator = fx.navigator();

        let view = navigator
            .open_lesson(fx.student, course, Some(42))
            .await
            .unwrap();
        assert_eq!(view.lesson.id(), lessons[0]);
        assert_eq!(view.previous_order, None);

        let again = navigator.open_lesson(fx.student, course, None).await.unwrap();
        assert_eq!(again.enrollment.id(), view.enrollment.id());
    }

    #[tokio::test]
    async fn empty_course_is_reported() {
        let fx = Fixture::new().await;
        let course = fx.course("Empty").await;
        assert!(matches!(
            fx.navigator().open_lesson(fx.student, course, None).await,
            Err(NavigationError::EmptyCourse(_))
        ));
    }
}
