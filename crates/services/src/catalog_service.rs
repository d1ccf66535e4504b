use std::collections::BTreeSet;
use std::sync::Arc;

use academy_core::model::{
    Course, CourseDraft, CourseId, LearningPath, LearningPathId, Lesson, LessonDraft, LessonId,
    Question, QuestionDraft, User, UserId,
};
use storage::repository::{
    CatalogRepository, NewLearningPathRecord, StorageError, UserRepository,
};
use tracing::{debug, info, warn};

use crate::Clock;
use crate::error::{CatalogServiceError, Entity};

/// A course with its lessons in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOutline {
    pub course: Course,
    pub lessons: Vec<Lesson>,
}

/// Authoring operations for courses, lessons, questions and learning paths.
#[derive(Clone)]
pub struct CatalogService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    catalog: Arc<dyn CatalogRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Self {
        Self {
            clock,
            users,
            catalog,
        }
    }

    /// Create a course owned by `draft.instructor_id`, defaulting to the actor.
    ///
    /// Instructors may only create courses they teach; admins may assign any
    /// instructor.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Forbidden` if the actor may not author the
    /// course, `SlugTaken` when the slug is already used and `Catalog` for
    /// invalid drafts.
    pub async fn create_course(
        &self,
        actor: UserId,
        mut draft: CourseDraft,
    ) -> Result<Course, CatalogServiceError> {
        let user = self.user(actor).await?;
        let instructor = *draft.instructor_id.get_or_insert(actor);
        let allowed = user.can(|c| c.author_any_course)
            || (user.can(|c| c.author_own_courses) && instructor == actor);
        if !allowed {
            return Err(CatalogServiceError::Forbidden(actor));
        }

        let validated = draft.validate(self.clock.now())?;
        let id = self
            .catalog
            .insert_course(validated.clone())
            .await
            .map_err(|e| match e {
                StorageError::Conflict => CatalogServiceError::SlugTaken,
                other => CatalogServiceError::Storage(other),
            })?;
        let course = validated.assign_id(id);
        info!(course_id = %id, slug = course.slug(), instructor_id = %instructor, "course created");
        Ok(course)
    }

    /// Append a lesson at the end of its course.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` for unknown courses and
    /// `Forbidden` if the actor may not edit the course.
    pub async fn add_lesson(
        &self,
        actor: UserId,
        draft: LessonDraft,
    ) -> Result<Lesson, CatalogServiceError> {
        self.authorize_course(actor, draft.course_id).await?;
        let lesson = self.catalog.append_lesson(draft.validate()?).await?;
        debug!(
            lesson_id = %lesson.id(),
            course_id = %lesson.course_id(),
            order = lesson.order(),
            kind = lesson.kind().as_str(),
            "lesson added"
        );
        Ok(lesson)
    }

    /// Attach a question to a quiz lesson.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotAQuiz` for non-quiz lessons and
    /// `Catalog` when the answers are not exactly one correct out of at least
    /// two.
    pub async fn add_question(
        &self,
        actor: UserId,
        lesson_id: LessonId,
        draft: QuestionDraft,
    ) -> Result<Question, CatalogServiceError> {
        let lesson = self
            .catalog
            .get_lesson(lesson_id)
            .await?
            .ok_or_else(|| CatalogServiceError::NotFound(Entity::Lesson, lesson_id.to_string()))?;
        self.authorize_course(actor, lesson.course_id()).await?;
        if !lesson.is_quiz() {
            return Err(CatalogServiceError::NotAQuiz(lesson_id));
        }
        let question = self
            .catalog
            .insert_question(lesson_id, draft.validate()?)
            .await?;
        debug!(question_id = %question.id, %lesson_id, "question added");
        Ok(question)
    }

    /// Renumber lessons so `lesson_ids` come first, in that order.
    ///
    /// Ids from other courses are skipped; unlisted lessons follow in their
    /// current order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` for unknown courses and
    /// `Forbidden` if the actor may not edit the course.
    pub async fn reorder_lessons(
        &self,
        actor: UserId,
        course_id: CourseId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<Lesson>, CatalogServiceError> {
        self.authorize_course(actor, course_id).await?;
        let lessons = self.catalog.reorder_lessons(course_id, lesson_ids).await?;
        info!(%course_id, lessons = lessons.len(), "lessons reordered");
        Ok(lessons)
    }

    /// Create an empty learning path supervised by the actor.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Forbidden` unless the actor may build paths.
    pub async fn create_learning_path(
        &self,
        actor: UserId,
        title: &str,
        description: &str,
    ) -> Result<LearningPath, CatalogServiceError> {
        let user = self.user(actor).await?;
        if !user.can(|c| c.build_paths) {
            return Err(CatalogServiceError::Forbidden(actor));
        }
        let now = self.clock.now();
        let draft = LearningPath::new(LearningPathId::new(0), title, description, Some(actor), now)?;
        let id = self
            .catalog
            .insert_learning_path(NewLearningPathRecord::from_path(&draft))
            .await?;
        info!(path_id = %id, supervisor_id = %actor, "learning path created");
        Ok(LearningPath::new(id, draft.title(), draft.description(), Some(actor), now)?)
    }

    /// Replace the ordered course list of a path.
    ///
    /// Unknown and repeated course ids are skipped. Returns the ids kept.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` for unknown paths and
    /// `Forbidden` unless the actor may build paths.
    pub async fn set_path_structure(
        &self,
        actor: UserId,
        path_id: LearningPathId,
        course_ids: &[CourseId],
    ) -> Result<Vec<CourseId>, CatalogServiceError> {
        let user = self.user(actor).await?;
        if !user.can(|c| c.build_paths) {
            return Err(CatalogServiceError::Forbidden(actor));
        }
        if self.catalog.get_learning_path(path_id).await?.is_none() {
            return Err(CatalogServiceError::NotFound(
                Entity::LearningPath,
                path_id.to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        let mut kept = Vec::with_capacity(course_ids.len());
        for &course_id in course_ids {
            if !seen.insert(course_id) {
                continue;
            }
            if self.catalog.get_course(course_id).await?.is_some() {
                kept.push(course_id);
            } else {
                warn!(%path_id, %course_id, "skipping unknown course in path structure");
            }
        }

        self.catalog.set_path_courses(path_id, &kept).await?;
        info!(%path_id, courses = kept.len(), "learning path structure updated");
        Ok(kept)
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` for unknown courses.
    pub async fn course_outline(
        &self,
        course_id: CourseId,
    ) -> Result<CourseOutline, CatalogServiceError> {
        let course = self.course(course_id).await?;
        let lessons = self.catalog.lessons_for_course(course_id).await?;
        Ok(CourseOutline { course, lessons })
    }

    async fn user(&self, id: UserId) -> Result<User, CatalogServiceError> {
        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| CatalogServiceError::NotFound(Entity::User, id.to_string()))
    }

    async fn course(&self, id: CourseId) -> Result<Course, CatalogServiceError> {
        self.catalog
            .get_course(id)
            .await?
            .ok_or_else(|| CatalogServiceError::NotFound(Entity::Course, id.to_string()))
    }

    async fn authorize_course(
        &self,
        actor: UserId,
        course_id: CourseId,
    ) -> Result<Course, CatalogServiceError> {
        let user = self.user(actor).await?;
        let course = self.course(course_id).await?;
        let allowed = user.can(|c| c.author_any_course)
            || (user.can(|c| c.author_own_courses) && course.instructor_id() == Some(actor));
        if allowed {
            Ok(course)
        } else {
            Err(CatalogServiceError::Forbidden(actor))
        }
    }
}
