//! Shared error types for the services crate.

use std::fmt;

use thiserror::Error;

use academy_core::grading::GradingError;
use academy_core::model::{
    CatalogError, ContractError, ContractId, CourseId, DiscussionError, EnrollmentId, LessonId,
    UserError, UserId,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Course,
    Lesson,
    LearningPath,
    Enrollment,
    Attempt,
    Contract,
    Thread,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::User => "user",
            Entity::Course => "course",
            Entity::Lesson => "lesson",
            Entity::LearningPath => "learning path",
            Entity::Enrollment => "enrollment",
            Entity::Attempt => "quiz attempt",
            Entity::Contract => "contract",
            Entity::Thread => "discussion thread",
        })
    }
}

/// Errors emitted by `UserService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UserServiceError {
    #[error("{0} {1} not found")]
    NotFound(Entity, String),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `EnrollmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnrollmentServiceError {
    #[error("{0} {1} not found")]
    NotFound(Entity, String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("{0} {1} not found")]
    NotFound(Entity, String),
    #[error("enrollment {0} is not a course enrollment")]
    NotCourseEnrollment(EnrollmentId),
    #[error("lesson {lesson_id} is not part of course {course_id}")]
    LessonNotInCourse {
        lesson_id: LessonId,
        course_id: CourseId,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("{0} {1} not found")]
    NotFound(Entity, String),
    #[error("lesson {lesson_id} is not covered by enrollment {enrollment_id}")]
    LessonNotEnrolled {
        lesson_id: LessonId,
        enrollment_id: EnrollmentId,
    },
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogServiceError {
    #[error("{0} {1} not found")]
    NotFound(Entity, String),
    #[error("user {0} may not perform this catalog change")]
    Forbidden(UserId),
    #[error("lesson {0} is not a quiz")]
    NotAQuiz(LessonId),
    #[error("slug is already taken")]
    SlugTaken,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `LessonNavigator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NavigationError {
    #[error("{0} {1} not found")]
    NotFound(Entity, String),
    #[error("course {0} has no lessons")]
    EmptyCourse(CourseId),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ContractService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContractServiceError {
    #[error("{0} {1} not found")]
    NotFound(Entity, String),
    #[error("user {0} may not manage or view this contract")]
    Forbidden(UserId),
    #[error("user {0} is not a third-party client")]
    NotAClient(UserId),
    #[error("user {0} is not a student")]
    NotAStudent(UserId),
    #[error("contract {0} is not in effect")]
    NotInEffect(ContractId),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DiscussionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscussionServiceError {
    #[error("{0} {1} not found")]
    NotFound(Entity, String),
    #[error("lesson {lesson_id} is not part of course {course_id}")]
    LessonNotInCourse {
        lesson_id: LessonId,
        course_id: CourseId,
    },
    #[error(transparent)]
    Discussion(#[from] DiscussionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ReportService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportServiceError {
    #[error("{0} {1} not found")]
    NotFound(Entity, String),
    #[error("user {0} may not view course reports")]
    Forbidden(UserId),
    #[error("student {student_id} is not enrolled in course {course_id}")]
    NotEnrolled {
        student_id: UserId,
        course_id: CourseId,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DashboardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DashboardError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

