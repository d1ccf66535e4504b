use std::sync::Arc;

use academy_core::model::{
    AttemptId, Contract, ContractId, Course, CourseId, DiscussionPost, DiscussionThread,
    EnrollableTarget, Enrollment, EnrollmentId, EnrollmentStatus, LearningPath, LearningPathId, Lesson, LessonId,
    PostId, Question, QuizAttempt, Role, SubjectId, ThreadDraft, ThreadId, User, UserId,
    ValidatedContract, ValidatedCourse, ValidatedLesson, ValidatedQuestion,
};
use academy_core::progress::ProgressUpdate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Insert shape for a user; the repository assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserRecord {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

impl NewUserRecord {
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            username: user.username().to_owned(),
            full_name: user.full_name().to_owned(),
            email: user.email().to_owned(),
            role: user.role(),
        }
    }
}

/// Insert shape for a learning path; the repository assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLearningPathRecord {
    pub title: String,
    pub description: String,
    pub supervisor_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl NewLearningPathRecord {
    #[must_use]
    pub fn from_path(path: &LearningPath) -> Self {
        Self {
            title: path.title().to_owned(),
            description: path.description().to_owned(),
            supervisor_id: path.supervisor_id(),
            created_at: path.created_at(),
        }
    }
}

/// Result of [`EnrollmentRepository::recount_progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressRecount {
    /// Status stored before the recount was written.
    pub previous: EnrollmentStatus,
    pub update: ProgressUpdate,
}

/// New lesson sequence for a reorder: requested ids that belong to the course
/// come first in request order, the remaining lessons keep their relative order.
#[must_use]
pub fn reordered_lesson_ids(current: &[LessonId], requested: &[LessonId]) -> Vec<LessonId> {
    let mut ordered: Vec<LessonId> = Vec::with_capacity(current.len());
    for id in requested {
        if current.contains(id) && !ordered.contains(id) {
            ordered.push(*id);
        }
    }
    for id in current {
        if !ordered.contains(id) {
            ordered.push(*id);
        }
    }
    ordered
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the username is taken.
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn users_with_role(&self, role: Role) -> Result<Vec<User>, StorageError>;
}

/// Courses, lessons, quiz questions and learning paths.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the slug is taken.
    async fn insert_course(&self, course: ValidatedCourse) -> Result<CourseId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_courses(&self) -> Result<Vec<Course>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn courses_by_instructor(&self, instructor: UserId) -> Result<Vec<Course>, StorageError>;

    /// Append a lesson at the end of its course (`order` = last + 1, first is 1).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist.
    async fn append_lesson(&self, lesson: ValidatedLesson) -> Result<Lesson, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// Lessons of a course ordered by `order`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn lessons_for_course(&self, course: CourseId) -> Result<Vec<Lesson>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn count_lessons(&self, course: CourseId) -> Result<usize, StorageError>;

    /// Renumber lessons: listed ids get 1.. in list order, ids from other
    /// courses are skipped, unlisted lessons follow in their previous order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn reorder_lessons(
        &self,
        course: CourseId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<Lesson>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson does not exist.
    async fn insert_question(
        &self,
        lesson: LessonId,
        question: ValidatedQuestion,
    ) -> Result<Question, StorageError>;

    /// Questions of a lesson with their answers, ordered by question id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn questions_for_lesson(&self, lesson: LessonId) -> Result<Vec<Question>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn insert_learning_path(
        &self,
        path: NewLearningPathRecord,
    ) -> Result<LearningPathId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_learning_path(
        &self,
        id: LearningPathId,
    ) -> Result<Option<LearningPath>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn paths_by_supervisor(
        &self,
        supervisor: UserId,
    ) -> Result<Vec<LearningPath>, StorageError>;

    /// Replace the ordered course list of a path in one step.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the path does not exist.
    async fn set_path_courses(
        &self,
        path: LearningPathId,
        courses: &[CourseId],
    ) -> Result<(), StorageError>;
}

/// Enrollment records. Every mutation is field-scoped so concurrent writers
/// on the same enrollment never overwrite each other's fields.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Atomically fetch the enrollment for `(subject, target)` or create it.
    ///
    /// Returns the record and whether this call created it. An existing record
    /// is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_or_create(
        &self,
        subject: SubjectId,
        target: EnrollableTarget,
        enrolled_at: DateTime<Utc>,
    ) -> Result<(Enrollment, bool), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn find_enrollment(
        &self,
        subject: SubjectId,
        target: EnrollableTarget,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn enrollments_for_subject(
        &self,
        subject: SubjectId,
    ) -> Result<Vec<Enrollment>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn enrollments_for_target(
        &self,
        target: EnrollableTarget,
    ) -> Result<Vec<Enrollment>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn count_enrollments(&self) -> Result<u64, StorageError>;

    /// Writes `last_accessed_lesson_id` only.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the enrollment does not exist.
    async fn set_last_accessed(
        &self,
        id: EnrollmentId,
        lesson: LessonId,
    ) -> Result<(), StorageError>;

    /// Adds `lesson` to the completed set and marks it last accessed.
    ///
    /// Returns `false` when the lesson was already completed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the enrollment does not exist.
    async fn add_completed_lesson(
        &self,
        id: EnrollmentId,
        lesson: LessonId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Recounts progress of a course enrollment against the lessons currently
    /// in `course` and stores it. The count and the write happen atomically, so
    /// concurrent completions cannot overwrite each other with stale totals.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the enrollment does not exist and
    /// `StorageError::Conflict` if it is not enrolled in `course`.
    async fn recount_progress(
        &self,
        id: EnrollmentId,
        course: CourseId,
    ) -> Result<ProgressRecount, StorageError>;

    /// Writes `progress` and `status` only. A completed enrollment is never
    /// moved back to in progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the enrollment does not exist.
    async fn update_progress(
        &self,
        id: EnrollmentId,
        update: ProgressUpdate,
    ) -> Result<(), StorageError>;

    /// Appends an attempt; prior attempts are never touched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the enrollment does not exist and
    /// `StorageError::Conflict` if the attempt id is already recorded.
    async fn append_quiz_attempt(
        &self,
        id: EnrollmentId,
        attempt: &QuizAttempt,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_quiz_attempt(
        &self,
        id: EnrollmentId,
        attempt: AttemptId,
    ) -> Result<Option<QuizAttempt>, StorageError>;
}

#[async_trait]
pub trait ContractRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn insert_contract(&self, contract: ValidatedContract)
    -> Result<ContractId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_contract(&self, id: ContractId) -> Result<Option<Contract>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn contracts_for_client(&self, client: UserId) -> Result<Vec<Contract>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the contract does not exist.
    async fn set_contract_active(&self, id: ContractId, active: bool)
    -> Result<(), StorageError>;
}

#[async_trait]
pub trait DiscussionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn insert_thread(
        &self,
        thread: ThreadDraft,
        created_at: DateTime<Utc>,
    ) -> Result<DiscussionThread, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_thread(&self, id: ThreadId) -> Result<Option<DiscussionThread>, StorageError>;

    /// Threads for a lesson, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn threads_for_lesson(
        &self,
        lesson: LessonId,
    ) -> Result<Vec<DiscussionThread>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the thread does not exist.
    async fn insert_post(
        &self,
        thread: ThreadId,
        author: UserId,
        body: String,
        created_at: DateTime<Utc>,
    ) -> Result<DiscussionPost, StorageError>;

    /// Replies in posting order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn posts_for_thread(&self, thread: ThreadId)
    -> Result<Vec<DiscussionPost>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_post(&self, id: PostId) -> Result<Option<DiscussionPost>, StorageError>;
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub contracts: Arc<dyn ContractRepository>,
    pub discussions: Arc<dyn DiscussionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wires one repository implementing every trait into all slots.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: UserRepository
            + CatalogRepository
            + EnrollmentRepository
            + ContractRepository
            + DiscussionRepository
            + Clone
            + 'static,
    {
        Self {
            users: Arc::new(repo.clone()),
            catalog: Arc::new(repo.clone()),
            enrollments: Arc::new(repo.clone()),
            contracts: Arc::new(repo.clone()),
            discussions: Arc::new(repo),
        }
    }
}
