use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use academy_core::model::{
    Answer, AnswerId, AttemptId, Contract, ContractId, Course, CourseId, DiscussionPost,
    DiscussionThread, EnrollableTarget, Enrollment, EnrollmentId, LearningPath, LearningPathId,
    Lesson, LessonId, PostId, Question, QuestionId, QuizAttempt, Role, SubjectId, ThreadDraft,
    ThreadId, User, UserId, ValidatedContract, ValidatedCourse, ValidatedLesson,
    ValidatedQuestion,
};
use academy_core::progress::ProgressUpdate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::repository::{
    CatalogRepository, ContractRepository, DiscussionRepository, EnrollmentRepository,
    NewLearningPathRecord, NewUserRecord, ProgressRecount, StorageError, UserRepository,
    reordered_lesson_ids,
};

#[derive(Default)]
struct State {
    next_id: u64,
    users: HashMap<UserId, User>,
    courses: HashMap<CourseId, Course>,
    lessons: HashMap<LessonId, Lesson>,
    questions: HashMap<QuestionId, Question>,
    paths: HashMap<LearningPathId, LearningPath>,
    enrollments: HashMap<EnrollmentId, Enrollment>,
    enrollment_index: HashMap<(SubjectId, EnrollableTarget), EnrollmentId>,
    contracts: HashMap<ContractId, Contract>,
    threads: HashMap<ThreadId, DiscussionThread>,
    posts: HashMap<PostId, DiscussionPost>,
}

impl State {
    /// Ids are unique across every table, which keeps tests readable.
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn enrollment_mut(&mut self, id: EnrollmentId) -> Result<&mut Enrollment, StorageError> {
        self.enrollments.get_mut(&id).ok_or(StorageError::NotFound)
    }
}

/// Simple in-memory repository for tests and prototyping.
///
/// A single lock guards every table, so each trait method is atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn by_id<K: Ord + Copy + std::hash::Hash, V: Clone>(map: &HashMap<K, V>, keep: impl Fn(&V) -> bool) -> Vec<V> {
    let mut keys: Vec<K> = map
        .iter()
        .filter(|(_, v)| keep(v))
        .map(|(k, _)| *k)
        .collect();
    keys.sort_unstable();
    keys.into_iter().filter_map(|k| map.get(&k).cloned()).collect()
}

fn sorted_lessons(state: &State, course: CourseId) -> Vec<Lesson> {
    let mut lessons: Vec<Lesson> = state
        .lessons
        .values()
        .filter(|l| l.course_id() == course)
        .cloned()
        .collect();
    lessons.sort_by_key(|l| (l.order(), l.id()));
    lessons
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let mut state = self.lock()?;
        if state.users.values().any(|u| u.username() == user.username) {
            return Err(StorageError::Conflict);
        }
        let id = UserId::new(state.next());
        let user = User::new(id, user.username, user.full_name, user.email, user.role)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        state.users.insert(id, user);
        Ok(id)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>, StorageError> {
        let state = self.lock()?;
        Ok(by_id(&state.users, |u| u.role() == role))
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn insert_course(&self, course: ValidatedCourse) -> Result<CourseId, StorageError> {
        let mut state = self.lock()?;
        if state.courses.values().any(|c| c.slug() == course.slug) {
            return Err(StorageError::Conflict);
        }
        let id = CourseId::new(state.next());
        state.courses.insert(id, course.assign_id(id));
        Ok(id)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        Ok(self.lock()?.courses.get(&id).cloned())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let state = self.lock()?;
        Ok(by_id(&state.courses, |_| true))
    }

    async fn courses_by_instructor(&self, instructor: UserId) -> Result<Vec<Course>, StorageError> {
        let state = self.lock()?;
        Ok(by_id(&state.courses, |c| c.instructor_id() == Some(instructor)))
    }

    async fn append_lesson(&self, lesson: ValidatedLesson) -> Result<Lesson, StorageError> {
        let mut state = self.lock()?;
        if !state.courses.contains_key(&lesson.course_id) {
            return Err(StorageError::NotFound);
        }
        let order = sorted_lessons(&state, lesson.course_id)
            .last()
            .map_or(1, |l| l.order() + 1);
        let id = LessonId::new(state.next());
        let lesson = lesson.assign(id, order);
        state.lessons.insert(id, lesson.clone());
        Ok(lesson)
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        Ok(self.lock()?.lessons.get(&id).cloned())
    }

    async fn lessons_for_course(&self, course: CourseId) -> Result<Vec<Lesson>, StorageError> {
        Ok(sorted_lessons(&*self.lock()?, course))
    }

    async fn count_lessons(&self, course: CourseId) -> Result<usize, StorageError> {
        let state = self.lock()?;
        Ok(state
            .lessons
            .values()
            .filter(|l| l.course_id() == course)
            .count())
    }

    async fn reorder_lessons(
        &self,
        course: CourseId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<Lesson>, StorageError> {
        let mut state = self.lock()?;
        let current = sorted_lessons(&state, course);
        let current_ids: Vec<LessonId> = current.iter().map(Lesson::id).collect();
        let ordered = reordered_lesson_ids(&current_ids, lesson_ids);

        let mut renumbered = Vec::with_capacity(ordered.len());
        for (position, id) in (1_u32..).zip(ordered) {
            let Some(lesson) = current.iter().find(|l| l.id() == id) else {
                continue;
            };
            let lesson = Lesson::from_persisted(
                lesson.id(),
                lesson.course_id(),
                lesson.title().to_owned(),
                position,
                lesson.content().clone(),
                lesson.is_previewable(),
            );
            state.lessons.insert(lesson.id(), lesson.clone());
            renumbered.push(lesson);
        }
        Ok(renumbered)
    }

    async fn insert_question(
        &self,
        lesson: LessonId,
        question: ValidatedQuestion,
    ) -> Result<Question, StorageError> {
        let mut state = self.lock()?;
        if !state.lessons.contains_key(&lesson) {
            return Err(StorageError::NotFound);
        }
        let id = QuestionId::new(state.next());
        let mut answers = Vec::with_capacity(question.answers.len());
        for answer in question.answers {
            answers.push(Answer {
                id: AnswerId::new(state.next()),
                text: answer.text,
                is_correct: answer.is_correct,
            });
        }
        let question = Question {
            id,
            lesson_id: lesson,
            text: question.text,
            answers,
        };
        state.questions.insert(id, question.clone());
        Ok(question)
    }

    async fn questions_for_lesson(&self, lesson: LessonId) -> Result<Vec<Question>, StorageError> {
        let state = self.lock()?;
        Ok(by_id(&state.questions, |q| q.lesson_id == lesson))
    }

    async fn insert_learning_path(
        &self,
        path: NewLearningPathRecord,
    ) -> Result<LearningPathId, StorageError> {
        let mut state = self.lock()?;
        let id = LearningPathId::new(state.next());
        let path = LearningPath::new(
            id,
            path.title,
            path.description,
            path.supervisor_id,
            path.created_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        state.paths.insert(id, path);
        Ok(id)
    }

    async fn get_learning_path(
        &self,
        id: LearningPathId,
    ) -> Result<Option<LearningPath>, StorageError> {
        Ok(self.lock()?.paths.get(&id).cloned())
    }

    async fn paths_by_supervisor(
        &self,
        supervisor: UserId,
    ) -> Result<Vec<LearningPath>, StorageError> {
        let state = self.lock()?;
        Ok(by_id(&state.paths, |p| p.supervisor_id() == Some(supervisor)))
    }

    async fn set_path_courses(
        &self,
        path: LearningPathId,
        courses: &[CourseId],
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let current = state.paths.remove(&path).ok_or(StorageError::NotFound)?;
        state
            .paths
            .insert(path, current.with_courses(courses.to_vec()));
        Ok(())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn get_or_create(
        &self,
        subject: SubjectId,
        target: EnrollableTarget,
        enrolled_at: DateTime<Utc>,
    ) -> Result<(Enrollment, bool), StorageError> {
        let mut state = self.lock()?;
        if let Some(id) = state.enrollment_index.get(&(subject, target)).copied() {
            let existing = state.enrollment_mut(id)?.clone();
            return Ok((existing, false));
        }
        let id = EnrollmentId::new(state.next());
        let enrollment = Enrollment::new(id, subject, target, enrolled_at);
        state.enrollment_index.insert((subject, target), id);
        state.enrollments.insert(id, enrollment.clone());
        Ok((enrollment, true))
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StorageError> {
        Ok(self.lock()?.enrollments.get(&id).cloned())
    }

    async fn find_enrollment(
        &self,
        subject: SubjectId,
        target: EnrollableTarget,
    ) -> Result<Option<Enrollment>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .enrollment_index
            .get(&(subject, target))
            .and_then(|id| state.enrollments.get(id))
            .cloned())
    }

    async fn enrollments_for_subject(
        &self,
        subject: SubjectId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let state = self.lock()?;
        Ok(by_id(&state.enrollments, |e| e.subject_id() == subject))
    }

    async fn enrollments_for_target(
        &self,
        target: EnrollableTarget,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let state = self.lock()?;
        Ok(by_id(&state.enrollments, |e| e.target() == target))
    }

    async fn count_enrollments(&self) -> Result<u64, StorageError> {
        Ok(self.lock()?.enrollments.len() as u64)
    }

    async fn set_last_accessed(
        &self,
        id: EnrollmentId,
        lesson: LessonId,
    ) -> Result<(), StorageError> {
        self.lock()?.enrollment_mut(id)?.record_access(lesson);
        Ok(())
    }

    async fn add_completed_lesson(
        &self,
        id: EnrollmentId,
        lesson: LessonId,
        _completed_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        Ok(self.lock()?.enrollment_mut(id)?.complete_lesson(lesson))
    }

    async fn recount_progress(
        &self,
        id: EnrollmentId,
        course: CourseId,
    ) -> Result<ProgressRecount, StorageError> {
        let mut state = self.lock()?;
        let lesson_ids: Vec<LessonId> = sorted_lessons(&state, course)
            .iter()
            .map(Lesson::id)
            .collect();
        let enrollment = state.enrollment_mut(id)?;
        if enrollment.target().as_course() != Some(course) {
            return Err(StorageError::Conflict);
        }
        let previous = enrollment.status();
        let update = enrollment
            .recompute_progress(lesson_ids)
            .ok_or(StorageError::Conflict)?;
        Ok(ProgressRecount { previous, update })
    }

    async fn update_progress(
        &self,
        id: EnrollmentId,
        update: ProgressUpdate,
    ) -> Result<(), StorageError> {
        self.lock()?.enrollment_mut(id)?.apply_progress(update);
        Ok(())
    }

    async fn append_quiz_attempt(
        &self,
        id: EnrollmentId,
        attempt: &QuizAttempt,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let enrollment = state.enrollment_mut(id)?;
        if enrollment.attempt(attempt.attempt_id()).is_some() {
            return Err(StorageError::Conflict);
        }
        enrollment.push_attempt(attempt.clone());
        Ok(())
    }

    async fn get_quiz_attempt(
        &self,
        id: EnrollmentId,
        attempt: AttemptId,
    ) -> Result<Option<QuizAttempt>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .enrollments
            .get(&id)
            .and_then(|e| e.attempt(attempt))
            .cloned())
    }
}

#[async_trait]
impl ContractRepository for InMemoryRepository {
    async fn insert_contract(
        &self,
        contract: ValidatedContract,
    ) -> Result<ContractId, StorageError> {
        let mut state = self.lock()?;
        let id = ContractId::new(state.next());
        state.contracts.insert(id, contract.assign_id(id));
        Ok(id)
    }

    async fn get_contract(&self, id: ContractId) -> Result<Option<Contract>, StorageError> {
        Ok(self.lock()?.contracts.get(&id).cloned())
    }

    async fn contracts_for_client(&self, client: UserId) -> Result<Vec<Contract>, StorageError> {
        let state = self.lock()?;
        Ok(by_id(&state.contracts, |c| c.client_id() == client))
    }

    async fn set_contract_active(
        &self,
        id: ContractId,
        active: bool,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let c = state.contracts.get(&id).ok_or(StorageError::NotFound)?;
        let updated = Contract::from_persisted(
            c.id(),
            c.title().to_owned(),
            c.client_id(),
            c.student_ids().to_vec(),
            c.learning_path_ids().to_vec(),
            c.starts_at(),
            c.ends_at(),
            active,
            c.created_at(),
        );
        state.contracts.insert(id, updated);
        Ok(())
    }
}

#[async_trait]
impl DiscussionRepository for InMemoryRepository {
    async fn insert_thread(
        &self,
        thread: ThreadDraft,
        created_at: DateTime<Utc>,
    ) -> Result<DiscussionThread, StorageError> {
        let mut state = self.lock()?;
        let id = ThreadId::new(state.next());
        let thread = thread.assign(id, created_at);
        state.threads.insert(id, thread.clone());
        Ok(thread)
    }

    async fn get_thread(&self, id: ThreadId) -> Result<Option<DiscussionThread>, StorageError> {
        Ok(self.lock()?.threads.get(&id).cloned())
    }

    async fn threads_for_lesson(
        &self,
        lesson: LessonId,
    ) -> Result<Vec<DiscussionThread>, StorageError> {
        let state = self.lock()?;
        let mut threads = by_id(&state.threads, |t| t.lesson_id == lesson);
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(threads)
    }

    async fn insert_post(
        &self,
        thread: ThreadId,
        author: UserId,
        body: String,
        created_at: DateTime<Utc>,
    ) -> Result<DiscussionPost, StorageError> {
        let mut state = self.lock()?;
        if !state.threads.contains_key(&thread) {
            return Err(StorageError::NotFound);
        }
        let post = DiscussionPost {
            id: PostId::new(state.next()),
            thread_id: thread,
            author_id: author,
            body,
            created_at,
        };
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn posts_for_thread(
        &self,
        thread: ThreadId,
    ) -> Result<Vec<DiscussionPost>, StorageError> {
        let state = self.lock()?;
        Ok(by_id(&state.posts, |p| p.thread_id == thread))
    }

    async fn get_post(&self, id: PostId) -> Result<Option<DiscussionPost>, StorageError> {
        Ok(self.lock()?.posts.get(&id).cloned())
    }
}
