//! In-memory fixture shared by the service unit tests.

use std::sync::Arc;

use academy_core::model::{
    AnswerDraft, CourseDraft, CourseId, EnrollableTarget, Enrollment, LearningPathId,
    LessonContent, LessonDraft, LessonId, Question, QuestionDraft, Role, SubjectId, UserId,
};
use academy_core::time::{fixed_clock, fixed_now};
use storage::repository::{NewLearningPathRecord, NewUserRecord, Storage};

use crate::catalog_service::CatalogService;
use crate::contract_service::ContractService;
use crate::dashboard_service::DashboardService;
use crate::discussion_service::DiscussionService;
use crate::enrollment_service::EnrollmentService;
use crate::navigator::LessonNavigator;
use crate::notifier::WebhookNotifier;
use crate::progress_service::ProgressService;
use crate::quiz_service::QuizService;
use crate::report_service::ReportService;

pub(crate) struct Fixture {
    pub storage: Storage,
    pub admin: UserId,
    pub instructor: UserId,
    pub supervisor: UserId,
    pub client: UserId,
    pub student: UserId,
}

impl Fixture {
    pub async fn new() -> Self {
        let storage = Storage::in_memory();
        let mut fx = Self {
            storage,
            admin: UserId::new(0),
            instructor: UserId::new(0),
            supervisor: UserId::new(0),
            client: UserId::new(0),
            student: UserId::new(0),
        };
        fx.admin = fx.user("admin", Role::Admin).await;
        fx.instructor = fx.user("ada", Role::Instructor).await;
        fx.supervisor = fx.user("grace", Role::Supervisor).await;
        fx.client = fx.user("acme", Role::ThirdParty).await;
        fx.student = fx
            .named_user("ann", "Ann Student", Role::Student)
            .await;
        fx
    }

    pub async fn user(&self, username: &str, role: Role) -> UserId {
        self.named_user(username, "", role).await
    }

    async fn named_user(&self, username: &str, full_name: &str, role: Role) -> UserId {
        self.storage
            .users
            .insert_user(NewUserRecord {
                username: username.into(),
                full_name: full_name.into(),
                email: format!("{username}@example.com"),
                role,
            })
            .await
            .unwrap()
    }

    /// A course taught by the fixture instructor.
    pub async fn course(&self, title: &str) -> CourseId {
        let mut draft = CourseDraft::new(title);
        draft.instructor_id = Some(self.instructor);
        self.storage
            .catalog
            .insert_course(draft.validate(fixed_now()).unwrap())
            .await
            .unwrap()
    }

    pub async fn lesson(&self, course_id: CourseId, title: &str, content: LessonContent) -> LessonId {
        let draft = LessonDraft {
            course_id,
            title: title.into(),
            content,
            is_previewable: false,
        };
        self.storage
            .catalog
            .append_lesson(draft.validate().unwrap())
            .await
            .unwrap()
            .id()
    }

    pub async fn lessons(&self, course_id: CourseId, count: usize) -> Vec<LessonId> {
        let mut ids = Vec::with_capacity(count);
        for i in 1..=count {
            let body = format!("Lesson {i}");
            ids.push(
                self.lesson(course_id, &body, LessonContent::Text { body: body.clone() })
                    .await,
            );
        }
        ids
    }

    /// A quiz lesson with `questions` two-answer questions.
    pub async fn quiz(&self, course_id: CourseId, questions: usize) -> (LessonId, Vec<Question>) {
        let lesson_id = self.lesson(course_id, "Quiz", LessonContent::Quiz).await;
        let mut stored = Vec::with_capacity(questions);
        for i in 1..=questions {
            let draft = QuestionDraft {
                text: format!("Question {i}"),
                answers: vec![
                    AnswerDraft::new("wrong", false),
                    AnswerDraft::new("right", true),
                ],
            };
            stored.push(
                self.storage
                    .catalog
                    .insert_question(lesson_id, draft.validate().unwrap())
                    .await
                    .unwrap(),
            );
        }
        (lesson_id, stored)
    }

    /// A learning path supervised by the fixture supervisor.
    pub async fn path(&self, title: &str, courses: &[CourseId]) -> LearningPathId {
        let id = self
            .storage
            .catalog
            .insert_learning_path(NewLearningPathRecord {
                title: title.into(),
                description: String::new(),
                supervisor_id: Some(self.supervisor),
                created_at: fixed_now(),
            })
            .await
            .unwrap();
        self.storage
            .catalog
            .set_path_courses(id, courses)
            .await
            .unwrap();
        id
    }

    pub async fn enroll(&self, subject: SubjectId, target: EnrollableTarget) -> Enrollment {
        self.storage
            .enrollments
            .get_or_create(subject, target, fixed_now())
            .await
            .unwrap()
            .0
    }

    pub fn enrollment_service(&self) -> EnrollmentService {
        EnrollmentService::new(
            fixed_clock(),
            Arc::clone(&self.storage.users),
            Arc::clone(&self.storage.catalog),
            Arc::clone(&self.storage.enrollments),
            WebhookNotifier::disabled(),
        )
    }

    pub fn progress_service(&self) -> ProgressService {
        ProgressService::new(
            fixed_clock(),
            Arc::clone(&self.storage.catalog),
            Arc::clone(&self.storage.enrollments),
        )
    }

    pub fn quiz_service(&self) -> QuizService {
        QuizService::new(
            fixed_clock(),
            Arc::clone(&self.storage.catalog),
            Arc::clone(&self.storage.enrollments),
        )
    }

    pub fn catalog_service(&self) -> CatalogService {
        CatalogService::new(
            fixed_clock(),
            Arc::clone(&self.storage.users),
            Arc::clone(&self.storage.catalog),
        )
    }

    pub fn navigator(&self) -> LessonNavigator {
        LessonNavigator::new(
            Arc::clone(&self.storage.catalog),
            Arc::new(self.enrollment_service()),
        )
    }

    pub fn contract_service(&self) -> ContractService {
        ContractService::new(
            fixed_clock(),
            Arc::clone(&self.storage.users),
            Arc::clone(&self.storage.catalog),
            Arc::clone(&self.storage.contracts),
            Arc::clone(&self.storage.enrollments),
            Arc::new(self.enrollment_service()),
        )
    }

    pub fn discussion_service(&self) -> DiscussionService {
        DiscussionService::new(
            fixed_clock(),
            Arc::clone(&self.storage.users),
            Arc::clone(&self.storage.catalog),
            Arc::clone(&self.storage.discussions),
            WebhookNotifier::disabled(),
        )
    }

    pub fn report_service(&self) -> ReportService {
        ReportService::new(
            Arc::clone(&self.storage.users),
            Arc::clone(&self.storage.catalog),
            Arc::clone(&self.storage.enrollments),
        )
    }

    pub fn dashboard_service(&self) -> DashboardService {
        DashboardService::new(
            fixed_clock(),
            Arc::clone(&self.storage.users),
            Arc::clone(&self.storage.catalog),
            Arc::clone(&self.storage.enrollments),
            Arc::clone(&self.storage.contracts),
        )
    }
}
