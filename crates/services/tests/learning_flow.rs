use std::sync::Arc;

use academy_core::model::{
    AnswerDraft, ContractDraft, CourseDraft, CourseId, CourseStatus, EnrollableTarget,
    EnrollmentStatus, LessonContent, LessonDraft, Percentage, QuestionDraft, Role,
    SubmittedAnswers, ThreadDraft,
};
use academy_core::time::{fixed_clock, fixed_now};
use chrono::Duration;
use services::{AppServices, Dashboard, WebhookConfig};

fn lesson(course_id: CourseId, title: &str, content: LessonContent) -> LessonDraft {
    LessonDraft {
        course_id,
        title: title.into(),
        content,
        is_previewable: false,
    }
}

#[tokio::test]
async fn student_works_through_a_course() {
    let app = AppServices::in_memory(fixed_clock(), WebhookConfig::default());
    let users = app.users();
    let instructor = users
        .register("ada", "Ada Lovelace", "ada@example.com", Role::Instructor)
        .await
        .unwrap();
    let student = users
        .register("ann", "Ann Smith", "ann@example.com", Role::Student)
        .await
        .unwrap();

    let catalog = app.catalog();
    let mut draft = CourseDraft::new("Rust Fundamentals");
    draft.status = CourseStatus::Published;
    let course = catalog.create_course(instructor.id(), draft).await.unwrap();

    let mut lesson_ids = Vec::new();
    for (title, content) in [
        (
            "Welcome",
            LessonContent::Video {
                url: "https://videos.example.com/welcome.mp4".into(),
            },
        ),
        (
            "Ownership",
            LessonContent::Text {
                body: "One owner per value.".into(),
            },
        ),
        (
            "Cheat sheet",
            LessonContent::Pdf {
                url: "https://files.example.com/cheatsheet.pdf".into(),
            },
        ),
        ("Checkpoint", LessonContent::Quiz),
    ] {
        let stored = catalog
            .add_lesson(instructor.id(), lesson(course.id(), title, content))
            .await
            .unwrap();
        lesson_ids.push(stored.id());
    }
    let quiz_id = lesson_ids[3];

    let mut correct = Vec::new();
    for text in ["Moves captures?", "Exclusive borrow?", "Error conversion?"] {
        let question = catalog
            .add_question(
                instructor.id(),
                quiz_id,
                QuestionDraft {
                    text: text.into(),
                    answers: vec![AnswerDraft::new("yes", true), AnswerDraft::new("no", false)],
                },
            )
            .await
            .unwrap();
        correct.push(question.correct_answer().unwrap().id.to_string());
    }

    let view = app
        .navigator()
        .open_lesson(student.id(), course.id(), None)
        .await
        .unwrap();
    assert_eq!(view.lesson.id(), lesson_ids[0]);
    assert_eq!(view.next_order, Some(2));
    let enrollment_id = view.enrollment.id();

    let progress = app.progress();
    progress
        .mark_lesson_complete(enrollment_id, lesson_ids[0])
        .await
        .unwrap();
    let halfway = progress
        .mark_lesson_complete(enrollment_id, lesson_ids[1])
        .await
        .unwrap();
    assert_eq!(halfway.progress().to_string(), "50.00");
    assert_eq!(halfway.status(), EnrollmentStatus::InProgress);

    let answers = SubmittedAnswers::new()
        .with_choice(0, correct[0].clone())
        .with_choice(1, correct[1].clone())
        .with_choice(2, "nonsense");
    let submission = app
        .quizzes()
        .submit_quiz(enrollment_id, quiz_id, answers)
        .await
        .unwrap();
    assert_eq!(submission.grade.score.to_string(), "66.67");

    let review = app
        .quizzes()
        .attempt_review(enrollment_id, submission.attempt.attempt_id())
        .await
        .unwrap();
    assert_eq!(review.grade.correct, 2);

    progress
        .mark_lesson_complete(enrollment_id, lesson_ids[2])
        .await
        .unwrap();
    let done = progress
        .mark_lesson_complete(enrollment_id, lesson_ids[3])
        .await
        .unwrap();
    assert_eq!(done.progress(), Percentage::FULL);
    assert_eq!(done.status(), EnrollmentStatus::Completed);
    assert_eq!(done.quiz_attempts().len(), 1);

    let Dashboard::Student(entries) = app.dashboards().dashboard_for(&student).await.unwrap()
    else {
        panic!("expected a student dashboard");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].title, "Rust Fundamentals");
    assert!(entries[0].progress.is_full());

    let thread = app
        .discussions()
        .open_thread(ThreadDraft {
            course_id: course.id(),
            lesson_id: quiz_id,
            author_id: student.id(),
            title: "Question 3".into(),
            question: "Why is `From` the answer?".into(),
        })
        .await
        .unwrap();
    app.discussions()
        .reply(thread.id, instructor.id(), "Because `?` calls `From::from`.")
        .await
        .unwrap();
    let full = app.discussions().thread_with_posts(thread.id).await.unwrap();
    assert_eq!(full.posts.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_access_creates_one_enrollment() {
    let app = AppServices::in_memory(fixed_clock(), WebhookConfig::default());
    let instructor = app
        .users()
        .register("ada", "", "ada@example.com", Role::Instructor)
        .await
        .unwrap();
    let student = app
        .users()
        .register("ann", "", "ann@example.com", Role::Student)
        .await
        .unwrap();
    let course = app
        .catalog()
        .create_course(instructor.id(), CourseDraft::new("Rust"))
        .await
        .unwrap();

    let directory = app.enrollments();
    let mut handles = Vec::new();
    for _ in 0..16 {
        let directory = Arc::clone(&directory);
        let target: EnrollableTarget = course.id().into();
        let subject = student.id();
        handles.push(tokio::spawn(async move {
            directory.get_or_create(subject, target).await.unwrap()
        }));
    }

    let mut ids = Vec::new();
    let mut created = 0;
    for handle in handles {
        let (enrollment, was_created) = handle.await.unwrap();
        ids.push(enrollment.id());
        created += usize::from(was_created);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(created, 1);
    assert_eq!(
        directory
            .enrollments_for_subject(student.id())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn contract_provisioning_and_report() {
    let app = AppServices::in_memory(fixed_clock(), WebhookConfig::default());
    let users = app.users();
    let admin = users
        .register("admin", "Site Admin", "admin@example.com", Role::Admin)
        .await
        .unwrap();
    let supervisor = users
        .register("grace", "Grace Hopper", "grace@example.com", Role::Supervisor)
        .await
        .unwrap();
    let client = users
        .register("abc", "ABC Corp", "ops@abc.example.com", Role::ThirdParty)
        .await
        .unwrap();
    let student = users
        .register("ann", "Ann Smith", "ann@example.com", Role::Student)
        .await
        .unwrap();

    let course = app
        .catalog()
        .create_course(admin.id(), CourseDraft::new("Rust"))
        .await
        .unwrap();
    let path = app
        .catalog()
        .create_learning_path(supervisor.id(), "Backend Engineer", "")
        .await
        .unwrap();
    app.catalog()
        .set_path_structure(supervisor.id(), path.id(), &[course.id()])
        .await
        .unwrap();

    let contract = app
        .contracts()
        .create_contract(
            admin.id(),
            ContractDraft {
                title: "ABC onboarding".into(),
                client_id: client.id(),
                student_ids: vec![student.id()],
                learning_path_ids: vec![path.id()],
                starts_at: fixed_now() - Duration::days(7),
                ends_at: fixed_now() + Duration::days(90),
            },
        )
        .await
        .unwrap();

    let summary = app.contracts().provision(contract.id()).await.unwrap();
    assert_eq!(summary.created, 1);

    let report = app
        .contracts()
        .progress_report(client.id(), contract.id())
        .await
        .unwrap();
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].name, "Ann Smith");
    assert_eq!(report.rows[0].email, "ann@example.com");
    assert_eq!(report.rows[0].progress, Percentage::ZERO);
    assert_eq!(report.rows[0].status, "In Progress");

    let Dashboard::ThirdParty(contracts) = app.dashboards().dashboard_for(&client).await.unwrap()
    else {
        panic!("expected a client dashboard");
    };
    assert_eq!(contracts[0].contract_id, contract.id());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_lesson_completions_finish_the_course() {
    let app = AppServices::in_memory(fixed_clock(), WebhookConfig::default());
    let instructor = app
        .users()
        .register("ada", "", "ada@example.com", Role::Instructor)
        .await
        .unwrap();
    let student = app
        .users()
        .register("ann", "", "ann@example.com", Role::Student)
        .await
        .unwrap();
    let course = app
        .catalog()
        .create_course(instructor.id(), CourseDraft::new("Rust"))
        .await
        .unwrap();
    let mut lesson_ids = Vec::new();
    for i in 1..=8 {
        let body = format!("Part {i}");
        let stored = app
            .catalog()
            .add_lesson(
                instructor.id(),
                lesson(course.id(), &body, LessonContent::Text { body: body.clone() }),
            )
            .await
            .unwrap();
        lesson_ids.push(stored.id());
    }
    let (enrollment, _) = app
        .enrollments()
        .get_or_create(student.id(), course.id().into())
        .await
        .unwrap();

    let progress = app.progress();
    let mut handles = Vec::new();
    for lesson_id in lesson_ids {
        let progress = Arc::clone(&progress);
        let id = enrollment.id();
        handles.push(tokio::spawn(async move {
            progress.mark_lesson_complete(id, lesson_id).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stored = app.enrollments().enrollment(enrollment.id()).await.unwrap();
    assert_eq!(stored.completed_lesson_ids().len(), 8);
    assert_eq!(stored.progress(), Percentage::FULL);
    assert_eq!(stored.status(), EnrollmentStatus::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_quiz_submissions_keep_every_attempt() {
    let app = AppServices::in_memory(fixed_clock(), WebhookConfig::default());
    let instructor = app
        .users()
        .register("ada", "", "ada@example.com", Role::Instructor)
        .await
        .unwrap();
    let student = app
        .users()
        .register("ann", "", "ann@example.com", Role::Student)
        .await
        .unwrap();
    let course = app
        .catalog()
        .create_course(instructor.id(), CourseDraft::new("Rust"))
        .await
        .unwrap();
    let quiz = app
        .catalog()
        .add_lesson(
            instructor.id(),
            lesson(course.id(), "Checkpoint", LessonContent::Quiz),
        )
        .await
        .unwrap();
    let question = app
        .catalog()
        .add_question(
            instructor.id(),
            quiz.id(),
            QuestionDraft {
                text: "Is `&mut` exclusive?".into(),
                answers: vec![AnswerDraft::new("yes", true), AnswerDraft::new("no", false)],
            },
        )
        .await
        .unwrap();
    let correct = question.correct_answer().unwrap().id.to_string();
    let (enrollment, _) = app
        .enrollments()
        .get_or_create(student.id(), course.id().into())
        .await
        .unwrap();

    let quizzes = app.quizzes();
    let mut handles = Vec::new();
    for i in 0..12 {
        let quizzes = Arc::clone(&quizzes);
        let (id, lesson_id) = (enrollment.id(), quiz.id());
        let choice = if i % 2 == 0 { correct.clone() } else { "0".to_string() };
        handles.push(tokio::spawn(async move {
            quizzes
                .submit_quiz(id, lesson_id, SubmittedAnswers::new().with_choice(0, choice))
                .await
                .unwrap()
        }));
    }
    let mut submitted = Vec::new();
    for handle in handles {
        submitted.push(handle.await.unwrap().attempt);
    }

    let last = app
        .quizzes()
        .submit_quiz(
            enrollment.id(),
            quiz.id(),
            SubmittedAnswers::new().with_choice(0, correct.clone()),
        )
        .await
        .unwrap();

    let stored = app.enrollments().enrollment(enrollment.id()).await.unwrap();
    let attempts = stored.quiz_attempts();
    assert_eq!(attempts.len(), 13);
    for attempt in &submitted {
        assert_eq!(stored.attempt(attempt.attempt_id()), Some(attempt));
    }
    assert_eq!(attempts.last(), Some(&last.attempt));
    let perfect = attempts.iter().filter(|a| a.score().is_full()).count();
    assert_eq!(perfect, 7);
}
