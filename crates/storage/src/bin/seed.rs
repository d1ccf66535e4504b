use std::fmt;

use academy_core::model::{
    AnswerDraft, ContractDraft, CourseDraft, CourseStatus, LessonContent, LessonDraft,
    QuestionDraft, Role, User, UserId,
};
use chrono::{DateTime, Duration, Utc};
use storage::repository::{NewLearningPathRecord, NewUserRecord, Storage};

const DEMO_COURSE_SLUG: &str = "rust-fundamentals";
const DEFAULT_DB_URL: &str = "sqlite://academy.sqlite3?mode=rwc";

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    students: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidStudents { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidStudents { raw } => write!(f, "invalid --students value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("ACADEMY_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.into());
        let mut students = std::env::var("ACADEMY_SEED_STUDENTS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--students" => {
                    let value = require_value(&mut args, "--students")?;
                    students = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidStudents { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            students,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: {DEFAULT_DB_URL})");
    eprintln!("  --students <n>            Number of demo students to create (default: 3)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  ACADEMY_DB_URL, ACADEMY_SEED_STUDENTS");
}

async fn add_user(
    storage: &Storage,
    username: &str,
    full_name: &str,
    role: Role,
) -> Result<UserId, Box<dyn std::error::Error>> {
    let user = User::new(
        UserId::new(0),
        username,
        full_name,
        format!("{username}@example.com"),
        role,
    )?;
    Ok(storage.users.insert_user(NewUserRecord::from_user(&user)).await?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let existing = storage.catalog.list_courses().await?;
    if existing.iter().any(|c| c.slug() == DEMO_COURSE_SLUG) {
        println!("{} already holds the demo catalog", args.db_url);
        return Ok(());
    }

    add_user(&storage, "admin", "Site Admin", Role::Admin).await?;
    let instructor = add_user(&storage, "ada", "Ada Lovelace", Role::Instructor).await?;
    let supervisor = add_user(&storage, "grace", "Grace Hopper", Role::Supervisor).await?;
    let client = add_user(&storage, "abc-corp", "ABC Corp", Role::ThirdParty).await?;

    let mut student_ids = Vec::new();
    for i in 1..=args.students {
        let id = add_user(
            &storage,
            &format!("student{i}"),
            &format!("Student {i}"),
            Role::Student,
        )
        .await?;
        student_ids.push(id);
    }

    let mut course = CourseDraft::new("Rust Fundamentals");
    course.slug = Some(DEMO_COURSE_SLUG.into());
    course.description = "Ownership, borrowing and the standard library.".into();
    course.instructor_id = Some(instructor);
    course.category = "Programming".into();
    course.status = CourseStatus::Published;
    let course_id = storage.catalog.insert_course(course.validate(now)?).await?;

    let lessons = [
        (
            "Welcome",
            LessonContent::Video {
                url: "https://videos.example.com/rust/welcome.mp4".into(),
            },
            true,
        ),
        (
            "Ownership",
            LessonContent::Text {
                body: "Every value has exactly one owner.".into(),
            },
            false,
        ),
        (
            "Cheat sheet",
            LessonContent::Pdf {
                url: "https://files.example.com/rust/cheatsheet.pdf".into(),
            },
            false,
        ),
        ("Checkpoint", LessonContent::Quiz, false),
    ];
    let mut quiz_lesson = None;
    for (title, content, is_previewable) in lessons {
        let draft = LessonDraft {
            course_id,
            title: title.into(),
            content,
            is_previewable,
        };
        let lesson = storage.catalog.append_lesson(draft.validate()?).await?;
        if lesson.is_quiz() {
            quiz_lesson = Some(lesson.id());
        }
    }

    if let Some(lesson_id) = quiz_lesson {
        let questions = [
            ("Which keyword moves a closure's captures?", "move", "ref"),
            ("What does `&mut` grant?", "Exclusive access", "Shared access"),
            ("Which trait enables `?` conversion?", "From", "Into"),
        ];
        for (text, right, wrong) in questions {
            let draft = QuestionDraft {
                text: text.into(),
                answers: vec![AnswerDraft::new(right, true), AnswerDraft::new(wrong, false)],
            };
            storage
                .catalog
                .insert_question(lesson_id, draft.validate()?)
                .await?;
        }
    }

    let path_id = storage
        .catalog
        .insert_learning_path(NewLearningPathRecord {
            title: "Backend Engineer".into(),
            description: "From first program to production services.".into(),
            supervisor_id: Some(supervisor),
            created_at: now,
        })
        .await?;
    storage
        .catalog
        .set_path_courses(path_id, &[course_id])
        .await?;

    let contract = ContractDraft {
        title: "ABC Corp - Onboarding".into(),
        client_id: client,
        student_ids: student_ids.clone(),
        learning_path_ids: vec![path_id],
        starts_at: now - Duration::days(1),
        ends_at: now + Duration::days(90),
    }
    .validate(now)?;
    let contract_id = storage.contracts.insert_contract(contract).await?;

    println!(
        "Seeded course {} ({} lessons), path {}, contract {} and {} students into {}",
        course_id,
        storage.catalog.count_lessons(course_id).await?,
        path_id,
        contract_id,
        student_ids.len(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
