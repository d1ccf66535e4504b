use std::fmt;
use std::str::FromStr;

use academy_core::model::{
    AttemptId, ContractId, CourseId, EnrollableTarget, EnrollmentId, LearningPathId, LessonId,
    SubmittedAnswers, UserId,
};
use services::{AppConfig, AppServices, Clock, Dashboard};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { command: &'static str, flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidValue { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    ConflictingTargets,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { command, flag } => write!(f, "{command} requires {flag}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::ConflictingTargets => write!(f, "pass either --course or --path, not both"),
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

fn parse_value<T: FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidValue { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  academy migrate   [--db <sqlite_url>]");
    eprintln!("  academy enroll    --subject <id> (--course <id> | --path <id>)");
    eprintln!("  academy open      --subject <id> --course <id> [--order <n>]");
    eprintln!("  academy complete  --enrollment <id> --lesson <id>");
    eprintln!("  academy quiz      --enrollment <id> --lesson <id> [--answer <n>=<answer_id>]...");
    eprintln!("  academy attempt   --enrollment <id> --attempt <uuid>");
    eprintln!("  academy provision --contract <id>");
    eprintln!("  academy report    --user <viewer_id> --contract <id>");
    eprintln!("  academy roster    --user <viewer_id> --course <id> [--subject <student_id>]");
    eprintln!("  academy dashboard --user <id>");
    eprintln!();
    eprintln!("Every subcommand accepts --db <sqlite_url> (default: sqlite:academy.sqlite3).");
    eprintln!("`quiz` without --answer lists the questions and their answer ids.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ACADEMY_DB_URL, ACADEMY_LOG, ACADEMY_ENROLLMENT_WEBHOOK_URL,");
    eprintln!("  ACADEMY_QUESTION_WEBHOOK_URL, ACADEMY_WEBHOOK_TIMEOUT_SECS");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Migrate,
    Enroll,
    Open,
    Complete,
    Quiz,
    Attempt,
    Provision,
    Report,
    Roster,
    Dashboard,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "migrate" => Some(Self::Migrate),
            "enroll" => Some(Self::Enroll),
            "open" => Some(Self::Open),
            "complete" => Some(Self::Complete),
            "quiz" => Some(Self::Quiz),
            "attempt" => Some(Self::Attempt),
            "provision" => Some(Self::Provision),
            "report" => Some(Self::Report),
            "roster" => Some(Self::Roster),
            "dashboard" => Some(Self::Dashboard),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Migrate => "migrate",
            Self::Enroll => "enroll",
            Self::Open => "open",
            Self::Complete => "complete",
            Self::Quiz => "quiz",
            Self::Attempt => "attempt",
            Self::Provision => "provision",
            Self::Report => "report",
            Self::Roster => "roster",
            Self::Dashboard => "dashboard",
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    db_url: Option<String>,
    subject: Option<UserId>,
    user: Option<UserId>,
    course: Option<CourseId>,
    path: Option<LearningPathId>,
    order: Option<u32>,
    enrollment: Option<EnrollmentId>,
    lesson: Option<LessonId>,
    attempt: Option<AttemptId>,
    contract: Option<ContractId>,
    answers: SubmittedAnswers,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut out = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    out.db_url = Some(value);
                }
                "--subject" => out.subject = Some(parse_value(args, "--subject")?),
                "--user" => out.user = Some(parse_value(args, "--user")?),
                "--course" => out.course = Some(parse_value(args, "--course")?),
                "--path" => out.path = Some(parse_value(args, "--path")?),
                "--order" => out.order = Some(parse_value(args, "--order")?),
                "--enrollment" => out.enrollment = Some(parse_value(args, "--enrollment")?),
                "--lesson" => out.lesson = Some(parse_value(args, "--lesson")?),
                "--attempt" => out.attempt = Some(parse_value(args, "--attempt")?),
                "--contract" => out.contract = Some(parse_value(args, "--contract")?),
                "--answer" => {
                    let raw = require_value(args, "--answer")?;
                    let (position, choice) = parse_answer(&raw).ok_or(ArgsError::InvalidValue {
                        flag: "--answer",
                        raw: raw.clone(),
                    })?;
                    out.answers.insert(SubmittedAnswers::key_for(position), choice);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(out)
    }

    fn target(&self, command: Command) -> Result<EnrollableTarget, ArgsError> {
        match (self.course, self.path) {
            (Some(course), None) => Ok(course.into()),
            (None, Some(path)) => Ok(path.into()),
            (Some(_), Some(_)) => Err(ArgsError::ConflictingTargets),
            (None, None) => Err(ArgsError::MissingFlag {
                command: command.name(),
                flag: "--course or --path",
            }),
        }
    }
}

fn need<T>(value: Option<T>, command: Command, flag: &'static str) -> Result<T, ArgsError> {
    value.ok_or(ArgsError::MissingFlag {
        command: command.name(),
        flag,
    })
}

/// `3=17` answers the third question with answer id 17.
fn parse_answer(raw: &str) -> Option<(usize, String)> {
    let (position, choice) = raw.split_once('=')?;
    let position: usize = position.trim().parse().ok()?;
    let choice = choice.trim();
    if position == 0 || choice.is_empty() {
        return None;
    }
    Some((position - 1, choice.to_owned()))
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ACADEMY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            print_usage();
            ArgsError::UnknownCommand(first.clone())
        })?,
    };

    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut config = AppConfig::from_env();
    if let Some(db_url) = args.db_url.clone() {
        config.db_url = db_url;
    }
    let db_url = normalize_sqlite_url(config.db_url);
    prepare_sqlite_file(&db_url)?;
    debug!(%db_url, command = cmd.name(), "starting");

    let app = AppServices::new_sqlite(&db_url, Clock::default(), config.webhooks).await?;
    dispatch(cmd, &args, &app).await
}

async fn dispatch(
    cmd: Command,
    args: &Args,
    app: &AppServices,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Command::Migrate => {
            println!("database ready");
        }
        Command::Enroll => {
            let subject = need(args.subject, cmd, "--subject")?;
            let target = args.target(cmd)?;
            let (enrollment, created) = app.enrollments().get_or_create(subject, target).await?;
            println!(
                "enrollment {} ({}) {} {}% [{}]",
                enrollment.id(),
                target,
                if created { "created" } else { "existing" },
                enrollment.progress(),
                enrollment.status().label()
            );
        }
        Command::Open => {
            let subject = need(args.subject, cmd, "--subject")?;
            let course = need(args.course, cmd, "--course")?;
            let view = app
                .navigator()
                .open_lesson(subject, course, args.order)
                .await?;
            println!(
                "lesson {} \"{}\" ({} of {}, {})",
                view.lesson.id(),
                view.lesson.title(),
                view.lesson.order(),
                view.lesson_count,
                view.lesson.kind().as_str()
            );
            println!(
                "enrollment {} progress {}%{}",
                view.enrollment.id(),
                view.progress,
                if view.is_completed { " (lesson done)" } else { "" }
            );
            if let Some(previous) = view.previous_order {
                println!("previous: --order {previous}");
            }
            if let Some(next) = view.next_order {
                println!("next: --order {next}");
            }
        }
        Command::Complete => {
            let enrollment = need(args.enrollment, cmd, "--enrollment")?;
            let lesson = need(args.lesson, cmd, "--lesson")?;
            let updated = app
                .progress()
                .mark_lesson_complete(enrollment, lesson)
                .await?;
            println!(
                "enrollment {} progress {}% [{}]",
                updated.id(),
                updated.progress(),
                updated.status().label()
            );
        }
        Command::Quiz => {
            let enrollment = need(args.enrollment, cmd, "--enrollment")?;
            let lesson = need(args.lesson, cmd, "--lesson")?;
            let quizzes = app.quizzes();
            if args.answers.is_empty() {
                for (index, question) in quizzes.questions(lesson).await?.iter().enumerate() {
                    println!("{}. {}", index + 1, question.text);
                    for answer in &question.answers {
                        println!("   [{}] {}", answer.id, answer.text);
                    }
                }
                return Ok(());
            }
            let submission = quizzes
                .submit_quiz(enrollment, lesson, args.answers.clone())
                .await?;
            println!(
                "attempt {} scored {}% ({}/{})",
                submission.attempt.attempt_id(),
                submission.grade.score,
                submission.grade.correct,
                submission.grade.total
            );
        }
        Command::Attempt => {
            let enrollment = need(args.enrollment, cmd, "--enrollment")?;
            let attempt = need(args.attempt, cmd, "--attempt")?;
            let review = app.quizzes().attempt_review(enrollment, attempt).await?;
            println!(
                "{} on \"{}\" at {}: {}%",
                review.attempt.attempt_id(),
                review.lesson.title(),
                review.attempt.submitted_at().to_rfc3339(),
                review.attempt.score()
            );
            for result in &review.grade.questions {
                println!(
                    "  {}. {} (answered {})",
                    result.position,
                    if result.is_correct { "correct" } else { "wrong" },
                    result.submitted.as_deref().unwrap_or("nothing")
                );
            }
        }
        Command::Provision => {
            let contract = need(args.contract, cmd, "--contract")?;
            let summary = app.contracts().provision(contract).await?;
            println!(
                "contract {contract}: {} enrollments created, {} already present",
                summary.created, summary.existing
            );
        }
        Command::Report => {
            let viewer = need(args.user, cmd, "--user")?;
            let contract = need(args.contract, cmd, "--contract")?;
            let report = app.contracts().progress_report(viewer, contract).await?;
            println!("{}", report.contract.title());
            for row in &report.rows {
                println!(
                    "  {:<24} {:<32} {:>6}%  {}",
                    row.name, row.email, row.progress, row.status
                );
            }
        }
        Command::Roster => {
            let viewer = need(args.user, cmd, "--user")?;
            let course = need(args.course, cmd, "--course")?;
            let reports = app.reports();
            if let Some(student) = args.subject {
                let report = reports.student_course_report(viewer, student, course).await?;
                println!(
                    "{} in \"{}\" since {}: {}% [{}]",
                    report.student_name,
                    report.course_title,
                    report.enrolled_at.format("%Y-%m-%d"),
                    report.progress,
                    report.status
                );
                return Ok(());
            }
            let roster = reports.course_roster(viewer, course).await?;
            println!("{}", roster.course.title());
            for row in &roster.rows {
                println!(
                    "  {:<24} {:<32} {}  {:>6}%  {}",
                    row.name,
                    row.email,
                    row.enrolled_at.format("%Y-%m-%d"),
                    row.progress,
                    row.status
                );
            }
        }
        Command::Dashboard => {
            let user_id = need(args.user, cmd, "--user")?;
            let user = app.users().get(user_id).await?;
            print_dashboard(&app.dashboards().dashboard_for(&user).await?);
        }
    }
    Ok(())
}

fn print_dashboard(dashboard: &Dashboard) {
    match dashboard {
        Dashboard::Student(entries) => {
            for entry in entries {
                println!(
                    "{} {} \"{}\" {}% [{}]",
                    entry.enrollment_id,
                    entry.target.kind(),
                    entry.title,
                    entry.progress,
                    entry.status.label()
                );
            }
        }
        Dashboard::Instructor(courses) => {
            for course in courses {
                println!(
                    "{} \"{}\" {} enrolled, average {}%",
                    course.course_id, course.title, course.enrollments, course.average_progress
                );
            }
        }
        Dashboard::ThirdParty(contracts) => {
            for contract in contracts {
                println!(
                    "{} \"{}\" {} students, {} paths{}",
                    contract.contract_id,
                    contract.title,
                    contract.students,
                    contract.learning_paths,
                    if contract.in_effect { "" } else { " (not in effect)" }
                );
            }
        }
        Dashboard::Supervisor(paths) => {
            for path in paths {
                println!("{} \"{}\" {} courses", path.path_id, path.title, path.courses);
            }
        }
        Dashboard::Admin(totals) => {
            println!(
                "{} students, {} instructors, {} courses, {} enrollments",
                totals.students, totals.instructors, totals.courses, totals.enrollments
            );
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = raw.iter().map(|s| (*s).to_owned());
        Args::parse(&mut iter)
    }

    #[test]
    fn answers_use_one_based_positions() {
        let args = parse(&["--answer", "1=17", "--answer", "3= 9 "]).unwrap();
        assert_eq!(args.answers.get("question_1"), Some("17"));
        assert_eq!(args.answers.get("question_3"), Some("9"));
        assert!(matches!(
            parse(&["--answer", "0=1"]),
            Err(ArgsError::InvalidValue { flag: "--answer", .. })
        ));
    }

    #[test]
    fn target_needs_exactly_one_kind() {
        let args = parse(&["--subject", "1", "--course", "2"]).unwrap();
        assert_eq!(
            args.target(Command::Enroll).unwrap(),
            EnrollableTarget::Course(CourseId::new(2))
        );
        let both = parse(&["--course", "2", "--path", "3"]).unwrap();
        assert!(matches!(
            both.target(Command::Enroll),
            Err(ArgsError::ConflictingTargets)
        ));
        assert!(matches!(
            parse(&["--lesson", "abc"]),
            Err(ArgsError::InvalidValue { flag: "--lesson", .. })
        ));
    }

    #[test]
    fn command_names_round_trip() {
        for name in ["enroll", "complete", "quiz", "report", "roster", "dashboard"] {
            assert_eq!(Command::from_arg(name).map(Command::name), Some(name));
        }
        assert_eq!(Command::from_arg("grade"), None);
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:academy.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("academy.sqlite3"));
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".into()),
            "sqlite::memory:"
        );
    }
}
