use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::SqliteInitError;

/// Statements of schema version 1, applied in order inside one transaction.
const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL,
            role TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL,
            instructor_id INTEGER,
            category TEXT NOT NULL,
            status TEXT NOT NULL,
            cover_image_url TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (instructor_id) REFERENCES users(id) ON DELETE SET NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lessons (
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 1),
            kind TEXT NOT NULL,
            content_url TEXT,
            text_body TEXT,
            is_previewable INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY,
            lesson_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS answers (
            id INTEGER PRIMARY KEY,
            question_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            is_correct INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS learning_paths (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            supervisor_id INTEGER,
            created_at TEXT NOT NULL,
            FOREIGN KEY (supervisor_id) REFERENCES users(id) ON DELETE SET NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS learning_path_modules (
            path_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (path_id, position),
            FOREIGN KEY (path_id) REFERENCES learning_paths(id) ON DELETE CASCADE,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS enrollments (
            id INTEGER PRIMARY KEY,
            subject_id INTEGER NOT NULL,
            target_kind TEXT NOT NULL,
            target_id INTEGER NOT NULL,
            enrolled_at TEXT NOT NULL,
            status TEXT NOT NULL,
            progress_bp INTEGER NOT NULL DEFAULT 0 CHECK (progress_bp BETWEEN 0 AND 10000),
            last_accessed_lesson_id INTEGER,
            UNIQUE (subject_id, target_kind, target_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS enrollment_completed_lessons (
            enrollment_id INTEGER NOT NULL,
            lesson_id INTEGER NOT NULL,
            completed_at TEXT NOT NULL,
            PRIMARY KEY (enrollment_id, lesson_id),
            FOREIGN KEY (enrollment_id) REFERENCES enrollments(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS quiz_attempts (
            seq INTEGER PRIMARY KEY,
            enrollment_id INTEGER NOT NULL,
            attempt_id TEXT NOT NULL UNIQUE,
            lesson_id INTEGER NOT NULL,
            score_bp INTEGER NOT NULL CHECK (score_bp BETWEEN 0 AND 10000),
            submitted_at TEXT NOT NULL,
            answers TEXT NOT NULL,
            FOREIGN KEY (enrollment_id) REFERENCES enrollments(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS contracts (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            client_id INTEGER NOT NULL,
            starts_at TEXT NOT NULL,
            ends_at TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            FOREIGN KEY (client_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS contract_students (
            contract_id INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            PRIMARY KEY (contract_id, student_id),
            FOREIGN KEY (contract_id) REFERENCES contracts(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS contract_learning_paths (
            contract_id INTEGER NOT NULL,
            path_id INTEGER NOT NULL,
            PRIMARY KEY (contract_id, path_id),
            FOREIGN KEY (contract_id) REFERENCES contracts(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS discussion_threads (
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            lesson_id INTEGER NOT NULL,
            author_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            question TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS discussion_posts (
            id INTEGER PRIMARY KEY,
            thread_id INTEGER NOT NULL,
            author_id INTEGER NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (thread_id) REFERENCES discussion_threads(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_lessons_course_position
            ON lessons (course_id, position);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_questions_lesson
            ON questions (lesson_id, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_enrollments_target
            ON enrollments (target_kind, target_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_quiz_attempts_enrollment
            ON quiz_attempts (enrollment_id, seq);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_threads_lesson_created
            ON discussion_threads (lesson_id, created_at);
    ",
];

/// Runs the consolidated migration for the current schema.
///
/// Applied versions are recorded in `schema_migrations`, so running this
/// against an up-to-date database is a no-op.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if is_applied(pool, 1).await? {
        debug!(version = 1, "schema already up to date");
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for statement in SCHEMA_V1 {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(1_i64)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(version = 1, "applied schema migration");

    Ok(())
}
