use academy_core::model::{
    AttemptId, CourseId, CourseStatus, DiscussionPost, DiscussionThread, Lesson, LessonContent,
    LessonId, LessonKind, Percentage, PostId, QuizAttempt, Role, SubmittedAnswers, ThreadId, User,
    UserId, ValidatedCourse, Course,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver errors, surfacing constraint violations as domain errors.
pub(crate) fn db(e: sqlx::Error) -> StorageError {
    if let Some(dbe) = e.as_database_error() {
        if dbe.is_unique_violation() {
            return StorageError::Conflict;
        }
        if dbe.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

/// Reads an integer id column and wraps it in its newtype.
pub(crate) fn get_id<T>(
    row: &SqliteRow,
    column: &'static str,
    wrap: fn(u64) -> T,
) -> Result<T, StorageError> {
    let raw: i64 = row.try_get(column).map_err(ser)?;
    Ok(wrap(i64_to_u64(column, raw)?))
}

pub(crate) fn get_opt_id<T>(
    row: &SqliteRow,
    column: &'static str,
    wrap: fn(u64) -> T,
) -> Result<Option<T>, StorageError> {
    let raw: Option<i64> = row.try_get(column).map_err(ser)?;
    raw.map(|v| i64_to_u64(column, v).map(wrap)).transpose()
}

pub(crate) fn percentage_from_bp(column: &'static str, v: i64) -> Result<Percentage, StorageError> {
    u16::try_from(v)
        .ok()
        .and_then(Percentage::from_hundredths)
        .ok_or_else(|| StorageError::Serialization(format!("invalid {column}: {v}")))
}

pub(crate) fn percentage_to_bp(p: Percentage) -> i64 {
    i64::from(p.hundredths())
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    let role: String = row.try_get("role").map_err(ser)?;
    User::new(
        get_id(row, "id", UserId::new)?,
        row.try_get::<String, _>("username").map_err(ser)?,
        row.try_get::<String, _>("full_name").map_err(ser)?,
        row.try_get::<String, _>("email").map_err(ser)?,
        role.parse::<Role>().map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    let validated = ValidatedCourse {
        title: row.try_get("title").map_err(ser)?,
        slug: row.try_get("slug").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        instructor_id: get_opt_id(row, "instructor_id", UserId::new)?,
        category: row.try_get("category").map_err(ser)?,
        status: status.parse::<CourseStatus>().map_err(ser)?,
        cover_image_url: row.try_get("cover_image_url").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    };
    Ok(validated.assign_id(get_id(row, "id", CourseId::new)?))
}

/// Splits lesson content into `(kind, content_url, text_body)` columns.
pub(crate) fn lesson_content_columns(
    content: &LessonContent,
) -> (&'static str, Option<String>, Option<String>) {
    let kind = content.kind().as_str();
    match content {
        LessonContent::Video { url } | LessonContent::Pdf { url } => (kind, Some(url.clone()), None),
        LessonContent::Quiz => (kind, None, None),
        LessonContent::Text { body } => (kind, None, Some(body.clone())),
    }
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let kind: String = row.try_get("kind").map_err(ser)?;
    let url: Option<String> = row.try_get("content_url").map_err(ser)?;
    let body: Option<String> = row.try_get("text_body").map_err(ser)?;
    let missing_url = || StorageError::Serialization("missing content_url".into());
    let content = match kind.parse::<LessonKind>().map_err(ser)? {
        LessonKind::Video => LessonContent::Video {
            url: url.ok_or_else(missing_url)?,
        },
        LessonKind::Pdf => LessonContent::Pdf {
            url: url.ok_or_else(missing_url)?,
        },
        LessonKind::Quiz => LessonContent::Quiz,
        LessonKind::Text => LessonContent::Text {
            body: body.unwrap_or_default(),
        },
    };

    let position: i64 = row.try_get("position").map_err(ser)?;
    let order = u32::try_from(position)
        .map_err(|_| StorageError::Serialization(format!("invalid position: {position}")))?;

    Ok(Lesson::from_persisted(
        get_id(row, "id", LessonId::new)?,
        get_id(row, "course_id", CourseId::new)?,
        row.try_get("title").map_err(ser)?,
        order,
        content,
        row.try_get::<i64, _>("is_previewable").map_err(ser)? != 0,
    ))
}

pub(crate) fn map_attempt_row(row: &SqliteRow) -> Result<QuizAttempt, StorageError> {
    let attempt_id: String = row.try_get("attempt_id").map_err(ser)?;
    let answers: String = row.try_get("answers").map_err(ser)?;
    let answers: SubmittedAnswers = serde_json::from_str(&answers).map_err(ser)?;
    Ok(QuizAttempt::new(
        attempt_id.parse::<AttemptId>().map_err(ser)?,
        get_id(row, "lesson_id", LessonId::new)?,
        percentage_from_bp("score_bp", row.try_get("score_bp").map_err(ser)?)?,
        row.try_get("submitted_at").map_err(ser)?,
        answers,
    ))
}

pub(crate) fn map_thread_row(row: &SqliteRow) -> Result<DiscussionThread, StorageError> {
    Ok(DiscussionThread {
        id: get_id(row, "id", ThreadId::new)?,
        course_id: get_id(row, "course_id", CourseId::new)?,
        lesson_id: get_id(row, "lesson_id", LessonId::new)?,
        author_id: get_id(row, "author_id", UserId::new)?,
        title: row.try_get("title").map_err(ser)?,
        question: row.try_get("question").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_post_row(row: &SqliteRow) -> Result<DiscussionPost, StorageError> {
    Ok(DiscussionPost {
        id: get_id(row, "id", PostId::new)?,
        thread_id: get_id(row, "thread_id", ThreadId::new)?,
        author_id: get_id(row, "author_id", UserId::new)?,
        body: row.try_get("body").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}
