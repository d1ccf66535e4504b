use std::collections::BTreeSet;

use academy_core::model::{
    AttemptId, CourseId, EnrollableTarget, Enrollment, EnrollmentId, EnrollmentStatus, LessonId,
    QuizAttempt, SubjectId, TargetKind, UserId,
};
use academy_core::progress::ProgressUpdate;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tracing::debug;

use super::SqliteRepository;
use super::mapping::{
    db, get_id, get_opt_id, id_i64, map_attempt_row, percentage_from_bp, percentage_to_bp, ser,
};
use crate::repository::{EnrollmentRepository, ProgressRecount, StorageError};

/// Optimistic recounts retried before giving up with `Conflict`.
const RECOUNT_RETRIES: u32 = 16;

const ENROLLMENT_COLUMNS: &str = "id, subject_id, target_kind, target_id, enrolled_at, status, progress_bp, last_accessed_lesson_id";

fn target_columns(target: EnrollableTarget) -> Result<(&'static str, i64), StorageError> {
    Ok((target.kind().as_str(), id_i64("target_id", target.raw_id())?))
}

impl SqliteRepository {
    /// Rebuilds an enrollment from its row plus completed lessons and attempts.
    async fn hydrate_enrollment(&self, row: &SqliteRow) -> Result<Enrollment, StorageError> {
        let id = get_id(row, "id", EnrollmentId::new)?;
        let id_raw = id_i64("enrollment_id", id.value())?;

        let kind: String = row.try_get("target_kind").map_err(ser)?;
        let target_id: i64 = row.try_get("target_id").map_err(ser)?;
        let target = EnrollableTarget::from_parts(
            kind.parse::<TargetKind>().map_err(ser)?,
            u64::try_from(target_id).map_err(ser)?,
        );
        let status: String = row.try_get("status").map_err(ser)?;

        let completed_rows = sqlx::query(
            "SELECT lesson_id FROM enrollment_completed_lessons WHERE enrollment_id = ?1",
        )
        .bind(id_raw)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        let completed = completed_rows
            .iter()
            .map(|r| get_id(r, "lesson_id", LessonId::new))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let attempt_rows = sqlx::query(
            r"
            SELECT attempt_id, lesson_id, score_bp, submitted_at, answers
            FROM quiz_attempts WHERE enrollment_id = ?1
            ORDER BY seq
            ",
        )
        .bind(id_raw)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        let attempts = attempt_rows
            .iter()
            .map(map_attempt_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Enrollment::from_persisted(
            id,
            get_id(row, "subject_id", UserId::new)?,
            target,
            row.try_get("enrolled_at").map_err(ser)?,
            status.parse::<EnrollmentStatus>().map_err(ser)?,
            percentage_from_bp("progress_bp", row.try_get("progress_bp").map_err(ser)?)?,
            completed,
            get_opt_id(row, "last_accessed_lesson_id", LessonId::new)?,
            attempts,
        ))
    }

    async fn hydrate_all(&self, rows: &[SqliteRow]) -> Result<Vec<Enrollment>, StorageError> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate_enrollment(row).await?);
        }
        Ok(out)
    }

    async fn ensure_enrollment(&self, id: i64) -> Result<(), StorageError> {
        let found = sqlx::query("SELECT 1 FROM enrollments WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        found.map(|_| ()).ok_or(StorageError::NotFound)
    }
}

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn get_or_create(
        &self,
        subject: SubjectId,
        target: EnrollableTarget,
        enrolled_at: DateTime<Utc>,
    ) -> Result<(Enrollment, bool), StorageError> {
        let subject_id = id_i64("subject_id", subject.value())?;
        let (kind, target_id) = target_columns(target)?;

        // The unique key on (subject, kind, id) makes this race-free: exactly
        // one concurrent caller inserts, the others fall through to the read.
        let res = sqlx::query(
            r"
            INSERT INTO enrollments (subject_id, target_kind, target_id, enrolled_at, status, progress_bp)
            VALUES (?1, ?2, ?3, ?4, ?5, 0)
            ON CONFLICT(subject_id, target_kind, target_id) DO NOTHING
            ",
        )
        .bind(subject_id)
        .bind(kind)
        .bind(target_id)
        .bind(enrolled_at)
        .bind(EnrollmentStatus::InProgress.as_str())
        .execute(&self.pool)
        .await
        .map_err(db)?;
        let created = res.rows_affected() == 1;

        let enrollment = self
            .find_enrollment(subject, target)
            .await?
            .ok_or(StorageError::NotFound)?;
        Ok((enrollment, created))
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = ?1"
        ))
        .bind(id_i64("enrollment_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        match row {
            Some(row) => Ok(Some(self.hydrate_enrollment(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_enrollment(
        &self,
        subject: SubjectId,
        target: EnrollableTarget,
    ) -> Result<Option<Enrollment>, StorageError> {
        let (kind, target_id) = target_columns(target)?;
        let row = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE subject_id = ?1 AND target_kind = ?2 AND target_id = ?3"
        ))
        .bind(id_i64("subject_id", subject.value())?)
        .bind(kind)
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        match row {
            Some(row) => Ok(Some(self.hydrate_enrollment(&row).await?)),
            None => Ok(None),
        }
    }

    async fn enrollments_for_subject(
        &self,
        subject: SubjectId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE subject_id = ?1 ORDER BY id"
        ))
        .bind(id_i64("subject_id", subject.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        self.hydrate_all(&rows).await
    }

    async fn enrollments_for_target(
        &self,
        target: EnrollableTarget,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let (kind, target_id) = target_columns(target)?;
        let rows = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE target_kind = ?1 AND target_id = ?2 ORDER BY id"
        ))
        .bind(kind)
        .bind(target_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        self.hydrate_all(&rows).await
    }

    async fn count_enrollments(&self) -> Result<u64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM enrollments")
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        u64::try_from(count).map_err(ser)
    }

    async fn set_last_accessed(
        &self,
        id: EnrollmentId,
        lesson: LessonId,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE enrollments SET last_accessed_lesson_id = ?1 WHERE id = ?2")
            .bind(id_i64("lesson_id", lesson.value())?)
            .bind(id_i64("enrollment_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn add_completed_lesson(
        &self,
        id: EnrollmentId,
        lesson: LessonId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let enrollment_id = id_i64("enrollment_id", id.value())?;
        let lesson_id = id_i64("lesson_id", lesson.value())?;
        self.ensure_enrollment(enrollment_id).await?;

        let mut tx = self.pool.begin().await.map_err(db)?;
        let res = sqlx::query(
            r"
            INSERT OR IGNORE INTO enrollment_completed_lessons (enrollment_id, lesson_id, completed_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(enrollment_id)
        .bind(lesson_id)
        .bind(completed_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        sqlx::query("UPDATE enrollments SET last_accessed_lesson_id = ?1 WHERE id = ?2")
            .bind(lesson_id)
            .bind(enrollment_id)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        tx.commit().await.map_err(db)?;

        Ok(res.rows_affected() == 1)
    }

    async fn recount_progress(
        &self,
        id: EnrollmentId,
        course: CourseId,
    ) -> Result<ProgressRecount, StorageError> {
        let enrollment_id = id_i64("enrollment_id", id.value())?;
        let course_id = id_i64("course_id", course.value())?;

        for attempt in 1..=RECOUNT_RETRIES {
            let mut enrollment = self
                .get_enrollment(id)
                .await?
                .ok_or(StorageError::NotFound)?;
            if enrollment.target().as_course() != Some(course) {
                return Err(StorageError::Conflict);
            }

            let lesson_rows = sqlx::query("SELECT id FROM lessons WHERE course_id = ?1")
                .bind(course_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db)?;
            let lesson_ids = lesson_rows
                .iter()
                .map(|r| get_id(r, "id", LessonId::new))
                .collect::<Result<Vec<_>, _>>()?;

            let seen_completed =
                i64::try_from(enrollment.completed_lesson_ids().len()).map_err(ser)?;
            let seen_lessons = i64::try_from(lesson_ids.len()).map_err(ser)?;
            let previous = enrollment.status();
            let update = enrollment
                .recompute_progress(lesson_ids)
                .ok_or(StorageError::Conflict)?;

            // Completed lessons and course lessons are insert-only, so equal
            // counts mean the recount above still holds.
            let res = sqlx::query(
                r"
                UPDATE enrollments SET progress_bp = ?1, status = ?2
                WHERE id = ?3
                  AND status = ?4
                  AND (SELECT COUNT(*) FROM enrollment_completed_lessons WHERE enrollment_id = ?3) = ?5
                  AND (SELECT COUNT(*) FROM lessons WHERE course_id = ?6) = ?7
                ",
            )
            .bind(percentage_to_bp(update.progress))
            .bind(update.status.as_str())
            .bind(enrollment_id)
            .bind(previous.as_str())
            .bind(seen_completed)
            .bind(course_id)
            .bind(seen_lessons)
            .execute(&self.pool)
            .await
            .map_err(db)?;

            if res.rows_affected() == 1 {
                return Ok(ProgressRecount { previous, update });
            }
            debug!(%id, attempt, "progress recount raced a concurrent write, retrying");
        }
        Err(StorageError::Conflict)
    }

    async fn update_progress(
        &self,
        id: EnrollmentId,
        update: ProgressUpdate,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE enrollments
            SET progress_bp = CASE WHEN status = ?4 AND ?2 <> ?4 THEN progress_bp ELSE ?1 END,
                status = CASE WHEN status = ?4 THEN status ELSE ?2 END
            WHERE id = ?3
            ",
        )
        .bind(percentage_to_bp(update.progress))
        .bind(update.status.as_str())
        .bind(id_i64("enrollment_id", id.value())?)
        .bind(EnrollmentStatus::Completed.as_str())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn append_quiz_attempt(
        &self,
        id: EnrollmentId,
        attempt: &QuizAttempt,
    ) -> Result<(), StorageError> {
        let answers = serde_json::to_string(attempt.answers()).map_err(ser)?;
        sqlx::query(
            r"
            INSERT INTO quiz_attempts (enrollment_id, attempt_id, lesson_id, score_bp, submitted_at, answers)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id_i64("enrollment_id", id.value())?)
        .bind(attempt.attempt_id().to_string())
        .bind(id_i64("lesson_id", attempt.lesson_id().value())?)
        .bind(percentage_to_bp(attempt.score()))
        .bind(attempt.submitted_at())
        .bind(answers)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(())
    }

    async fn get_quiz_attempt(
        &self,
        id: EnrollmentId,
        attempt: AttemptId,
    ) -> Result<Option<QuizAttempt>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT attempt_id, lesson_id, score_bp, submitted_at, answers
            FROM quiz_attempts WHERE enrollment_id = ?1 AND attempt_id = ?2
            ",
        )
        .bind(id_i64("enrollment_id", id.value())?)
        .bind(attempt.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        row.as_ref().map(map_attempt_row).transpose()
    }
}
