use academy_core::model::{
    Answer, AnswerId, Course, CourseId, LearningPath, LearningPathId, Lesson, LessonId, Question,
    QuestionId, UserId, ValidatedCourse, ValidatedLesson, ValidatedQuestion,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    db, get_id, get_opt_id, id_i64, lesson_content_columns, map_course_row, map_lesson_row, ser,
};
use crate::repository::{
    CatalogRepository, NewLearningPathRecord, StorageError, reordered_lesson_ids,
};

const COURSE_COLUMNS: &str = "id, title, slug, description, instructor_id, category, status, cover_image_url, created_at";

impl SqliteRepository {
    async fn path_course_ids(&self, path: LearningPathId) -> Result<Vec<CourseId>, StorageError> {
        let rows = sqlx::query(
            "SELECT course_id FROM learning_path_modules WHERE path_id = ?1 ORDER BY position",
        )
        .bind(id_i64("path_id", path.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter()
            .map(|row| get_id(row, "course_id", CourseId::new))
            .collect()
    }

    async fn hydrate_path(&self, row: &SqliteRow) -> Result<LearningPath, StorageError> {
        let id = get_id(row, "id", LearningPathId::new)?;
        let path = LearningPath::new(
            id,
            row.try_get::<String, _>("title").map_err(ser)?,
            row.try_get::<String, _>("description").map_err(ser)?,
            get_opt_id(row, "supervisor_id", UserId::new)?,
            row.try_get("created_at").map_err(ser)?,
        )
        .map_err(ser)?;
        Ok(path.with_courses(self.path_course_ids(id).await?))
    }

    async fn select_courses(
        &self,
        instructor: Option<UserId>,
    ) -> Result<Vec<Course>, StorageError> {
        let rows = match instructor {
            Some(id) => {
                sqlx::query(&format!(
                    "SELECT {COURSE_COLUMNS} FROM courses WHERE instructor_id = ?1 ORDER BY id"
                ))
                .bind(id_i64("instructor_id", id.value())?)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY id"))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(db)?;

        rows.iter().map(map_course_row).collect()
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn insert_course(&self, course: ValidatedCourse) -> Result<CourseId, StorageError> {
        let instructor = course
            .instructor_id
            .map(|id| id_i64("instructor_id", id.value()))
            .transpose()?;

        let row = sqlx::query(
            r"
            INSERT INTO courses (title, slug, description, instructor_id, category, status, cover_image_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING id
            ",
        )
        .bind(course.title)
        .bind(course.slug)
        .bind(course.description)
        .bind(instructor)
        .bind(course.category)
        .bind(course.status.as_str())
        .bind(course.cover_image_url)
        .bind(course.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        get_id(&row, "id", CourseId::new)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"))
            .bind(id_i64("course_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;

        row.as_ref().map(map_course_row).transpose()
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        self.select_courses(None).await
    }

    async fn courses_by_instructor(&self, instructor: UserId) -> Result<Vec<Course>, StorageError> {
        self.select_courses(Some(instructor)).await
    }

    async fn append_lesson(&self, lesson: ValidatedLesson) -> Result<Lesson, StorageError> {
        let course_id = id_i64("course_id", lesson.course_id.value())?;
        let (kind, url, body) = lesson_content_columns(&lesson.content);

        // Position is derived inside the insert so concurrent appends cannot
        // read the same maximum.
        let row = sqlx::query(
            r"
            INSERT INTO lessons (course_id, title, position, kind, content_url, text_body, is_previewable)
            SELECT ?1, ?2, COALESCE(MAX(position), 0) + 1, ?3, ?4, ?5, ?6
            FROM lessons WHERE course_id = ?1
            RETURNING id, position
            ",
        )
        .bind(course_id)
        .bind(&lesson.title)
        .bind(kind)
        .bind(url)
        .bind(body)
        .bind(i64::from(lesson.is_previewable))
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        let id = get_id(&row, "id", LessonId::new)?;
        let position: i64 = row.try_get("position").map_err(ser)?;
        let order = u32::try_from(position)
            .map_err(|_| StorageError::Serialization(format!("invalid position: {position}")))?;
        Ok(lesson.assign(id, order))
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, course_id, title, position, kind, content_url, text_body, is_previewable
            FROM lessons WHERE id = ?1
            ",
        )
        .bind(id_i64("lesson_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        row.as_ref().map(map_lesson_row).transpose()
    }

    async fn lessons_for_course(&self, course: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, title, position, kind, content_url, text_body, is_previewable
            FROM lessons WHERE course_id = ?1
            ORDER BY position, id
            ",
        )
        .bind(id_i64("course_id", course.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(map_lesson_row).collect()
    }

    async fn count_lessons(&self, course: CourseId) -> Result<usize, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM lessons WHERE course_id = ?1")
            .bind(id_i64("course_id", course.value())?)
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;

        usize::try_from(count).map_err(ser)
    }

    async fn reorder_lessons(
        &self,
        course: CourseId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<Lesson>, StorageError> {
        let course_id = id_i64("course_id", course.value())?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        let rows = sqlx::query("SELECT id FROM lessons WHERE course_id = ?1 ORDER BY position, id")
            .bind(course_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(db)?;
        let current = rows
            .iter()
            .map(|row| get_id(row, "id", LessonId::new))
            .collect::<Result<Vec<_>, _>>()?;

        for (position, id) in (1_i64..).zip(reordered_lesson_ids(&current, lesson_ids)) {
            sqlx::query("UPDATE lessons SET position = ?1 WHERE id = ?2 AND course_id = ?3")
                .bind(position)
                .bind(id_i64("lesson_id", id.value())?)
                .bind(course_id)
                .execute(&mut *tx)
                .await
                .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        self.lessons_for_course(course).await
    }

    async fn insert_question(
        &self,
        lesson: LessonId,
        question: ValidatedQuestion,
    ) -> Result<Question, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let row = sqlx::query("INSERT INTO questions (lesson_id, text) VALUES (?1, ?2) RETURNING id")
            .bind(id_i64("lesson_id", lesson.value())?)
            .bind(&question.text)
            .fetch_one(&mut *tx)
            .await
            .map_err(db)?;
        let id = get_id(&row, "id", QuestionId::new)?;

        let mut answers = Vec::with_capacity(question.answers.len());
        for answer in question.answers {
            let row = sqlx::query(
                "INSERT INTO answers (question_id, text, is_correct) VALUES (?1, ?2, ?3) RETURNING id",
            )
            .bind(id_i64("question_id", id.value())?)
            .bind(&answer.text)
            .bind(i64::from(answer.is_correct))
            .fetch_one(&mut *tx)
            .await
            .map_err(db)?;
            answers.push(Answer {
                id: get_id(&row, "id", AnswerId::new)?,
                text: answer.text,
                is_correct: answer.is_correct,
            });
        }

        tx.commit().await.map_err(db)?;
        Ok(Question {
            id,
            lesson_id: lesson,
            text: question.text,
            answers,
        })
    }

    async fn questions_for_lesson(&self, lesson: LessonId) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT q.id AS question_id, q.text AS question_text,
                   a.id AS answer_id, a.text AS answer_text, a.is_correct
            FROM questions q
            LEFT JOIN answers a ON a.question_id = q.id
            WHERE q.lesson_id = ?1
            ORDER BY q.id, a.id
            ",
        )
        .bind(id_i64("lesson_id", lesson.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let mut questions: Vec<Question> = Vec::new();
        for row in &rows {
            let question_id = get_id(row, "question_id", QuestionId::new)?;
            if questions.last().is_none_or(|q| q.id != question_id) {
                questions.push(Question {
                    id: question_id,
                    lesson_id: lesson,
                    text: row.try_get("question_text").map_err(ser)?,
                    answers: Vec::new(),
                });
            }
            let Some(answer_id) = get_opt_id(row, "answer_id", AnswerId::new)? else {
                continue;
            };
            let answer = Answer {
                id: answer_id,
                text: row.try_get("answer_text").map_err(ser)?,
                is_correct: row.try_get::<i64, _>("is_correct").map_err(ser)? != 0,
            };
            if let Some(current) = questions.last_mut() {
                current.answers.push(answer);
            }
        }
        Ok(questions)
    }

    async fn insert_learning_path(
        &self,
        path: NewLearningPathRecord,
    ) -> Result<LearningPathId, StorageError> {
        let supervisor = path
            .supervisor_id
            .map(|id| id_i64("supervisor_id", id.value()))
            .transpose()?;

        let row = sqlx::query(
            r"
            INSERT INTO learning_paths (title, description, supervisor_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            ",
        )
        .bind(path.title.trim())
        .bind(path.description.trim())
        .bind(supervisor)
        .bind(path.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        get_id(&row, "id", LearningPathId::new)
    }

    async fn get_learning_path(
        &self,
        id: LearningPathId,
    ) -> Result<Option<LearningPath>, StorageError> {
        let row = sqlx::query(
            "SELECT id, title, description, supervisor_id, created_at FROM learning_paths WHERE id = ?1",
        )
        .bind(id_i64("path_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        match row {
            Some(row) => Ok(Some(self.hydrate_path(&row).await?)),
            None => Ok(None),
        }
    }

    async fn paths_by_supervisor(
        &self,
        supervisor: UserId,
    ) -> Result<Vec<LearningPath>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, supervisor_id, created_at
            FROM learning_paths WHERE supervisor_id = ?1
            ORDER BY id
            ",
        )
        .bind(id_i64("supervisor_id", supervisor.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let mut paths = Vec::with_capacity(rows.len());
        for row in &rows {
            paths.push(self.hydrate_path(row).await?);
        }
        Ok(paths)
    }

    async fn set_path_courses(
        &self,
        path: LearningPathId,
        courses: &[CourseId],
    ) -> Result<(), StorageError> {
        let path_id = id_i64("path_id", path.value())?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        let exists = sqlx::query("SELECT 1 FROM learning_paths WHERE id = ?1")
            .bind(path_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        sqlx::query("DELETE FROM learning_path_modules WHERE path_id = ?1")
            .bind(path_id)
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        for (position, course) in (1_i64..).zip(courses) {
            sqlx::query(
                "INSERT INTO learning_path_modules (path_id, course_id, position) VALUES (?1, ?2, ?3)",
            )
            .bind(path_id)
            .bind(id_i64("course_id", course.value())?)
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        Ok(())
    }
}
