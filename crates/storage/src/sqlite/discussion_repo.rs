use academy_core::model::{
    DiscussionPost, DiscussionThread, LessonId, PostId, ThreadDraft, ThreadId, UserId,
};
use chrono::{DateTime, Utc};

use super::SqliteRepository;
use super::mapping::{db, get_id, id_i64, map_post_row, map_thread_row};
use crate::repository::{DiscussionRepository, StorageError};

#[async_trait::async_trait]
impl DiscussionRepository for SqliteRepository {
    async fn insert_thread(
        &self,
        thread: ThreadDraft,
        created_at: DateTime<Utc>,
    ) -> Result<DiscussionThread, StorageError> {
        let row = sqlx::query(
            r"
            INSERT INTO discussion_threads (course_id, lesson_id, author_id, title, question, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id
            ",
        )
        .bind(id_i64("course_id", thread.course_id.value())?)
        .bind(id_i64("lesson_id", thread.lesson_id.value())?)
        .bind(id_i64("author_id", thread.author_id.value())?)
        .bind(&thread.title)
        .bind(&thread.question)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        Ok(thread.assign(get_id(&row, "id", ThreadId::new)?, created_at))
    }

    async fn get_thread(&self, id: ThreadId) -> Result<Option<DiscussionThread>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, course_id, lesson_id, author_id, title, question, created_at
            FROM discussion_threads WHERE id = ?1
            ",
        )
        .bind(id_i64("thread_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        row.as_ref().map(map_thread_row).transpose()
    }

    async fn threads_for_lesson(
        &self,
        lesson: LessonId,
    ) -> Result<Vec<DiscussionThread>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, lesson_id, author_id, title, question, created_at
            FROM discussion_threads WHERE lesson_id = ?1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(id_i64("lesson_id", lesson.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(map_thread_row).collect()
    }

    async fn insert_post(
        &self,
        thread: ThreadId,
        author: UserId,
        body: String,
        created_at: DateTime<Utc>,
    ) -> Result<DiscussionPost, StorageError> {
        let row = sqlx::query(
            r"
            INSERT INTO discussion_posts (thread_id, author_id, body, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            ",
        )
        .bind(id_i64("thread_id", thread.value())?)
        .bind(id_i64("author_id", author.value())?)
        .bind(&body)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        Ok(DiscussionPost {
            id: get_id(&row, "id", PostId::new)?,
            thread_id: thread,
            author_id: author,
            body,
            created_at,
        })
    }

    async fn posts_for_thread(
        &self,
        thread: ThreadId,
    ) -> Result<Vec<DiscussionPost>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, thread_id, author_id, body, created_at
            FROM discussion_posts WHERE thread_id = ?1
            ORDER BY created_at, id
            ",
        )
        .bind(id_i64("thread_id", thread.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(map_post_row).collect()
    }

    async fn get_post(&self, id: PostId) -> Result<Option<DiscussionPost>, StorageError> {
        let row = sqlx::query(
            "SELECT id, thread_id, author_id, body, created_at FROM discussion_posts WHERE id = ?1",
        )
        .bind(id_i64("post_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        row.as_ref().map(map_post_row).transpose()
    }
}
