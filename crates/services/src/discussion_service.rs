use std::sync::Arc;

use academy_core::model::{
    DiscussionPost, DiscussionThread, LessonId, ThreadDraft, ThreadId, UserId, validate_reply,
};
use storage::repository::{CatalogRepository, DiscussionRepository, StorageError, UserRepository};
use tracing::info;

use crate::Clock;
use crate::error::{DiscussionServiceError, Entity};
use crate::notifier::WebhookNotifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadWithPosts {
    pub thread: DiscussionThread,
    pub posts: Vec<DiscussionPost>,
}

/// Lesson Q&A threads.
#[derive(Clone)]
pub struct DiscussionService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    catalog: Arc<dyn CatalogRepository>,
    discussions: Arc<dyn DiscussionRepository>,
    notifier: WebhookNotifier,
}

impl DiscussionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        catalog: Arc<dyn CatalogRepository>,
        discussions: Arc<dyn DiscussionRepository>,
        notifier: WebhookNotifier,
    ) -> Self {
        Self {
            clock,
            users,
            catalog,
            discussions,
            notifier,
        }
    }

    /// Open a question thread on a lesson and notify the question webhook.
    ///
    /// # Errors
    ///
    /// Returns `DiscussionServiceError::Discussion` for blank titles or
    /// questions, `NotFound` for unknown authors or lessons and
    /// `LessonNotInCourse` when the lesson belongs to another course.
    pub async fn open_thread(
        &self,
        draft: ThreadDraft,
    ) -> Result<DiscussionThread, DiscussionServiceError> {
        let draft = draft.validate()?;
        let author = self
            .users
            .get_user(draft.author_id)
            .await?
            .ok_or_else(|| DiscussionServiceError::NotFound(Entity::User, draft.author_id.to_string()))?;
        let lesson = self
            .catalog
            .get_lesson(draft.lesson_id)
            .await?
            .ok_or_else(|| {
                DiscussionServiceError::NotFound(Entity::Lesson, draft.lesson_id.to_string())
            })?;
        if lesson.course_id() != draft.course_id {
            return Err(DiscussionServiceError::LessonNotInCourse {
                lesson_id: draft.lesson_id,
                course_id: draft.course_id,
            });
        }

        let thread = self
            .discussions
            .insert_thread(draft, self.clock.now())
            .await?;
        info!(
            thread_id = %thread.id,
            lesson_id = %thread.lesson_id,
            author_id = %thread.author_id,
            "discussion thread opened"
        );
        self.notifier.question_posted(&thread, author.display_name());
        Ok(thread)
    }

    /// # Errors
    ///
    /// Returns `DiscussionServiceError::NotFound` for unknown threads or authors
    /// and `Discussion` for blank replies.
    pub async fn reply(
        &self,
        thread_id: ThreadId,
        author_id: UserId,
        body: &str,
    ) -> Result<DiscussionPost, DiscussionServiceError> {
        let body = validate_reply(body)?;
        if self.users.get_user(author_id).await?.is_none() {
            return Err(DiscussionServiceError::NotFound(
                Entity::User,
                author_id.to_string(),
            ));
        }
        let post = self
            .discussions
            .insert_post(thread_id, author_id, body, self.clock.now())
            .await
            .map_err(|e| match e {
                StorageError::NotFound => {
                    DiscussionServiceError::NotFound(Entity::Thread, thread_id.to_string())
                }
                other => DiscussionServiceError::Storage(other),
            })?;
        info!(%thread_id, post_id = %post.id, "discussion reply posted");
        Ok(post)
    }

    /// # Errors
    ///
    /// Returns `DiscussionServiceError::NotFound` for unknown threads.
    pub async fn thread_with_posts(
        &self,
        thread_id: ThreadId,
    ) -> Result<ThreadWithPosts, DiscussionServiceError> {
        let thread = self
            .discussions
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| DiscussionServiceError::NotFound(Entity::Thread, thread_id.to_string()))?;
        let posts = self.discussions.posts_for_thread(thread_id).await?;
        Ok(ThreadWithPosts { thread, posts })
    }

    /// Threads on a lesson, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DiscussionServiceError::Storage` if repository access fails.
    pub async fn threads_for_lesson(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<DiscussionThread>, DiscussionServiceError> {
        Ok(self.discussions.threads_for_lesson(lesson_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use academy_core::model::{CourseId, DiscussionError};

    fn draft(course_id: CourseId, lesson_id: LessonId, author_id: UserId) -> ThreadDraft {
        ThreadDraft {
            course_id,
            lesson_id,
            author_id,
            title: "  Borrow checker  ".into(),
            question: "Why does this not compile?".into(),
        }
    }

    #[tokio::test]
    async fn thread_collects_replies_in_order() {
        let fx = Fixture::new().await;
        let course = fx.course("Rust").await;
        let lessons = fx.lessons(course, 1).await;
        let service = fx.discussion_service();

        let thread = service
            .open_thread(draft(course, lessons[0], fx.student))
            .await
            .unwrap();
        assert_eq!(thread.title, "Borrow checker");

        service
            .reply(thread.id, fx.instructor, "Lifetimes!")
            .await
            .unwrap();
        service
            .reply(thread.id, fx.student, " Thanks ")
            .await
            .unwrap();

        let full = service.thread_with_posts(thread.id).await.unwrap();
        let bodies: Vec<&str> = full.posts.iter().map(|p| p.body.as_str()).collect();
        assert_eq!(bodies, vec!["Lifetimes!", "Thanks"]);

        let listed = service.threads_for_lesson(lessons[0]).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn rejects_mismatched_lessons_and_blank_text() {
        let fx = Fixture::new().await;
        let course = fx.course("Rust").await;
        let other = fx.course("Go").await;
        let lessons = fx.lessons(other, 1).await;
        let service = fx.discussion_service();

        assert!(matches!(
            service
                .open_thread(draft(course, lessons[0], fx.student))
                .await,
            Err(DiscussionServiceError::LessonNotInCourse { .. })
        ));

        let mut blank = draft(other, lessons[0], fx.student);
        blank.question = "   ".into();
        assert!(matches!(
            service.open_thread(blank).await,
            Err(DiscussionServiceError::Discussion(DiscussionError::EmptyQuestion))
        ));

        assert!(matches!(
            service.reply(ThreadId::new(404), fx.student, "hello").await,
            Err(DiscussionServiceError::NotFound(Entity::Thread, _))
        ));
    }
}
