use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId, PostId, ThreadId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DiscussionError {
    #[error("thread title cannot be empty")]
    EmptyTitle,

    #[error("question text cannot be empty")]
    EmptyQuestion,

    #[error("reply cannot be empty")]
    EmptyReply,
}

/// A question a student asks about a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionThread {
    pub id: ThreadId,
    pub course_id: CourseId,
    pub lesson_id: LessonId,
    pub author_id: UserId,
    pub title: String,
    pub question: String,
    pub created_at: DateTime<Utc>,
}

/// A reply inside a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionPost {
    pub id: PostId,
    pub thread_id: ThreadId,
    pub author_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadDraft {
    pub course_id: CourseId,
    pub lesson_id: LessonId,
    pub author_id: UserId,
    pub title: String,
    pub question: String,
}

impl ThreadDraft {
    /// # Errors
    ///
    /// Returns `DiscussionError` for a blank title or question.
    pub fn validate(self) -> Result<Self, DiscussionError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(DiscussionError::EmptyTitle);
        }
        let question = self.question.trim().to_owned();
        if question.is_empty() {
            return Err(DiscussionError::EmptyQuestion);
        }
        Ok(Self {
            title,
            question,
            ..self
        })
    }

    #[must_use]
    pub fn assign(self, id: ThreadId, created_at: DateTime<Utc>) -> DiscussionThread {
        DiscussionThread {
            id,
            course_id: self.course_id,
            lesson_id: self.lesson_id,
            author_id: self.author_id,
            title: self.title,
            question: self.question,
            created_at,
        }
    }
}

/// Trims a reply body.
///
/// # Errors
///
/// Returns `DiscussionError::EmptyReply` if nothing is left.
pub fn validate_reply(body: &str) -> Result<String, DiscussionError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(DiscussionError::EmptyReply);
    }
    Ok(body.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_draft_requires_title_and_question() {
        let draft = ThreadDraft {
            course_id: CourseId::new(1),
            lesson_id: LessonId::new(1),
            author_id: UserId::new(1),
            title: "  ".into(),
            question: "Why?".into(),
        };
        assert_eq!(draft.clone().validate().unwrap_err(), DiscussionError::EmptyTitle);

        let draft = ThreadDraft {
            title: "Ownership".into(),
            question: "\n".into(),
            ..draft
        };
        assert_eq!(draft.validate().unwrap_err(), DiscussionError::EmptyQuestion);
    }

    #[test]
    fn reply_is_trimmed() {
        assert_eq!(validate_reply("  thanks \n").unwrap(), "thanks");
        assert_eq!(validate_reply(" ").unwrap_err(), DiscussionError::EmptyReply);
    }
}
