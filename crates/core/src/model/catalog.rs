use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{AnswerId, CourseId, LearningPathId, LessonId, QuestionId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("title cannot be empty")]
    EmptyTitle,

    #[error("slug cannot be empty")]
    EmptySlug,

    #[error("slug may only contain lowercase letters, digits and hyphens: {0}")]
    InvalidSlug(String),

    #[error("unknown course status: {0}")]
    UnknownCourseStatus(String),

    #[error("unknown lesson kind: {0}")]
    UnknownLessonKind(String),

    #[error("lesson content url cannot be empty")]
    EmptyContentUrl,

    #[error("question text cannot be empty")]
    EmptyQuestionText,

    #[error("answer text cannot be empty")]
    EmptyAnswerText,

    #[error("a question needs at least two answers, got {0}")]
    TooFewAnswers(usize),

    #[error("a question needs exactly one correct answer, got {0}")]
    CorrectAnswerCount(usize),
}

fn required(value: impl Into<String>, err: CatalogError) -> Result<String, CatalogError> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(err);
    }
    Ok(trimmed.to_owned())
}

/// Lowercases `title` and joins its alphanumeric runs with hyphens.
///
/// ```
/// # use academy_core::model::slugify;
/// assert_eq!(slugify("Intro to Rust: Part 1"), "intro-to-rust-part-1");
/// ```
#[must_use]
pub fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn validate_slug(slug: &str) -> Result<String, CatalogError> {
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(CatalogError::EmptySlug);
    }
    let valid = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(CatalogError::InvalidSlug(slug.to_owned()));
    }
    Ok(slug.to_owned())
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl CourseStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CourseStatus::Draft => "draft",
            CourseStatus::Published => "published",
            CourseStatus::Archived => "archived",
        }
    }
}

impl FromStr for CourseStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CourseStatus::Draft),
            "published" => Ok(CourseStatus::Published),
            "archived" => Ok(CourseStatus::Archived),
            other => Err(CatalogError::UnknownCourseStatus(other.to_owned())),
        }
    }
}

/// Unvalidated course input from an authoring form.
///
/// When `slug` is `None` one is derived from the title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseDraft {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
    pub instructor_id: Option<UserId>,
    pub category: String,
    pub status: CourseStatus,
    pub cover_image_url: Option<String>,
}

impl CourseDraft {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            slug: None,
            description: String::new(),
            instructor_id: None,
            category: String::new(),
            status: CourseStatus::Draft,
            cover_image_url: None,
        }
    }

    /// # Errors
    ///
    /// Returns `CatalogError` if the title is blank or the slug is malformed.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedCourse, CatalogError> {
        let title = required(self.title, CatalogError::EmptyTitle)?;
        let slug = match self.slug {
            Some(slug) => validate_slug(&slug)?,
            None => validate_slug(&slugify(&title))?,
        };
        let cover_image_url = self
            .cover_image_url
            .map(|u| u.trim().to_owned())
            .filter(|u| !u.is_empty());

        Ok(ValidatedCourse {
            title,
            slug,
            description: self.description.trim().to_owned(),
            instructor_id: self.instructor_id,
            category: self.category.trim().to_owned(),
            status: self.status,
            cover_image_url,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCourse {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub instructor_id: Option<UserId>,
    pub category: String,
    pub status: CourseStatus,
    pub cover_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ValidatedCourse {
    #[must_use]
    pub fn assign_id(self, id: CourseId) -> Course {
        Course {
            id,
            title: self.title,
            slug: self.slug,
            description: self.description,
            instructor_id: self.instructor_id,
            category: self.category,
            status: self.status,
            cover_image_url: self.cover_image_url,
            created_at: self.created_at,
        }
    }
}

/// A self-contained course made of ordered lessons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    id: CourseId,
    title: String,
    slug: String,
    description: String,
    instructor_id: Option<UserId>,
    category: String,
    status: CourseStatus,
    cover_image_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl Course {
    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn instructor_id(&self) -> Option<UserId> {
        self.instructor_id
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn status(&self) -> CourseStatus {
        self.status
    }

    #[must_use]
    pub fn cover_image_url(&self) -> Option<&str> {
        self.cover_image_url.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── LESSONS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LessonKind {
    Video,
    Pdf,
    Quiz,
    Text,
}

impl LessonKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LessonKind::Video => "video",
            LessonKind::Pdf => "pdf",
            LessonKind::Quiz => "quiz",
            LessonKind::Text => "text_editor",
        }
    }
}

impl fmt::Display for LessonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(LessonKind::Video),
            "pdf" => Ok(LessonKind::Pdf),
            "quiz" => Ok(LessonKind::Quiz),
            "text_editor" => Ok(LessonKind::Text),
            other => Err(CatalogError::UnknownLessonKind(other.to_owned())),
        }
    }
}

/// What a lesson shows. Quiz questions live in their own table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LessonContent {
    Video { url: String },
    Pdf { url: String },
    Quiz,
    #[serde(rename = "text_editor")]
    Text { body: String },
}

impl LessonContent {
    #[must_use]
    pub fn kind(&self) -> LessonKind {
        match self {
            LessonContent::Video { .. } => LessonKind::Video,
            LessonContent::Pdf { .. } => LessonKind::Pdf,
            LessonContent::Quiz => LessonKind::Quiz,
            LessonContent::Text { .. } => LessonKind::Text,
        }
    }

    fn normalized(self) -> Result<Self, CatalogError> {
        match self {
            LessonContent::Video { url } => Ok(LessonContent::Video {
                url: required(url, CatalogError::EmptyContentUrl)?,
            }),
            LessonContent::Pdf { url } => Ok(LessonContent::Pdf {
                url: required(url, CatalogError::EmptyContentUrl)?,
            }),
            other => Ok(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonDraft {
    pub course_id: CourseId,
    pub title: String,
    pub content: LessonContent,
    pub is_previewable: bool,
}

impl LessonDraft {
    /// # Errors
    ///
    /// Returns `CatalogError` for a blank title or a media lesson without a url.
    pub fn validate(self) -> Result<ValidatedLesson, CatalogError> {
        Ok(ValidatedLesson {
            course_id: self.course_id,
            title: required(self.title, CatalogError::EmptyTitle)?,
            content: self.content.normalized()?,
            is_previewable: self.is_previewable,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLesson {
    pub course_id: CourseId,
    pub title: String,
    pub content: LessonContent,
    pub is_previewable: bool,
}

impl ValidatedLesson {
    #[must_use]
    pub fn assign(self, id: LessonId, order: u32) -> Lesson {
        Lesson {
            id,
            course_id: self.course_id,
            title: self.title,
            order,
            content: self.content,
            is_previewable: self.is_previewable,
        }
    }
}

/// A single lesson within a course, positioned by `order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    id: LessonId,
    course_id: CourseId,
    title: String,
    order: u32,
    content: LessonContent,
    is_previewable: bool,
}

impl Lesson {
    #[must_use]
    pub fn from_persisted(
        id: LessonId,
        course_id: CourseId,
        title: String,
        order: u32,
        content: LessonContent,
        is_previewable: bool,
    ) -> Self {
        Self {
            id,
            course_id,
            title,
            order,
            content,
            is_previewable,
        }
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn content(&self) -> &LessonContent {
        &self.content
    }

    #[must_use]
    pub fn kind(&self) -> LessonKind {
        self.content.kind()
    }

    #[must_use]
    pub fn is_quiz(&self) -> bool {
        self.kind() == LessonKind::Quiz
    }

    #[must_use]
    pub fn is_previewable(&self) -> bool {
        self.is_previewable
    }
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

/// One answer choice of a quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub text: String,
    pub is_correct: bool,
}

/// A quiz question with its answer choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub lesson_id: LessonId,
    pub text: String,
    pub answers: Vec<Answer>,
}

impl Question {
    /// The first answer flagged correct, if any.
    #[must_use]
    pub fn correct_answer(&self) -> Option<&Answer> {
        self.answers.iter().find(|a| a.is_correct)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerDraft {
    pub text: String,
    pub is_correct: bool,
}

impl AnswerDraft {
    #[must_use]
    pub fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            text: text.into(),
            is_correct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub text: String,
    pub answers: Vec<AnswerDraft>,
}

impl QuestionDraft {
    /// Validates question text and the answer set.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` unless there are at least two non-blank answers
    /// and exactly one of them is correct.
    pub fn validate(self) -> Result<ValidatedQuestion, CatalogError> {
        let text = required(self.text, CatalogError::EmptyQuestionText)?;
        if self.answers.len() < 2 {
            return Err(CatalogError::TooFewAnswers(self.answers.len()));
        }
        let correct = self.answers.iter().filter(|a| a.is_correct).count();
        if correct != 1 {
            return Err(CatalogError::CorrectAnswerCount(correct));
        }
        let answers = self
            .answers
            .into_iter()
            .map(|a| {
                Ok(AnswerDraft {
                    text: required(a.text, CatalogError::EmptyAnswerText)?,
                    is_correct: a.is_correct,
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;
        Ok(ValidatedQuestion { text, answers })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    pub text: String,
    pub answers: Vec<AnswerDraft>,
}

//
// ─── LEARNING PATHS ────────────────────────────────────────────────────────────
//

/// A high-level programme made of courses taken in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningPath {
    id: LearningPathId,
    title: String,
    description: String,
    supervisor_id: Option<UserId>,
    created_at: DateTime<Utc>,
    course_ids: Vec<CourseId>,
}

impl LearningPath {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` if the title is blank.
    pub fn new(
        id: LearningPathId,
        title: impl Into<String>,
        description: impl Into<String>,
        supervisor_id: Option<UserId>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            id,
            title: required(title, CatalogError::EmptyTitle)?,
            description: description.into().trim().to_owned(),
            supervisor_id,
            created_at,
            course_ids: Vec::new(),
        })
    }

    /// Replaces the ordered course list.
    #[must_use]
    pub fn with_courses(mut self, course_ids: Vec<CourseId>) -> Self {
        self.course_ids = course_ids;
        self
    }

    #[must_use]
    pub fn id(&self) -> LearningPathId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn supervisor_id(&self) -> Option<UserId> {
        self.supervisor_id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Courses in module order.
    #[must_use]
    pub fn course_ids(&self) -> &[CourseId] {
        &self.course_ids
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn course_draft_derives_slug_from_title() {
        let course = CourseDraft::new("  Intro to Rust  ")
            .validate(fixed_now())
            .unwrap()
            .assign_id(CourseId::new(1));
        assert_eq!(course.title(), "Intro to Rust");
        assert_eq!(course.slug(), "intro-to-rust");
        assert_eq!(course.status(), CourseStatus::Draft);
    }

    #[test]
    fn course_draft_rejects_bad_slug_and_blank_title() {
        let mut draft = CourseDraft::new("Ok");
        draft.slug = Some("Not A Slug".into());
        assert!(matches!(
            draft.validate(fixed_now()),
            Err(CatalogError::InvalidSlug(_))
        ));
        assert_eq!(
            CourseDraft::new("   ").validate(fixed_now()).unwrap_err(),
            CatalogError::EmptyTitle
        );
    }

    #[test]
    fn video_lesson_needs_url() {
        let draft = LessonDraft {
            course_id: CourseId::new(1),
            title: "Watch".into(),
            content: LessonContent::Video { url: "  ".into() },
            is_previewable: false,
        };
        assert_eq!(draft.validate().unwrap_err(), CatalogError::EmptyContentUrl);
    }

    #[test]
    fn lesson_kind_follows_content() {
        let lesson = LessonDraft {
            course_id: CourseId::new(1),
            title: "Check".into(),
            content: LessonContent::Quiz,
            is_previewable: false,
        }
        .validate()
        .unwrap()
        .assign(LessonId::new(5), 2);
        assert!(lesson.is_quiz());
        assert_eq!(lesson.order(), 2);
        assert_eq!("text_editor".parse::<LessonKind>().unwrap(), LessonKind::Text);
    }

    #[test]
    fn question_draft_requires_exactly_one_correct_answer() {
        let none_correct = QuestionDraft {
            text: "2 + 2?".into(),
            answers: vec![AnswerDraft::new("3", false), AnswerDraft::new("5", false)],
        };
        assert_eq!(
            none_correct.validate().unwrap_err(),
            CatalogError::CorrectAnswerCount(0)
        );

        let single = QuestionDraft {
            text: "2 + 2?".into(),
            answers: vec![AnswerDraft::new("4", true)],
        };
        assert_eq!(single.validate().unwrap_err(), CatalogError::TooFewAnswers(1));

        let ok = QuestionDraft {
            text: "2 + 2?".into(),
            answers: vec![AnswerDraft::new("4", true), AnswerDraft::new(" 5 ", false)],
        }
        .validate()
        .unwrap();
        assert_eq!(ok.answers[1].text, "5");
    }

    #[test]
    fn correct_answer_picks_flagged_choice() {
        let question = Question {
            id: QuestionId::new(1),
            lesson_id: LessonId::new(1),
            text: "q".into(),
            answers: vec![
                Answer {
                    id: AnswerId::new(10),
                    text: "a".into(),
                    is_correct: false,
                },
                Answer {
                    id: AnswerId::new(11),
                    text: "b".into(),
                    is_correct: true,
                },
            ],
        };
        assert_eq!(question.correct_answer().map(|a| a.id), Some(AnswerId::new(11)));
    }

    #[test]
    fn learning_path_keeps_course_order() {
        let path = LearningPath::new(LearningPathId::new(1), "Path", "", None, fixed_now())
            .unwrap()
            .with_courses(vec![CourseId::new(3), CourseId::new(1)]);
        assert_eq!(path.course_ids(), &[CourseId::new(3), CourseId::new(1)]);
    }
}
