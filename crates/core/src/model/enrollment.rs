use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{AttemptId, EnrollmentId, LessonId, SubjectId};
use crate::model::percentage::Percentage;
use crate::model::target::EnrollableTarget;
use crate::progress::{self, ProgressUpdate};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnrollmentError {
    #[error("unknown enrollment status: {0}")]
    UnknownStatus(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Completion state of an enrollment.
///
/// `Completed` is only ever reached through a progress recompute and is never
/// cleared automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    #[default]
    InProgress,
    Completed,
}

impl EnrollmentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::InProgress => "in_progress",
            EnrollmentStatus::Completed => "completed",
        }
    }

    /// Human-facing label used in reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::InProgress => "In Progress",
            EnrollmentStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = EnrollmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(EnrollmentStatus::InProgress),
            "completed" => Ok(EnrollmentStatus::Completed),
            other => Err(EnrollmentError::UnknownStatus(other.to_owned())),
        }
    }
}

//
// ─── SUBMITTED ANSWERS ─────────────────────────────────────────────────────────
//

/// Raw quiz submission: `question_{n}` → chosen answer identifier.
///
/// Keys are positional labels, values are kept exactly as submitted so the
/// attempt can be replayed for review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmittedAnswers(BTreeMap<String, String>);

impl SubmittedAnswers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional key for the question at zero-based `index`.
    #[must_use]
    pub fn key_for(index: usize) -> String {
        format!("question_{}", index + 1)
    }

    /// Records the choice for the question at zero-based `index`.
    #[must_use]
    pub fn with_choice(mut self, index: usize, choice: impl Into<String>) -> Self {
        self.0.insert(Self::key_for(index), choice.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, choice: impl Into<String>) {
        self.0.insert(key.into(), choice.into());
    }

    /// Collects form fields named `answers[question_n]`; other fields are ignored.
    pub fn from_form_fields<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut out = Self::new();
        for (name, value) in fields {
            let Some(rest) = name.strip_prefix("answers[") else {
                continue;
            };
            if let Some(key) = rest.strip_suffix(']') {
                out.insert(key, value);
            }
        }
        out
    }

    /// Builds a submission from a JSON-like map, rendering numbers as strings
    /// so numeric and string choice ids compare the same way.
    pub fn from_loose<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: fmt::Display,
    {
        let mut out = Self::new();
        for (k, v) in pairs {
            out.insert(k, v.to_string());
        }
        out
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

//
// ─── QUIZ ATTEMPT ──────────────────────────────────────────────────────────────
//

/// One immutable, scored quiz submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAttempt {
    attempt_id: AttemptId,
    lesson_id: LessonId,
    score: Percentage,
    submitted_at: DateTime<Utc>,
    answers: SubmittedAnswers,
}

impl QuizAttempt {
    #[must_use]
    pub fn new(
        attempt_id: AttemptId,
        lesson_id: LessonId,
        score: Percentage,
        submitted_at: DateTime<Utc>,
        answers: SubmittedAnswers,
    ) -> Self {
        Self {
            attempt_id,
            lesson_id,
            score,
            submitted_at,
            answers,
        }
    }

    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn score(&self) -> Percentage {
        self.score
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    #[must_use]
    pub fn answers(&self) -> &SubmittedAnswers {
        &self.answers
    }
}

//
// ─── ENROLLMENT ────────────────────────────────────────────────────────────────
//

/// A subject's relationship to one enrollable target.
///
/// Mutators only touch the fields they own so each change maps onto a single
/// field-scoped write in storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    id: EnrollmentId,
    subject_id: SubjectId,
    target: EnrollableTarget,
    enrolled_at: DateTime<Utc>,
    status: EnrollmentStatus,
    progress: Percentage,
    completed_lesson_ids: BTreeSet<LessonId>,
    last_accessed_lesson_id: Option<LessonId>,
    quiz_attempts: Vec<QuizAttempt>,
}

impl Enrollment {
    /// A fresh in-progress enrollment with no activity.
    #[must_use]
    pub fn new(
        id: EnrollmentId,
        subject_id: SubjectId,
        target: EnrollableTarget,
        enrolled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            subject_id,
            target,
            enrolled_at,
            status: EnrollmentStatus::InProgress,
            progress: Percentage::ZERO,
            completed_lesson_ids: BTreeSet::new(),
            last_accessed_lesson_id: None,
            quiz_attempts: Vec::new(),
        }
    }

    /// Rebuild an enrollment from stored columns and child rows.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        id: EnrollmentId,
        subject_id: SubjectId,
        target: EnrollableTarget,
        enrolled_at: DateTime<Utc>,
        status: EnrollmentStatus,
        progress: Percentage,
        completed_lesson_ids: BTreeSet<LessonId>,
        last_accessed_lesson_id: Option<LessonId>,
        quiz_attempts: Vec<QuizAttempt>,
    ) -> Self {
        Self {
            id,
            subject_id,
            target,
            enrolled_at,
            status,
            progress,
            completed_lesson_ids,
            last_accessed_lesson_id,
            quiz_attempts,
        }
    }

    #[must_use]
    pub fn id(&self) -> EnrollmentId {
        self.id
    }

    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    #[must_use]
    pub fn target(&self) -> EnrollableTarget {
        self.target
    }

    #[must_use]
    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    #[must_use]
    pub fn status(&self) -> EnrollmentStatus {
        self.status
    }

    #[must_use]
    pub fn progress(&self) -> Percentage {
        self.progress
    }

    #[must_use]
    pub fn completed_lesson_ids(&self) -> &BTreeSet<LessonId> {
        &self.completed_lesson_ids
    }

    #[must_use]
    pub fn has_completed(&self, lesson_id: LessonId) -> bool {
        self.completed_lesson_ids.contains(&lesson_id)
    }

    #[must_use]
    pub fn last_accessed_lesson_id(&self) -> Option<LessonId> {
        self.last_accessed_lesson_id
    }

    #[must_use]
    pub fn quiz_attempts(&self) -> &[QuizAttempt] {
        &self.quiz_attempts
    }

    #[must_use]
    pub fn attempt(&self, attempt_id: AttemptId) -> Option<&QuizAttempt> {
        self.quiz_attempts
            .iter()
            .find(|a| a.attempt_id() == attempt_id)
    }

    /// Remember the lesson the subject last opened.
    pub fn record_access(&mut self, lesson_id: LessonId) {
        self.last_accessed_lesson_id = Some(lesson_id);
    }

    /// Marks `lesson_id` completed and last accessed.
    ///
    /// Returns `false` when the lesson was already completed.
    pub fn complete_lesson(&mut self, lesson_id: LessonId) -> bool {
        self.last_accessed_lesson_id = Some(lesson_id);
        self.completed_lesson_ids.insert(lesson_id)
    }

    /// Re-derives `progress`/`status` against `course_lessons`, the lessons
    /// currently in the enrolled course. Completed ids outside that list are
    /// ignored.
    ///
    /// Learning-path enrollments are left untouched and yield `None`.
    pub fn recompute_progress<I>(&mut self, course_lessons: I) -> Option<ProgressUpdate>
    where
        I: IntoIterator<Item = LessonId>,
    {
        self.target.as_course()?;
        let (mut total, mut completed) = (0, 0);
        for lesson_id in course_lessons {
            total += 1;
            completed += usize::from(self.completed_lesson_ids.contains(&lesson_id));
        }
        let update = progress::recompute(completed, total, self.status);
        self.apply_progress(update);
        Some(update)
    }

    /// Applies an already computed progress update.
    ///
    /// An update that would move a completed enrollment back to in progress
    /// is dropped.
    pub fn apply_progress(&mut self, update: ProgressUpdate) {
        if self.status == EnrollmentStatus::Completed && update.status != EnrollmentStatus::Completed
        {
            return;
        }
        self.progress = update.progress;
        self.status = update.status;
    }

    /// Appends an attempt; earlier attempts are never reordered or removed.
    pub fn push_attempt(&mut self, attempt: QuizAttempt) {
        self.quiz_attempts.push(attempt);
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{CourseId, LearningPathId, UserId};
    use crate::time::fixed_now;

    fn course_enrollment() -> Enrollment {
        Enrollment::new(
            EnrollmentId::new(1),
            UserId::new(7),
            EnrollableTarget::Course(CourseId::new(3)),
            fixed_now(),
        )
    }

    #[test]
    fn new_enrollment_starts_in_progress_at_zero() {
        let e = course_enrollment();
        assert_eq!(e.status(), EnrollmentStatus::InProgress);
        assert_eq!(e.progress(), Percentage::ZERO);
        assert!(e.completed_lesson_ids().is_empty());
        assert!(e.quiz_attempts().is_empty());
    }

    #[test]
    fn completing_a_lesson_is_idempotent() {
        let mut e = course_enrollment();
        assert!(e.complete_lesson(LessonId::new(1)));
        assert!(!e.complete_lesson(LessonId::new(1)));
        assert_eq!(e.completed_lesson_ids().len(), 1);
        assert_eq!(e.last_accessed_lesson_id(), Some(LessonId::new(1)));
    }

    fn lessons(n: u64) -> impl Iterator<Item = LessonId> {
        (1..=n).map(LessonId::new)
    }

    #[test]
    fn four_lesson_course_walkthrough() {
        let mut e = course_enrollment();
        e.complete_lesson(LessonId::new(1));
        e.complete_lesson(LessonId::new(3));
        e.recompute_progress(lessons(4));
        assert_eq!(e.progress().as_f64(), 50.0);
        assert_eq!(e.status(), EnrollmentStatus::InProgress);

        e.complete_lesson(LessonId::new(2));
        e.complete_lesson(LessonId::new(4));
        e.recompute_progress(lessons(4));
        assert_eq!(e.progress(), Percentage::FULL);
        assert_eq!(e.status(), EnrollmentStatus::Completed);
    }

    #[test]
    fn completions_outside_the_course_are_not_counted() {
        let mut e = course_enrollment();
        e.complete_lesson(LessonId::new(1));
        e.complete_lesson(LessonId::new(99));
        let update = e.recompute_progress(lessons(2)).unwrap();
        assert_eq!(update.progress.to_string(), "50.00");
        assert_eq!(e.status(), EnrollmentStatus::InProgress);
    }

    #[test]
    fn stale_update_never_reverts_completion() {
        let mut e = course_enrollment();
        e.complete_lesson(LessonId::new(1));
        e.complete_lesson(LessonId::new(2));
        e.recompute_progress(lessons(2));
        assert_eq!(e.status(), EnrollmentStatus::Completed);

        e.apply_progress(ProgressUpdate {
            progress: Percentage::from_ratio(1, 2).unwrap(),
            status: EnrollmentStatus::InProgress,
        });
        assert_eq!(e.progress(), Percentage::FULL);
        assert_eq!(e.status(), EnrollmentStatus::Completed);
    }

    #[test]
    fn learning_path_progress_is_not_derived() {
        let mut e = Enrollment::new(
            EnrollmentId::new(2),
            UserId::new(7),
            EnrollableTarget::LearningPath(LearningPathId::new(1)),
            fixed_now(),
        );
        e.complete_lesson(LessonId::new(1));
        assert_eq!(e.recompute_progress(lessons(1)), None);
        assert_eq!(e.progress(), Percentage::ZERO);
    }

    #[test]
    fn form_fields_are_parsed_into_positional_keys() {
        let answers = SubmittedAnswers::from_form_fields([
            ("csrfmiddlewaretoken", "x"),
            ("answers[question_1]", "10"),
            ("answers[question_2]", "21"),
        ]);
        assert_eq!(answers.len(), 2);
        assert_eq!(answers.get("question_1"), Some("10"));
        assert_eq!(answers.get("question_2"), Some("21"));
    }

    #[test]
    fn loose_values_are_stringified() {
        let answers = SubmittedAnswers::from_loose([("question_1", 10_u64)]);
        assert_eq!(answers.get("question_1"), Some("10"));
    }

    #[test]
    fn attempts_are_found_by_id() {
        let mut e = course_enrollment();
        let attempt = QuizAttempt::new(
            AttemptId::generate(),
            LessonId::new(2),
            Percentage::FULL,
            fixed_now(),
            SubmittedAnswers::new(),
        );
        let id = attempt.attempt_id();
        e.push_attempt(attempt);
        assert_eq!(e.attempt(id).map(QuizAttempt::lesson_id), Some(LessonId::new(2)));
        assert!(e.attempt(AttemptId::generate()).is_none());
    }
}
