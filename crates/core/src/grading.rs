//! Quiz scoring.
//!
//! Questions are graded in ascending id order and matched to submissions by
//! position (`question_1`, `question_2`, ...). A choice is correct when its
//! text equals the correct answer's id rendered as a string.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    AnswerId, AttemptId, Lesson, LessonId, LessonKind, Percentage, Question, QuestionId,
    QuizAttempt, SubmittedAnswers,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GradingError {
    #[error("lesson {lesson_id} is a {kind} lesson, not a quiz")]
    InvalidLessonKind { lesson_id: LessonId, kind: LessonKind },

    #[error("question {question_id} does not belong to lesson {lesson_id}")]
    ForeignQuestion {
        question_id: QuestionId,
        lesson_id: LessonId,
    },
}

/// Outcome for a single question, in grading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionResult {
    pub position: usize,
    pub question_id: QuestionId,
    pub submitted: Option<String>,
    pub correct_answer_id: Option<AnswerId>,
    pub is_correct: bool,
}

/// Score of a submission before it becomes an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizGrade {
    pub correct: usize,
    pub total: usize,
    pub score: Percentage,
    pub questions: Vec<QuestionResult>,
}

fn ordered(questions: &[Question]) -> Vec<&Question> {
    let mut sorted: Vec<&Question> = questions.iter().collect();
    sorted.sort_by_key(|q| q.id);
    sorted
}

fn ensure_quiz(lesson: &Lesson, questions: &[Question]) -> Result<(), GradingError> {
    if !lesson.is_quiz() {
        return Err(GradingError::InvalidLessonKind {
            lesson_id: lesson.id(),
            kind: lesson.kind(),
        });
    }
    if let Some(q) = questions.iter().find(|q| q.lesson_id != lesson.id()) {
        return Err(GradingError::ForeignQuestion {
            question_id: q.id,
            lesson_id: lesson.id(),
        });
    }
    Ok(())
}

/// Scores `submitted` against the questions of a quiz lesson.
///
/// Each choice must equal the correct answer id verbatim. An empty quiz scores
/// 100. A question without a correct answer can never be answered correctly.
///
/// # Errors
///
/// Returns `GradingError::InvalidLessonKind` for non-quiz lessons and
/// `GradingError::ForeignQuestion` if a question belongs to another lesson.
pub fn score(
    lesson: &Lesson,
    questions: &[Question],
    submitted: &SubmittedAnswers,
) -> Result<QuizGrade, GradingError> {
    ensure_quiz(lesson, questions)?;

    let results: Vec<QuestionResult> = ordered(questions)
        .into_iter()
        .enumerate()
        .map(|(index, question)| {
            let submitted = submitted
                .get(&SubmittedAnswers::key_for(index))
                .map(str::to_owned);
            let correct_answer_id = question.correct_answer().map(|a| a.id);
            let is_correct = match (&submitted, correct_answer_id) {
                (Some(choice), Some(correct)) => *choice == correct.to_string(),
                _ => false,
            };
            QuestionResult {
                position: index + 1,
                question_id: question.id,
                submitted,
                correct_answer_id,
                is_correct,
            }
        })
        .collect();

    let total = results.len();
    let correct = results.iter().filter(|r| r.is_correct).count();
    let score = Percentage::from_ratio(correct, total).unwrap_or(Percentage::FULL);

    Ok(QuizGrade {
        correct,
        total,
        score,
        questions: results,
    })
}

/// Grades a submission and produces the immutable attempt to append.
///
/// # Errors
///
/// See [`score`].
pub fn grade(
    lesson: &Lesson,
    questions: &[Question],
    submitted: SubmittedAnswers,
    attempt_id: AttemptId,
    submitted_at: DateTime<Utc>,
) -> Result<(QuizGrade, QuizAttempt), GradingError> {
    let graded = score(lesson, questions, &submitted)?;
    let attempt = QuizAttempt::new(attempt_id, lesson.id(), graded.score, submitted_at, submitted);
    Ok((graded, attempt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, CourseId, LessonContent};
    use crate::time::fixed_now;

    fn quiz_lesson() -> Lesson {
        Lesson::from_persisted(
            LessonId::new(1),
            CourseId::new(1),
            "Quiz".into(),
            1,
            LessonContent::Quiz,
            false,
        )
    }

    fn question(id: u64, correct: u64, wrong: u64) -> Question {
        Question {
            id: QuestionId::new(id),
            lesson_id: LessonId::new(1),
            text: format!("Q{id}"),
            answers: vec![
                Answer {
                    id: AnswerId::new(wrong),
                    text: "wrong".into(),
                    is_correct: false,
                },
                Answer {
                    id: AnswerId::new(correct),
                    text: "right".into(),
                    is_correct: true,
                },
            ],
        }
    }

    fn three_questions() -> Vec<Question> {
        vec![question(1, 11, 12), question(2, 21, 22), question(3, 31, 32)]
    }

    #[test]
    fn all_correct_scores_full() {
        let answers = SubmittedAnswers::new()
            .with_choice(0, "11")
            .with_choice(1, "21")
            .with_choice(2, "31");
        let graded = score(&quiz_lesson(), &three_questions(), &answers).unwrap();
        assert_eq!(graded.score, Percentage::FULL);
        assert_eq!(graded.correct, 3);
    }

    #[test]
    fn none_correct_scores_zero() {
        let answers = SubmittedAnswers::new()
            .with_choice(0, "12")
            .with_choice(1, "22")
            .with_choice(2, "32");
        let graded = score(&quiz_lesson(), &three_questions(), &answers).unwrap();
        assert_eq!(graded.score, Percentage::ZERO);
    }

    #[test]
    fn two_of_three_scores_66_67() {
        let answers = SubmittedAnswers::new()
            .with_choice(0, "11")
            .with_choice(1, "22")
            .with_choice(2, "31");
        let graded = score(&quiz_lesson(), &three_questions(), &answers).unwrap();
        assert_eq!(graded.score.to_string(), "66.67");
        assert!(!graded.questions[1].is_correct);
        assert_eq!(graded.questions[1].correct_answer_id, Some(AnswerId::new(21)));
    }

    #[test]
    fn empty_quiz_is_vacuously_perfect() {
        let graded = score(&quiz_lesson(), &[], &SubmittedAnswers::new()).unwrap();
        assert_eq!(graded.score, Percentage::FULL);
        assert_eq!(graded.total, 0);
    }

    #[test]
    fn questions_are_matched_by_position_in_id_order() {
        // Stored order differs from id order; position follows ids.
        let questions = vec![question(3, 31, 32), question(1, 11, 12), question(2, 21, 22)];
        let answers = SubmittedAnswers::new()
            .with_choice(0, "11")
            .with_choice(1, "21")
            .with_choice(2, "31");
        let graded = score(&quiz_lesson(), &questions, &answers).unwrap();
        assert_eq!(graded.score, Percentage::FULL);
        assert_eq!(graded.questions[0].question_id, QuestionId::new(1));
    }

    #[test]
    fn question_without_correct_answer_never_scores() {
        let mut q = question(1, 11, 12);
        for a in &mut q.answers {
            a.is_correct = false;
        }
        let answers = SubmittedAnswers::new().with_choice(0, "11");
        let graded = score(&quiz_lesson(), &[q], &answers).unwrap();
        assert_eq!(graded.score, Percentage::ZERO);
    }

    #[test]
    fn choices_must_match_the_answer_id_exactly() {
        let answers = SubmittedAnswers::new()
            .with_choice(0, " 11\n")
            .with_choice(1, "21 ")
            .with_choice(2, "031");
        let graded = score(&quiz_lesson(), &three_questions(), &answers).unwrap();
        assert_eq!(graded.score, Percentage::ZERO);
        assert_eq!(graded.questions[0].submitted.as_deref(), Some(" 11\n"));
    }

    #[test]
    fn missing_choices_count_as_wrong() {
        let answers = SubmittedAnswers::new().with_choice(0, "11");
        let graded = score(&quiz_lesson(), &three_questions(), &answers).unwrap();
        assert_eq!(graded.score.to_string(), "33.33");
        assert_eq!(graded.questions[2].submitted, None);
    }

    #[test]
    fn non_quiz_lessons_are_rejected() {
        let lesson = Lesson::from_persisted(
            LessonId::new(1),
            CourseId::new(1),
            "Video".into(),
            1,
            LessonContent::Video {
                url: "https://example.com/v.mp4".into(),
            },
            false,
        );
        let err = score(&lesson, &[], &SubmittedAnswers::new()).unwrap_err();
        assert!(matches!(err, GradingError::InvalidLessonKind { kind: LessonKind::Video, .. }));
    }

    #[test]
    fn grading_twice_is_stable_and_keeps_answers_verbatim() {
        let answers = SubmittedAnswers::new()
            .with_choice(0, "11")
            .with_choice(1, "x");
        let (first, attempt_a) = grade(
            &quiz_lesson(),
            &three_questions(),
            answers.clone(),
            AttemptId::generate(),
            fixed_now(),
        )
        .unwrap();
        let (second, attempt_b) = grade(
            &quiz_lesson(),
            &three_questions(),
            answers.clone(),
            AttemptId::generate(),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(first.score, second.score);
        assert_ne!(attempt_a.attempt_id(), attempt_b.attempt_id());
        assert_eq!(attempt_a.answers(), &answers);
        assert_eq!(attempt_a.lesson_id(), LessonId::new(1));
    }
}
