mod catalog;
mod contract;
mod discussion;
mod enrollment;
mod ids;
mod percentage;
mod target;
mod user;

pub use catalog::{
    Answer, AnswerDraft, CatalogError, Course, CourseDraft, CourseStatus, LearningPath, Lesson,
    LessonContent, LessonDraft, LessonKind, Question, QuestionDraft, ValidatedCourse,
    ValidatedLesson, ValidatedQuestion, slugify,
};
pub use contract::{Contract, ContractDraft, ContractError, ValidatedContract};
pub use discussion::{
    DiscussionError, DiscussionPost, DiscussionThread, ThreadDraft, validate_reply,
};
pub use enrollment::{
    Enrollment, EnrollmentError, EnrollmentStatus, QuizAttempt, SubmittedAnswers,
};
pub use ids::{
    AnswerId, AttemptId, ContractId, CourseId, EnrollmentId, LearningPathId, LessonId,
    ParseIdError, PostId, QuestionId, SubjectId, ThreadId, UserId,
};
pub use percentage::{Percentage, PercentageError};
pub use target::{EnrollableTarget, TargetError, TargetKind};
pub use user::{Role, RoleCapabilities, User, UserError};
