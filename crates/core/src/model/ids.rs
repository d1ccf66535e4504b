use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl ParseIdError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "`")]
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value
            #[must_use]
            pub const fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map($name::new)
                    .map_err(|_| ParseIdError {
                        kind: stringify!($name),
                    })
            }
        }
    };
}

numeric_id!(
    /// Identifier of a person known to the system (student, instructor, client, ...).
    UserId
);
numeric_id!(
    /// Identifier of a Course
    CourseId
);
numeric_id!(
    /// Identifier of a Lesson
    LessonId
);
numeric_id!(
    /// Identifier of a quiz Question
    QuestionId
);
numeric_id!(
    /// Identifier of an answer choice
    AnswerId
);
numeric_id!(
    /// Identifier of a LearningPath
    LearningPathId
);
numeric_id!(
    /// Identifier of an Enrollment record
    EnrollmentId
);
numeric_id!(
    /// Identifier of a B2B Contract
    ContractId
);
numeric_id!(
    /// Identifier of a discussion thread
    ThreadId
);
numeric_id!(
    /// Identifier of a reply inside a discussion thread
    PostId
);

/// The enrolled person. Subjects are users; the alias keeps enrollment code readable.
pub type SubjectId = UserId;

/// Opaque identifier of a quiz attempt, generated at submission time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(Uuid);

impl AttemptId {
    /// Generates a fresh random attempt id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttemptId({})", self.0)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AttemptId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(AttemptId)
            .map_err(|_| ParseIdError { kind: "AttemptId" })
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_id_display() {
        let id = CourseId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "CourseId(42)");
    }

    #[test]
    fn test_lesson_id_from_str() {
        let id: LessonId = " 123 ".parse().unwrap();
        assert_eq!(id, LessonId::new(123));
    }

    #[test]
    fn test_answer_id_from_str_invalid() {
        let err = "not-a-number".parse::<AnswerId>().unwrap_err();
        assert_eq!(err.kind(), "AnswerId");
    }

    #[test]
    fn test_attempt_ids_are_unique() {
        let a = AttemptId::generate();
        let b = AttemptId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_attempt_id_parses_its_display() {
        let a = AttemptId::generate();
        let parsed: AttemptId = a.to_string().parse().unwrap();
        assert_eq!(a, parsed);
        assert!("nope".parse::<AttemptId>().is_err());
    }

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&EnrollmentId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
