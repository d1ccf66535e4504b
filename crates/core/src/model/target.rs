use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{CourseId, LearningPathId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("unknown enrollable kind: {0}")]
    UnknownKind(String),
}

/// Discriminant of an [`EnrollableTarget`], used for storage and payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Course,
    #[serde(rename = "learningpath")]
    LearningPath,
}

impl TargetKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Course => "course",
            TargetKind::LearningPath => "learningpath",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "course" => Ok(TargetKind::Course),
            "learningpath" => Ok(TargetKind::LearningPath),
            other => Err(TargetError::UnknownKind(other.to_string())),
        }
    }
}

/// Something a subject can enroll in.
///
/// An enrollment points at exactly one target of exactly one kind, so the
/// relation is a sum type rather than a loose `(kind, id)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EnrollableTarget {
    Course(CourseId),
    #[serde(rename = "learningpath")]
    LearningPath(LearningPathId),
}

impl EnrollableTarget {
    #[must_use]
    pub fn kind(&self) -> TargetKind {
        match self {
            EnrollableTarget::Course(_) => TargetKind::Course,
            EnrollableTarget::LearningPath(_) => TargetKind::LearningPath,
        }
    }

    /// Raw numeric id of the target, without its kind.
    #[must_use]
    pub fn raw_id(&self) -> u64 {
        match self {
            EnrollableTarget::Course(id) => id.value(),
            EnrollableTarget::LearningPath(id) => id.value(),
        }
    }

    /// Rebuilds a target from its stored `(kind, id)` columns.
    #[must_use]
    pub fn from_parts(kind: TargetKind, id: u64) -> Self {
        match kind {
            TargetKind::Course => EnrollableTarget::Course(CourseId::new(id)),
            TargetKind::LearningPath => EnrollableTarget::LearningPath(LearningPathId::new(id)),
        }
    }

    #[must_use]
    pub fn as_course(&self) -> Option<CourseId> {
        match self {
            EnrollableTarget::Course(id) => Some(*id),
            EnrollableTarget::LearningPath(_) => None,
        }
    }
}

impl From<CourseId> for EnrollableTarget {
    fn from(id: CourseId) -> Self {
        EnrollableTarget::Course(id)
    }
}

impl From<LearningPathId> for EnrollableTarget {
    fn from(id: LearningPathId) -> Self {
        EnrollableTarget::LearningPath(id)
    }
}

impl fmt::Display for EnrollableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.raw_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_round_trip_through_kind_and_id() {
        let target = EnrollableTarget::LearningPath(LearningPathId::new(9));
        let rebuilt = EnrollableTarget::from_parts(target.kind(), target.raw_id());
        assert_eq!(target, rebuilt);
        assert_eq!(target.to_string(), "learningpath:9");
    }

    #[test]
    fn only_courses_expose_a_course_id() {
        assert_eq!(
            EnrollableTarget::Course(CourseId::new(3)).as_course(),
            Some(CourseId::new(3))
        );
        assert_eq!(
            EnrollableTarget::LearningPath(LearningPathId::new(3)).as_course(),
            None
        );
    }

    #[test]
    fn kind_parses_storage_names() {
        assert_eq!("course".parse::<TargetKind>().unwrap(), TargetKind::Course);
        assert_eq!(
            "learningpath".parse::<TargetKind>().unwrap(),
            TargetKind::LearningPath
        );
        assert!("module".parse::<TargetKind>().is_err());
    }
}
