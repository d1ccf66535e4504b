use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{ContractId, LearningPathId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContractError {
    #[error("contract title cannot be empty")]
    EmptyTitle,

    #[error("contract must end after it starts")]
    InvalidPeriod,
}

/// Unvalidated contract input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDraft {
    pub title: String,
    pub client_id: UserId,
    pub student_ids: Vec<UserId>,
    pub learning_path_ids: Vec<LearningPathId>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl ContractDraft {
    /// # Errors
    ///
    /// Returns `ContractError` for a blank title or an empty/inverted period.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedContract, ContractError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(ContractError::EmptyTitle);
        }
        if self.ends_at <= self.starts_at {
            return Err(ContractError::InvalidPeriod);
        }
        Ok(ValidatedContract {
            title,
            client_id: self.client_id,
            student_ids: dedup(self.student_ids),
            learning_path_ids: dedup(self.learning_path_ids),
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            created_at: now,
        })
    }
}

fn dedup<T: Ord + Copy>(mut ids: Vec<T>) -> Vec<T> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedContract {
    pub title: String,
    pub client_id: UserId,
    pub student_ids: Vec<UserId>,
    pub learning_path_ids: Vec<LearningPathId>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ValidatedContract {
    #[must_use]
    pub fn assign_id(self, id: ContractId) -> Contract {
        Contract {
            id,
            title: self.title,
            client_id: self.client_id,
            student_ids: self.student_ids,
            learning_path_ids: self.learning_path_ids,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            is_active: true,
            created_at: self.created_at,
        }
    }
}

/// B2B agreement granting a client's students access to learning paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    id: ContractId,
    title: String,
    client_id: UserId,
    student_ids: Vec<UserId>,
    learning_path_ids: Vec<LearningPathId>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl Contract {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        id: ContractId,
        title: String,
        client_id: UserId,
        student_ids: Vec<UserId>,
        learning_path_ids: Vec<LearningPathId>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            client_id,
            student_ids,
            learning_path_ids,
            starts_at,
            ends_at,
            is_active,
            created_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> ContractId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn client_id(&self) -> UserId {
        self.client_id
    }

    #[must_use]
    pub fn student_ids(&self) -> &[UserId] {
        &self.student_ids
    }

    #[must_use]
    pub fn learning_path_ids(&self) -> &[LearningPathId] {
        &self.learning_path_ids
    }

    #[must_use]
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    #[must_use]
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Active and `now` falls inside `[starts_at, ends_at)`.
    #[must_use]
    pub fn is_in_effect(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= now && now < self.ends_at
    }

    #[must_use]
    pub fn covers_student(&self, student_id: UserId) -> bool {
        self.student_ids.binary_search(&student_id).is_ok()
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn draft() -> ContractDraft {
        ContractDraft {
            title: " ABC Corp - Q4 Onboarding ".into(),
            client_id: UserId::new(1),
            student_ids: vec![UserId::new(3), UserId::new(2), UserId::new(3)],
            learning_path_ids: vec![LearningPathId::new(1)],
            starts_at: fixed_now(),
            ends_at: fixed_now() + Duration::days(90),
        }
    }

    #[test]
    fn validate_trims_and_dedups() {
        let contract = draft().validate(fixed_now()).unwrap().assign_id(ContractId::new(1));
        assert_eq!(contract.title(), "ABC Corp - Q4 Onboarding");
        assert_eq!(contract.student_ids(), &[UserId::new(2), UserId::new(3)]);
        assert!(contract.is_active());
        assert!(contract.covers_student(UserId::new(3)));
        assert!(!contract.covers_student(UserId::new(4)));
    }

    #[test]
    fn period_must_be_forward() {
        let mut d = draft();
        d.ends_at = d.starts_at;
        assert_eq!(d.validate(fixed_now()).unwrap_err(), ContractError::InvalidPeriod);
    }

    #[test]
    fn in_effect_respects_window_and_flag() {
        let mut contract = draft().validate(fixed_now()).unwrap().assign_id(ContractId::new(1));
        assert!(contract.is_in_effect(fixed_now() + Duration::days(1)));
        assert!(!contract.is_in_effect(fixed_now() - Duration::days(1)));
        assert!(!contract.is_in_effect(fixed_now() + Duration::days(90)));
        contract.deactivate();
        assert!(!contract.is_in_effect(fixed_now() + Duration::days(1)));
    }
}
