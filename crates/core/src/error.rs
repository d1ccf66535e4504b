use thiserror::Error;

use crate::grading::GradingError;
use crate::model::{
    CatalogError, ContractError, DiscussionError, EnrollmentError, ParseIdError, PercentageError,
    TargetError, UserError,
};

/// Any domain validation failure, for callers that do not care which layer raised it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Discussion(#[from] DiscussionError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error(transparent)]
    Percentage(#[from] PercentageError),
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
