use thiserror::Error;

use aprova_core::domain::request::RequestStatus;
use aprova_core::domain::rule::RuleConfigError;
use aprova_core::engine::TransitionError;
use aprova_db::repositories::RepositoryError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },
    #[error("request is already finalized as {status:?}")]
    AlreadyFinalized { status: RequestStatus },
    #[error("validator level {actual} is below the level {required} required to act")]
    InsufficientLevel { required: u8, actual: u8 },
    #[error("invalid rule configuration: {0}")]
    InvalidRuleConfiguration(#[from] RuleConfigError),
    #[error("request `{id}` was modified concurrently; reload and retry")]
    ConcurrentModification { id: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<TransitionError> for ServiceError {
    fn from(error: TransitionError) -> Self {
        match error {
            TransitionError::AlreadyFinalized { status } => Self::AlreadyFinalized { status },
            TransitionError::InsufficientLevel { required, actual } => {
                Self::InsufficientLevel { required, actual }
            }
        }
    }
}
