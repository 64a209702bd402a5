use thiserror::Error;

use crate::identity::IdentityError;
use crate::realtime::RealtimeError;
use crate::repositories::RepositoryError;

/// Outcome kinds of every client operation.
///
/// `NotFound` only drives branching and is never shown to the user.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type AppResult<T> = ::std::result::Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self { AppError::Validation(msg.into()) }

    pub fn unauthorized(msg: impl Into<String>) -> Self { AppError::Unauthorized(msg.into()) }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => AppError::NotFound,
            RepositoryError::Conflict(m) => AppError::Conflict(m),
            e => AppError::Backend(e.to_string()),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Rejected(m) => AppError::Validation(m),
            IdentityError::EmailExists => AppError::Conflict(e.to_string()),
            e => AppError::Backend(e.to_string()),
        }
    }
}

impl From<RealtimeError> for AppError {
    fn from(e: RealtimeError) -> Self { AppError::Backend(e.to_string()) }
}
