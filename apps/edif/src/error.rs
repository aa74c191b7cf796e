//! # Application Errors
//!
//! Wraps core errors and adds the failures that only exist at the service
//! boundary (identity provider, permissions, uploads). `status_code` is the
//! single place errors become HTTP statuses.

use edif_core::files::FileError;
use edif_core::{AuthErrorCode, EdifError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] EdifError),

    /// Identity-provider failure; displays the user-facing message.
    #[error("{}", .0.message())]
    Auth(AuthErrorCode),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    File(#[from] FileError),

    #[error("{0}")]
    BadRequest(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Core(e) => match e {
                EdifError::NotFound { .. } | EdifError::UnknownCollection(_) => 404,
                EdifError::AlreadyExists { .. } => 409,
                EdifError::InvalidQuery(_)
                | EdifError::Validation(_)
                | EdifError::UnknownRole(_) => 400,
                EdifError::Serialization(_) | EdifError::Storage(_) | EdifError::Io(_) => 500,
            },

            AppError::Auth(code) => match code {
                AuthErrorCode::TooManyRequests => 429,
                AuthErrorCode::EmailAlreadyInUse => 409,
                AuthErrorCode::InvalidEmail
                | AuthErrorCode::WeakPassword
                | AuthErrorCode::InvalidActionCode => 400,
                AuthErrorCode::UserNotFound
                | AuthErrorCode::WrongPassword
                | AuthErrorCode::UserDisabled
                | AuthErrorCode::Other => 401,
            },

            AppError::Unauthorized(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::File(_) | AppError::BadRequest(_) => 400,
            AppError::Io(_) => 500,
        }
    }

    pub fn not_found(collection: &str, id: &str) -> Self {
        AppError::Core(EdifError::not_found(collection, id))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Core(e) if e.is_not_found())
    }
}
