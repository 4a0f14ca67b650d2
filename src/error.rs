//! Domain errors of the lending service and their HTTP mapping.

use covers_authz::AuthError;
use covers_db::StoreError;
use covers_http::error::{AppError, FieldError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LendingError {
    /// One or more input fields were rejected.
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller is authenticated but may not perform the action.
    #[error("{0}")]
    Forbidden(String),

    /// The action is incompatible with the current state.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl LendingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

impl From<StoreError> for LendingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { collection, id } => Self::NotFound {
                entity: collection,
                id,
            },
            StoreError::AlreadyExists { collection, .. } => {
                Self::Conflict(format!("{collection} document already exists"))
            }
            other => Self::Store(other),
        }
    }
}

impl From<LendingError> for AppError {
    fn from(e: LendingError) -> Self {
        match e {
            LendingError::Validation(fields) => AppError::invalid_fields(&fields),
            LendingError::NotFound { .. } => AppError::not_found(e.to_string()),
            LendingError::Forbidden(message) => AppError::forbidden(message),
            LendingError::Conflict(message) => AppError::conflict(Vec::new(), message),
            LendingError::Unauthorized(message) => AppError::unauthorized(message),
            LendingError::Auth(auth) => auth.into(),
            LendingError::Store(store) => AppError::Internal(anyhow::Error::new(store)),
            LendingError::Internal(err) => AppError::Internal(err),
        }
    }
}

/// Result type for lending operations.
pub type LendingResult<T> = Result<T, LendingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn store_errors_map_to_domain_errors() {
        let missing: LendingError = StoreError::not_found("books", "42").into();
        assert!(matches!(missing, LendingError::NotFound { entity: "books", .. }));

        let duplicate: LendingError = StoreError::already_exists("users", "7").into();
        assert!(matches!(duplicate, LendingError::Conflict(_)));
    }

    #[test]
    fn domain_errors_map_to_http_statuses() {
        let cases = [
            (
                LendingError::Validation(vec![FieldError::new("title", "required")]),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (LendingError::not_found("books", "1"), StatusCode::NOT_FOUND),
            (LendingError::forbidden("owner only"), StatusCode::FORBIDDEN),
            (LendingError::conflict("checked out"), StatusCode::CONFLICT),
            (
                LendingError::Unauthorized("bad credentials".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                LendingError::Auth(AuthError::TokenExpired),
                StatusCode::UNAUTHORIZED,
            ),
            (
                LendingError::Internal(anyhow::anyhow!("worker panicked")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(AppError::from(error).status(), status);
        }
    }
}
