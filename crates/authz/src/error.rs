//! Authentication error types.

use covers_http::error::AppError;
use thiserror::Error;

/// Errors that can occur while authenticating a caller.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer token on a request that needs one.
    #[error("missing bearer token")]
    MissingToken,

    /// Token is malformed, has a bad signature or a wrong issuer.
    #[error("invalid token")]
    InvalidToken,

    /// Token expired.
    #[error("token expired")]
    TokenExpired,

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    /// JWT encoding failed.
    #[error("JWT encoding failed: {0}")]
    JwtEncoding(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::TokenExpired => {
                AppError::unauthorized(e.to_string())
            }
            AuthError::PasswordHash(_) | AuthError::JwtEncoding(_) => {
                AppError::Internal(anyhow::Error::new(e))
            }
        }
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
