//! Authentication for covers.
//!
//! This crate provides:
//! - argon2 password hashing and verification
//! - HS256 bearer token issuance and validation
//! - the per-request [`Identity`] and its axum extractor

mod error;
mod identity;
mod password;
mod token;

pub use error::*;
pub use identity::*;
pub use password::*;
pub use token::*;
