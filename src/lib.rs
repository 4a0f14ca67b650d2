//! Covers: a peer-to-peer book lending service.
//!
//! Owners list books, other users request to borrow them, and the owner
//! hands each book to one requester at a time.

pub mod bootstrap;
pub mod error;
pub mod modules;
pub mod seed;
pub mod utils;

pub use bootstrap::{serve, Services};
pub use error::{LendingError, LendingResult};
