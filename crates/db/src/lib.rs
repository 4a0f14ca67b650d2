//! In-process document store for covers.
//!
//! Each [`Collection`] is a map of [`Document`]s keyed by UUID behind a tokio
//! `RwLock`. A mutation of one document runs under the write lock, so updates
//! on the same collection are serialized. When a data directory is configured
//! every collection is loaded from `<data_dir>/<collection>.json` on first use
//! and rewritten before each mutation returns. [`Database::flush`] writes every
//! opened collection again on shutdown.

mod collection;
mod database;
mod document;
mod error;

pub use collection::Collection;
pub use database::{create_module, Database, DatabaseModule};
pub use document::Document;
pub use error::{StoreError, StoreResult};
