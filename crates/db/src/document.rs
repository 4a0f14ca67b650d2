use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// A value that can live in a [`Collection`](crate::Collection).
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection name, also the snapshot file stem.
    const COLLECTION: &'static str;

    /// Primary key. Must never change after insertion.
    fn id(&self) -> Uuid;
}
