use std::{
    any::Any,
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use covers_kernel::{settings::DatabaseSettings, InitCtx, Module};

use crate::{Collection, Document, StoreError, StoreResult};

/// Type-erased view of a collection so the database can flush every
/// collection it handed out without knowing the document types.
#[async_trait]
trait StoredCollection: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    async fn flush_to(&self, dir: &Path) -> StoreResult<usize>;
}

#[async_trait]
impl<T: Document> StoredCollection for Collection<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn flush_to(&self, dir: &Path) -> StoreResult<usize> {
        self.write_snapshot(&snapshot_path(dir, T::COLLECTION)).await
    }
}

fn snapshot_path(dir: &Path, collection: &str) -> PathBuf {
    dir.join(format!("{collection}.json"))
}

/// Handle to every collection of the running service.
pub struct Database {
    data_dir: Option<PathBuf>,
    flush_on_shutdown: bool,
    collections: Mutex<HashMap<&'static str, Arc<dyn StoredCollection>>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("data_dir", &self.data_dir)
            .field("flush_on_shutdown", &self.flush_on_shutdown)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// A database that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            flush_on_shutdown: false,
            collections: Mutex::new(HashMap::new()),
        }
    }

    /// Opens the database described by `settings`, creating the data
    /// directory if needed.
    pub fn open(settings: &DatabaseSettings) -> StoreResult<Self> {
        if let Some(dir) = &settings.data_dir {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Self {
            data_dir: settings.data_dir.clone(),
            flush_on_shutdown: settings.flush_on_shutdown,
            collections: Mutex::new(HashMap::new()),
        })
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Returns the collection for `T`, loading its snapshot on first access.
    /// With a data directory the collection writes its snapshot on every
    /// mutation. Every call for the same document type yields a handle to the
    /// same documents.
    pub fn collection<T: Document>(&self) -> StoreResult<Collection<T>> {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(existing) = collections.get(T::COLLECTION) {
            return existing
                .as_any()
                .downcast_ref::<Collection<T>>()
                .cloned()
                .ok_or_else(|| {
                    StoreError::already_exists(T::COLLECTION, "registered with another type")
                });
        }

        let collection = match &self.data_dir {
            Some(dir) => {
                let path = snapshot_path(dir, T::COLLECTION);
                Collection::<T>::load(&path)?.persist_to(path)
            }
            None => Collection::<T>::new(),
        };
        collections.insert(T::COLLECTION, Arc::new(collection.clone()));
        Ok(collection)
    }

    /// Writes every opened collection to its snapshot file. No-op when the
    /// database is in memory only.
    pub async fn flush(&self) -> StoreResult<()> {
        let Some(dir) = &self.data_dir else {
            return Ok(());
        };

        let opened: Vec<(&'static str, Arc<dyn StoredCollection>)> = self
            .collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(name, collection)| (*name, Arc::clone(collection)))
            .collect();

        for (name, collection) in opened {
            let count = collection.flush_to(dir).await?;
            tracing::info!(target: "covers-db", collection = name, count, "snapshot written");
        }
        Ok(())
    }
}

/// Core module that owns the database lifecycle.
pub struct DatabaseModule {
    db: Arc<Database>,
}

impl DatabaseModule {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Module for DatabaseModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        match self.db.data_dir() {
            Some(dir) => tracing::info!(
                module = self.name(),
                data_dir = %dir.display(),
                "document store backed by snapshots"
            ),
            None => tracing::warn!(
                module = self.name(),
                "document store is in memory only; data is lost on shutdown"
            ),
        }
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        if self.db.flush_on_shutdown {
            self.db.flush().await?;
        }
        tracing::info!(module = self.name(), "db module stopped");
        Ok(())
    }
}

/// Create the core `db` module for `db`
pub fn create_module(db: Arc<Database>) -> Arc<dyn Module> {
    Arc::new(DatabaseModule::new(db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Shelf {
        id: Uuid,
        label: String,
    }

    impl Document for Shelf {
        const COLLECTION: &'static str = "shelves";

        fn id(&self) -> Uuid {
            self.id
        }
    }

    fn shelf(label: &str) -> Shelf {
        Shelf {
            id: Uuid::now_v7(),
            label: label.to_string(),
        }
    }

    #[tokio::test]
    async fn test_collection_handles_share_documents() {
        let db = Database::in_memory();
        let first = db.collection::<Shelf>().unwrap();
        let second = db.collection::<Shelf>().unwrap();

        let created = first.insert(shelf("fiction")).await.unwrap();
        assert_eq!(second.get(created.id).await, Some(created));
    }

    #[tokio::test]
    async fn test_flush_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let settings = DatabaseSettings {
            data_dir: Some(dir.path().to_path_buf()),
            flush_on_shutdown: true,
        };

        let db = Arc::new(Database::open(&settings).unwrap());
        let created = db
            .collection::<Shelf>()
            .unwrap()
            .insert(shelf("poetry"))
            .await
            .unwrap();

        let module = create_module(Arc::clone(&db));
        module.stop().await.unwrap();
        assert!(dir.path().join("shelves.json").exists());

        let reopened = Database::open(&settings).unwrap();
        let shelves = reopened.collection::<Shelf>().unwrap();
        assert_eq!(shelves.get(created.id).await, Some(created));
    }

    #[tokio::test]
    async fn test_writes_survive_without_stop() {
        let dir = tempfile::tempdir().unwrap();
        let settings = DatabaseSettings {
            data_dir: Some(dir.path().to_path_buf()),
            flush_on_shutdown: false,
        };

        let db = Database::open(&settings).unwrap();
        let created = db
            .collection::<Shelf>()
            .unwrap()
            .insert(shelf("memoir"))
            .await
            .unwrap();
        drop(db);

        let reopened = Database::open(&settings).unwrap();
        let shelves = reopened.collection::<Shelf>().unwrap();
        assert_eq!(shelves.get(created.id).await, Some(created));
    }

    #[tokio::test]
    async fn test_in_memory_flush_is_noop() {
        let db = Database::in_memory();
        db.collection::<Shelf>().unwrap();
        db.flush().await.unwrap();
        assert!(db.data_dir().is_none());
    }
}
