use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{Document, StoreError, StoreResult};

/// Typed set of documents keyed by [`Document::id`].
///
/// Cloning is cheap and yields a handle to the same underlying documents.
///
/// A collection bound to a snapshot file rewrites it before every mutating
/// call returns. A failed write leaves the in-memory documents unchanged.
#[derive(Debug)]
pub struct Collection<T> {
    docs: Arc<RwLock<HashMap<Uuid, T>>>,
    snapshot: Option<Arc<PathBuf>>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            docs: Arc::clone(&self.docs),
            snapshot: self.snapshot.clone(),
        }
    }
}

impl<T: Document> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Document> Collection<T> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::from_documents(Vec::new())
    }

    /// Creates a collection pre-populated with `docs`. Later duplicates of an
    /// id replace earlier ones.
    pub fn from_documents(docs: Vec<T>) -> Self {
        let map = docs.into_iter().map(|doc| (doc.id(), doc)).collect();
        Self {
            docs: Arc::new(RwLock::new(map)),
            snapshot: None,
        }
    }

    /// Binds the collection to `path` so each insert, update and removal is
    /// written there before it is acknowledged.
    pub fn persist_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot = Some(Arc::new(path.into()));
        self
    }

    /// Reads a snapshot file. A missing file yields an empty collection.
    pub fn load(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read(path)?;
        let docs: Vec<T> = serde_json::from_slice(&raw)?;
        tracing::debug!(
            collection = T::COLLECTION,
            path = %path.display(),
            count = docs.len(),
            "loaded snapshot"
        );
        Ok(Self::from_documents(docs))
    }

    /// Writes every document to `path` as a JSON array ordered by id.
    /// The file is replaced atomically via a sibling temp file.
    pub async fn write_snapshot(&self, path: &Path) -> StoreResult<usize> {
        let docs = self.docs.read().await;
        write_documents(path, &docs).await
    }

    async fn commit(&self, docs: &HashMap<Uuid, T>) -> StoreResult<()> {
        if let Some(path) = &self.snapshot {
            write_documents(path, docs).await?;
        }
        Ok(())
    }

    /// Inserts a new document.
    pub async fn insert(&self, doc: T) -> StoreResult<T> {
        self.insert_unique(doc, |_, _| false).await
    }

    /// Inserts a new document unless an existing one `conflicts` with it.
    /// `conflicts` receives `(existing, candidate)`.
    pub async fn insert_unique<F>(&self, doc: T, conflicts: F) -> StoreResult<T>
    where
        F: Fn(&T, &T) -> bool,
    {
        let mut docs = self.docs.write().await;
        let id = doc.id();
        if docs.contains_key(&id) || docs.values().any(|existing| conflicts(existing, &doc)) {
            return Err(StoreError::already_exists(T::COLLECTION, id.to_string()));
        }
        docs.insert(id, doc.clone());
        if let Err(err) = self.commit(&docs).await {
            docs.remove(&id);
            return Err(err);
        }
        Ok(doc)
    }

    /// Gets a document by id.
    pub async fn get(&self, id: Uuid) -> Option<T> {
        self.docs.read().await.get(&id).cloned()
    }

    /// Applies `apply` to a copy of the document and stores the copy only if
    /// `apply` succeeds. The write lock is held throughout, so concurrent
    /// updates of the same collection observe each other's results.
    pub async fn update<F, E>(&self, id: Uuid, apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut T) -> Result<(), E>,
        E: From<StoreError>,
    {
        let mut docs = self.docs.write().await;
        let current = docs
            .get(&id)
            .ok_or_else(|| StoreError::not_found(T::COLLECTION, id.to_string()))?;

        let mut next = current.clone();
        apply(&mut next)?;
        let previous = docs.insert(id, next.clone());
        if let Err(err) = self.commit(&docs).await {
            if let Some(previous) = previous {
                docs.insert(id, previous);
            }
            return Err(err.into());
        }
        Ok(next)
    }

    /// Removes a document after `check` approves it.
    pub async fn remove_if<F, E>(&self, id: Uuid, check: F) -> Result<T, E>
    where
        F: FnOnce(&T) -> Result<(), E>,
        E: From<StoreError>,
    {
        let mut docs = self.docs.write().await;
        let current = docs
            .get(&id)
            .ok_or_else(|| StoreError::not_found(T::COLLECTION, id.to_string()))?;
        check(current)?;
        let removed = docs
            .remove(&id)
            .ok_or_else(|| StoreError::not_found(T::COLLECTION, id.to_string()))?;
        if let Err(err) = self.commit(&docs).await {
            docs.insert(id, removed);
            return Err(err.into());
        }
        Ok(removed)
    }

    /// Returns all documents matching `predicate`, ordered by id.
    pub async fn find<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        let docs = self.docs.read().await;
        let mut found: Vec<T> = docs.values().filter(|d| predicate(d)).cloned().collect();
        found.sort_by_key(|d| d.id());
        found
    }

    /// Returns the first document matching `predicate`.
    pub async fn find_one<F>(&self, predicate: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        self.docs.read().await.values().find(|d| predicate(d)).cloned()
    }

    /// Returns all documents, ordered by id.
    pub async fn all(&self) -> Vec<T> {
        self.find(|_| true).await
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

/// Writes `docs` to `path` as a JSON array ordered by id, replacing the file
/// atomically via a sibling temp file.
async fn write_documents<T: Document>(path: &Path, docs: &HashMap<Uuid, T>) -> StoreResult<usize> {
    let mut ordered: Vec<&T> = docs.values().collect();
    ordered.sort_by_key(|d| d.id());
    let bytes = serde_json::to_vec_pretty(&ordered)?;

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;

    Ok(ordered.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: Uuid,
        slug: String,
        hits: u32,
    }

    impl Document for Note {
        const COLLECTION: &'static str = "notes";

        fn id(&self) -> Uuid {
            self.id
        }
    }

    fn note(slug: &str) -> Note {
        Note {
            id: Uuid::now_v7(),
            slug: slug.to_string(),
            hits: 0,
        }
    }

    #[derive(Debug, PartialEq)]
    enum NoteError {
        Store(String),
        TooHot,
    }

    impl From<StoreError> for NoteError {
        fn from(e: StoreError) -> Self {
            NoteError::Store(e.to_string())
        }
    }

    #[tokio::test]
    async fn test_note_crud() {
        let notes = Collection::<Note>::new();

        let created = notes.insert(note("first")).await.unwrap();
        assert_eq!(notes.get(created.id).await, Some(created.clone()));
        assert_eq!(notes.len().await, 1);

        let duplicate = notes.insert(created.clone()).await;
        assert!(matches!(duplicate, Err(StoreError::AlreadyExists { .. })));

        let removed = notes
            .remove_if(created.id, |_| Ok::<_, StoreError>(()))
            .await
            .unwrap();
        assert_eq!(removed.slug, "first");
        assert!(notes.get(created.id).await.is_none());
        assert!(notes.is_empty().await);
    }

    #[tokio::test]
    async fn test_insert_unique_checks_predicate() {
        let notes = Collection::<Note>::new();
        notes.insert(note("taken")).await.unwrap();

        let result = notes
            .insert_unique(note("taken"), |existing, new| existing.slug == new.slug)
            .await;
        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));

        notes
            .insert_unique(note("free"), |existing, new| existing.slug == new.slug)
            .await
            .unwrap();
        assert_eq!(notes.len().await, 2);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_document_untouched() {
        let notes = Collection::<Note>::new();
        let created = notes.insert(note("warm")).await.unwrap();

        let updated = notes
            .update(created.id, |n| {
                n.hits += 1;
                Ok::<_, NoteError>(())
            })
            .await
            .unwrap();
        assert_eq!(updated.hits, 1);

        let rejected = notes
            .update(created.id, |n| {
                n.hits += 100;
                Err(NoteError::TooHot)
            })
            .await;
        assert_eq!(rejected, Err(NoteError::TooHot));
        assert_eq!(notes.get(created.id).await.unwrap().hits, 1);
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let notes = Collection::<Note>::new();
        let result = notes
            .update(Uuid::now_v7(), |_| Ok::<_, NoteError>(()))
            .await;
        assert!(matches!(result, Err(NoteError::Store(_))));
    }

    #[tokio::test]
    async fn test_remove_if_respects_check() {
        let notes = Collection::<Note>::new();
        let created = notes.insert(note("keep")).await.unwrap();

        let refused = notes
            .remove_if(created.id, |_| Err::<(), _>(NoteError::TooHot))
            .await;
        assert_eq!(refused.unwrap_err(), NoteError::TooHot);
        assert!(notes.get(created.id).await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_serialized() {
        let notes = Collection::<Note>::new();
        let created = notes.insert(note("counter")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let notes = notes.clone();
            handles.push(tokio::spawn(async move {
                notes
                    .update(created.id, |n| {
                        n.hits += 1;
                        Ok::<_, StoreError>(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(notes.get(created.id).await.unwrap().hits, 32);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");

        let notes = Collection::<Note>::new();
        let a = notes.insert(note("a")).await.unwrap();
        let b = notes.insert(note("b")).await.unwrap();
        assert_eq!(notes.write_snapshot(&path).await.unwrap(), 2);

        let mut expected = vec![a, b];
        expected.sort_by_key(|n| n.id);

        let reloaded = Collection::<Note>::load(&path).unwrap();
        assert_eq!(reloaded.all().await, expected);
    }

    #[tokio::test]
    async fn test_bound_snapshot_follows_every_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        let notes = Collection::<Note>::new().persist_to(&path);

        let created = notes.insert(note("kept")).await.unwrap();
        let reloaded = Collection::<Note>::load(&path).unwrap();
        assert_eq!(reloaded.get(created.id).await, Some(created.clone()));

        notes
            .update(created.id, |n| {
                n.hits = 7;
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap();
        let reloaded = Collection::<Note>::load(&path).unwrap();
        assert_eq!(reloaded.get(created.id).await.unwrap().hits, 7);

        notes
            .remove_if(created.id, |_| Ok::<_, StoreError>(()))
            .await
            .unwrap();
        let reloaded = Collection::<Note>::load(&path).unwrap();
        assert!(reloaded.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_snapshot_write_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let notes = Collection::<Note>::new().persist_to(dir.path().join("missing/notes.json"));

        let result = notes.insert(note("lost")).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(notes.is_empty().await);
    }

    #[test]
    fn test_load_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let notes = Collection::<Note>::load(&dir.path().join("absent.json")).unwrap();
        assert!(notes.docs.try_read().unwrap().is_empty());
    }
}
