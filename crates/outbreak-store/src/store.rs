use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// A JSON document kept in memory and persisted atomically.
///
/// Callers mutate the document through [`Store::lock`] and then call
/// [`Store::save`] once the change is logically complete. Every save writes
/// the whole document to a temporary file in the same directory, syncs it,
/// and renames it over the old one, so a reader never sees a partial write.
///
/// Two locks are involved: the document lock, and an I/O lock serializing
/// loads and saves. The I/O lock is always taken first, so a document guard
/// must be dropped before calling [`Store::save`] or [`Store::load`].
/// A [`Transaction`] holds both locks at once when a change and its save
/// must not be interleaved with other writers.
#[derive(Debug)]
pub struct Store<D> {
    path: PathBuf,
    doc: Mutex<D>,
    io: Arc<Mutex<()>>,
}

/// A fully written and synced temporary file that has not yet replaced the
/// document. Holds the I/O lock until committed or dropped.
#[derive(Debug)]
pub struct Staged {
    file: NamedTempFile,
    path: PathBuf,
    _io: OwnedMutexGuard<()>,
}

impl Staged {
    /// Where the staged bytes currently live.
    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    /// Atomically replace the document with the staged file.
    pub async fn commit(self) -> StoreResult<()> {
        let Staged { file, path, _io } = self;
        tokio::task::spawn_blocking(move || replace(file, &path)).await??;
        Ok(())
    }
}

/// Exclusive access to the document from the first change until it is
/// saved. Other writers wait until the transaction is dropped.
#[derive(Debug)]
pub struct Transaction<'a, D> {
    path: &'a Path,
    doc: MutexGuard<'a, D>,
    _io: MutexGuard<'a, ()>,
}

impl<D> Deref for Transaction<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.doc
    }
}

impl<D> DerefMut for Transaction<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.doc
    }
}

impl<D: Serialize> Transaction<'_, D> {
    /// Persist the document as it stands in this transaction. On error the
    /// file on disk is unchanged and the caller still holds the document.
    pub async fn save(&self) -> StoreResult<()> {
        let bytes = serde_json::to_vec(&*self.doc).map_err(StoreError::Encode)?;
        write_bytes(self.path, bytes).await
    }
}

impl<D> Store<D>
where
    D: Serialize + DeserializeOwned + Send + 'static,
{
    /// Open the document at `path`. If no file exists, `init` is called once
    /// to build the initial document; nothing is written until the first
    /// save. An existing file that fails to decode is an error.
    pub fn open<F>(path: impl Into<PathBuf>, init: F) -> StoreResult<Self>
    where
        F: FnOnce() -> D,
    {
        let path = path.into();
        let doc = match read_document(&path)? {
            Some(doc) => {
                info!(path = %path.display(), "document loaded");
                doc
            }
            None => {
                info!(path = %path.display(), "no document on disk, initializing");
                init()
            }
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
            io: Arc::new(Mutex::new(())),
        })
    }

    /// Where the document is persisted.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the in-memory document.
    pub async fn lock(&self) -> MutexGuard<'_, D> {
        self.doc.lock().await
    }

    /// Replace the in-memory document with the one on disk. Returns `false`,
    /// leaving memory untouched, if there is no file yet.
    pub async fn load(&self) -> StoreResult<bool> {
        let _io = self.io.lock().await;
        let path = self.path.clone();
        let loaded = tokio::task::spawn_blocking(move || read_document::<D>(&path)).await??;
        match loaded {
            Some(doc) => {
                *self.doc.lock().await = doc;
                debug!(path = %self.path.display(), "document reloaded");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Persist the current document.
    ///
    /// The temp-write-then-replace sequence runs on a blocking task, so it
    /// completes even if this future is dropped part way.
    pub async fn save(&self) -> StoreResult<()> {
        let _io = self.io.lock().await;
        let bytes = self.encode().await?;
        write_bytes(&self.path, bytes).await
    }

    /// Take both locks, I/O first. See [`Transaction`].
    pub async fn transaction(&self) -> Transaction<'_, D> {
        let io = self.io.lock().await;
        let doc = self.doc.lock().await;
        Transaction {
            path: &self.path,
            doc,
            _io: io,
        }
    }

    /// Write the current document to a synced temporary file without
    /// replacing the old one. [`Staged::commit`] finishes the save.
    pub async fn stage(&self) -> StoreResult<Staged> {
        let io = Arc::clone(&self.io).lock_owned().await;
        let bytes = self.encode().await?;
        let path = self.path.clone();
        let target = path.clone();
        let file = tokio::task::spawn_blocking(move || stage_bytes(&target, &bytes)).await??;
        Ok(Staged { file, path, _io: io })
    }

    /// Read one top-level field. Absent and null fields read as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let tree = self.tree().await?;
        match tree.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|source| StoreError::Key {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Read one top-level field, falling back to `default`.
    pub async fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> StoreResult<T> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Replace one top-level field and persist.
    pub async fn put<T: Serialize>(&self, key: &str, value: T) -> StoreResult<()> {
        {
            let mut doc = self.doc.lock().await;
            let mut tree = serde_json::to_value(&*doc).map_err(StoreError::Encode)?;
            let Some(fields) = tree.as_object_mut().filter(|f| f.contains_key(key)) else {
                return Err(StoreError::UnknownKey(key.to_string()));
            };
            let value = serde_json::to_value(value).map_err(|source| StoreError::Key {
                key: key.to_string(),
                source,
            })?;
            fields.insert(key.to_string(), value);
            *doc = serde_json::from_value(tree).map_err(|source| StoreError::Key {
                key: key.to_string(),
                source,
            })?;
        }
        self.save().await
    }

    /// Reset one top-level field to its default and persist. Returns `false`
    /// if the document has no such field.
    pub async fn remove(&self, key: &str) -> StoreResult<bool> {
        {
            let mut doc = self.doc.lock().await;
            let mut tree = serde_json::to_value(&*doc).map_err(StoreError::Encode)?;
            let removed = tree
                .as_object_mut()
                .and_then(|fields| fields.remove(key))
                .is_some();
            if !removed {
                return Ok(false);
            }
            *doc = serde_json::from_value(tree).map_err(|source| StoreError::Key {
                key: key.to_string(),
                source,
            })?;
        }
        self.save().await?;
        Ok(true)
    }

    async fn encode(&self) -> StoreResult<Vec<u8>> {
        let doc = self.doc.lock().await;
        serde_json::to_vec(&*doc).map_err(StoreError::Encode)
    }

    async fn tree(&self) -> StoreResult<Value> {
        let doc = self.doc.lock().await;
        serde_json::to_value(&*doc).map_err(StoreError::Encode)
    }
}

async fn write_bytes(path: &Path, bytes: Vec<u8>) -> StoreResult<()> {
    let len = bytes.len();
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = stage_bytes(&target, &bytes)?;
        replace(file, &target)
    })
    .await??;
    debug!(path = %path.display(), bytes = len, "document saved");
    Ok(())
}

fn read_document<D: DeserializeOwned>(path: &Path) -> StoreResult<Option<D>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn stage_bytes(path: &Path, bytes: &[u8]) -> StoreResult<NamedTempFile> {
    let dir = parent_dir(path);
    let io_err = |source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;
    let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.as_file().sync_all().map_err(io_err)?;
    Ok(file)
}

fn replace(file: NamedTempFile, path: &Path) -> StoreResult<()> {
    file.persist(path).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, Utc};
    use outbreak_core::{Document, Item, Participant, ParticipantId, Stats};
    use tempfile::TempDir;

    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn catalog() -> Vec<Item> {
        vec![Item::new("mask", "Mask", 5, "masked = true").unlocked(true)]
    }

    fn populated() -> Document {
        let mut doc = Document::with_catalog(catalog());
        let mut p = Participant::with_immunity(ParticipantId(7), false);
        p.infect(at("2020-02-10T12:00:00Z"));
        p.acquire("mask", 1);
        doc.participants.insert(p.member_id(), p);
        doc.stats.infected = 1;
        doc.next_cycle = Some(at("2020-02-11T00:00:00Z"));
        doc
    }

    #[tokio::test]
    async fn absent_file_initializes_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("virus.json");
        let calls = AtomicUsize::new(0);
        let store = Store::open(&path, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Document::with_catalog(catalog())
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!path.exists());
        assert_eq!(store.lock().await.store.len(), 1);
    }

    #[tokio::test]
    async fn saved_document_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("virus.json");
        let store = Store::open(&path, populated).unwrap();
        store.save().await.unwrap();

        let reopened: Store<Document> = Store::open(&path, || panic!("file exists")).unwrap();
        assert_eq!(*reopened.lock().await, populated());
    }

    #[tokio::test]
    async fn corrupt_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("virus.json");
        std::fs::write(&path, "{\"stats\": {\"infected\": ").unwrap();
        let err = Store::<Document>::open(&path, Document::default).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn unknown_discriminator_on_disk_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("virus.json");
        std::fs::write(&path, r#"{"stats":{"data_type":"weather","rain":true}}"#).unwrap();
        let err = Store::<Document>::open(&path, Document::default).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn interrupted_save_leaves_previous_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("virus.json");
        let store = Store::open(&path, populated).unwrap();
        store.save().await.unwrap();

        store.lock().await.stats.dead = 99;
        let staged = store.stage().await.unwrap();
        let temp = staged.temp_path().to_path_buf();
        // simulate the process dying before the rename
        std::mem::forget(staged);

        assert!(temp.exists());
        let reopened: Store<Document> = Store::open(&path, Document::default).unwrap();
        assert_eq!(*reopened.lock().await, populated());
    }

    #[tokio::test]
    async fn staged_commit_replaces_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("virus.json");
        let store = Store::open(&path, populated).unwrap();
        store.lock().await.stats.cured = 3;
        let staged = store.stage().await.unwrap();
        let temp = staged.temp_path().to_path_buf();
        staged.commit().await.unwrap();
        assert!(!temp.exists());

        let reopened: Store<Document> = Store::open(&path, Document::default).unwrap();
        assert_eq!(reopened.lock().await.stats.cured, 3);
    }

    #[tokio::test]
    async fn load_discards_unsaved_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("virus.json");
        let store = Store::open(&path, populated).unwrap();
        store.save().await.unwrap();
        store.lock().await.participants.clear();
        assert!(store.load().await.unwrap());
        assert_eq!(store.lock().await.participants.len(), 1);
    }

    #[tokio::test]
    async fn keyed_access() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("virus.json");
        let store = Store::open(&path, populated).unwrap();

        let stats: Stats = store.get("stats").await.unwrap().unwrap();
        assert_eq!(stats.infected, 1);

        let started: Option<DateTime<Utc>> = store.get("event_started").await.unwrap();
        assert!(started.is_none());
        let fallback = store.get_or("event_started", at("2020-01-01T00:00:00Z")).await.unwrap();
        assert_eq!(fallback, at("2020-01-01T00:00:00Z"));

        store
            .put("event_started", at("2020-02-09T00:00:00Z"))
            .await
            .unwrap();
        let on_disk: Store<Document> = Store::open(&path, Document::default).unwrap();
        assert_eq!(
            on_disk.lock().await.event_started,
            Some(at("2020-02-09T00:00:00Z"))
        );

        assert!(store.remove("next_cycle").await.unwrap());
        assert!(store.lock().await.next_cycle.is_none());
        assert!(!store.remove("no_such_field").await.unwrap());

        let err = store.put("no_such_field", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownKey(_)));
    }

    #[tokio::test]
    async fn put_rejects_wrong_shape() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("virus.json"), populated).unwrap();
        let err = store.put("next_cycle", "not a timestamp").await.unwrap_err();
        assert!(matches!(err, StoreError::Key { .. }));
        assert!(store.lock().await.next_cycle.is_some());
    }

    #[tokio::test]
    async fn concurrent_saves_keep_the_file_valid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("virus.json");
        let store = Arc::new(Store::open(&path, populated).unwrap());

        let mut tasks = Vec::new();
        for n in 0..16u64 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store.lock().await.stats.healers += n;
                store.save().await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let reopened: Store<Document> = Store::open(&path, Document::default).unwrap();
        assert_eq!(reopened.lock().await.stats.healers, (0..16).sum::<u64>());
    }

    #[tokio::test]
    async fn failed_transaction_rolls_back_without_losing_waiting_writers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("virus.json");
        let store = Arc::new(Store::open(&path, populated).unwrap());
        // A directory in the way makes every save fail.
        std::fs::create_dir(&path).unwrap();

        let mut tx = store.transaction().await;
        let previous = tx.clone();
        tx.stats.dead = 5;

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store.lock().await.stats.cured += 1;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!writer.is_finished());

        assert!(matches!(tx.save().await, Err(StoreError::Io { .. })));
        *tx = previous;
        drop(tx);
        writer.await.unwrap();

        let doc = store.lock().await;
        assert_eq!(doc.stats.dead, 0);
        assert_eq!(doc.stats.cured, 1);
    }

    #[tokio::test]
    async fn transaction_save_persists_its_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("virus.json");
        let store = Store::open(&path, populated).unwrap();
        {
            let mut tx = store.transaction().await;
            tx.stats.healers = 3;
            tx.save().await.unwrap();
        }
        let reopened: Store<Document> = Store::open(&path, Document::default).unwrap();
        assert_eq!(reopened.lock().await.stats.healers, 3);
    }
}
