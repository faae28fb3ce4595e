use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;

use crate::dao::storage::{StorageError, StorageResult};

/// Durable string-keyed blob storage used to persist the session.
pub trait KeyValueStore: Send + Sync {
    /// Read the blob stored under `key`, `None` when nothing was written yet.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replace the blob stored under `key`.
    ///
    /// Runs synchronously on the caller's thread while the session lock is held,
    /// once per store update (every timer tick included). Implementations must
    /// finish in one short write and never await.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
}

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes are blocking `std::fs` calls on the runtime thread. The session blob
/// is a few kilobytes, one write-and-rename per update.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the blobs.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::unavailable(
                format!("failed to read `{}`", path.display()),
                err,
            )),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        fs::create_dir_all(&self.dir).map_err(|err| {
            StorageError::unavailable(
                format!("failed to create `{}`", self.dir.display()),
                err,
            )
        })?;

        // write-then-rename so a crash never leaves a half-written blob behind
        let path = self.path_for(key);
        let staging = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&staging, value)
            .and_then(|()| fs::rename(&staging, &path))
            .map_err(|err| {
                StorageError::unavailable(format!("failed to write `{}`", path.display()), err)
            })
    }
}

/// In-process store, used when no durable location is wanted and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again), simulating a full or read-only backend.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                format!("memory store rejected write of `{key}`"),
                io::Error::new(io::ErrorKind::StorageFull, "quota exceeded"),
            ));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.get("brainRingState").unwrap(), None);
        store.set("brainRingState", "{\"a\":1}").unwrap();
        store.set("brainRingState", "{\"a\":2}").unwrap();
        assert_eq!(
            store.get("brainRingState").unwrap().as_deref(),
            Some("{\"a\":2}")
        );
    }

    #[test]
    fn file_store_leaves_only_the_final_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        for round in 0..5 {
            store.set("brainRingState", &format!("{{\"round\":{round}}}")).unwrap();
        }

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["brainRingState.json".to_string()]);
        assert_eq!(
            store.get("brainRingState").unwrap().as_deref(),
            Some("{\"round\":4}")
        );
    }

    #[test]
    fn memory_store_can_simulate_outage() {
        let store = MemoryStore::new();
        store.set("k", "v1").unwrap();

        store.set_unavailable(true);
        assert!(matches!(
            store.set("k", "v2"),
            Err(StorageError::Unavailable { .. })
        ));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v1"));

        store.set_unavailable(false);
        store.set("k", "v3").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v3"));
    }
}
