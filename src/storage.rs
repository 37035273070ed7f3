//! The single durable slot a ledger is written to.

use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum StorageError {
    #[error("invalid ledger path {0:?}")]
    InvalidPath(PathBuf),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One ledger slot per installation.
///
/// Implementations serialize access to the slot, so a save and a load
/// issued from different threads never interleave.
pub trait LedgerStore: Send + Sync {
    /// Returns `None` when nothing has ever been saved.
    fn read(&self) -> Result<Option<String>, StorageError>;

    /// Replaces the slot contents. Readers observe either the old or the new
    /// document, never a partial one.
    fn write(&self, contents: &str) -> Result<(), StorageError>;
}

fn lock(slot: &Mutex<()>) -> MutexGuard<'_, ()> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct FileStore {
    path: PathBuf,
    slot: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        if path.as_os_str().is_empty() || path.file_name().is_none() || path.is_dir() {
            return Err(StorageError::InvalidPath(path));
        }

        Ok(Self {
            path,
            slot: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl LedgerStore for FileStore {
    fn read(&self) -> Result<Option<String>, StorageError> {
        let _slot = lock(&self.slot);

        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "no ledger saved yet");
                Ok(None)
            }
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        let _slot = lock(&self.slot);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }

        let tmp = self.temp_path();

        let written =
            write_synced(&tmp, contents).and_then(|()| std::fs::rename(&tmp, &self.path));

        if let Err(err) = written {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                debug!(path = ?tmp, "temporary ledger not removed: {cleanup}");
            }

            return Err(self.io_error(err));
        }

        debug!(path = ?self.path, bytes = contents.len(), "ledger written");

        Ok(())
    }
}

fn write_synced(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

/// Keeps the ledger in memory, like a preferences key that outlives the
/// scene but not the process.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(contents.into())),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LedgerStore for MemoryStore {
    fn read(&self) -> Result<Option<String>, StorageError> {
        Ok(self.contents())
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("ledger.json")).unwrap();

        assert_eq!(store.read().unwrap(), None);
    }

    #[test]
    fn write_replaces_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested/ledger.json")).unwrap();

        store.write("first").unwrap();
        store.write("second").unwrap();

        assert_eq!(store.read().unwrap().as_deref(), Some("second"));
        assert!(!dir.path().join("nested/ledger.json.tmp").exists());
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = FileStore::new(&path).unwrap();

        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("occupant"), "x").unwrap();

        assert!(matches!(store.write("doc"), Err(StorageError::Io { .. })));
        assert!(!dir.path().join("ledger.json.tmp").exists());
    }

    #[test]
    fn empty_write_is_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("ledger.txt")).unwrap();

        store.write("").unwrap();

        assert_eq!(store.read().unwrap().as_deref(), Some(""));
    }

    #[test]
    fn rejects_directory_and_empty_paths() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            FileStore::new(dir.path()),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            FileStore::new(""),
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        assert_eq!(store.read().unwrap(), None);

        store.write("abc").unwrap();
        assert_eq!(store.read().unwrap().as_deref(), Some("abc"));
    }
}
