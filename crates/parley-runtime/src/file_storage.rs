//! Filesystem snapshot storage
//!
//! One file per key inside a directory. Writes go to a uniquely named
//! temporary file that is renamed over the target, so a crash mid-write
//! leaves the previous snapshot intact.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parley_core::{MemoryStorage, ParleyResult, SnapshotStorage, StorageError};
use tracing::debug;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// File Storage
// ----------------------------------------------------------------------------

/// `SnapshotStorage` keeping each key in `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` for snapshots, creating it if needed
    pub fn new<P: Into<PathBuf>>(dir: P) -> ParleyResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(StorageError::from)?;
        debug!(dir = %dir.display(), "File storage ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> ParleyResult<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            }
            .into());
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl SnapshotStorage for FileStorage {
    fn store(&mut self, key: &str, data: Vec<u8>) -> ParleyResult<()> {
        let target = self.path_for(key)?;
        let temp = self.dir.join(format!(".{}.{}.tmp", key, Uuid::new_v4()));

        let written = fs::File::create(&temp)
            .and_then(|mut file| {
                file.write_all(&data)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&temp, &target));

        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(StorageError::from(e).into());
        }
        debug!(key, bytes = data.len(), "Snapshot written");
        Ok(())
    }

    fn retrieve(&self, key: &str) -> ParleyResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }

    fn delete(&mut self, key: &str) -> ParleyResult<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }

    fn is_available(&self) -> bool {
        self.dir.is_dir()
    }
}

// ----------------------------------------------------------------------------
// Storage Backend
// ----------------------------------------------------------------------------

/// Storage chosen at runtime from configuration
#[derive(Debug, Clone)]
pub enum StorageBackend {
    Memory(MemoryStorage),
    File(FileStorage),
}

impl StorageBackend {
    /// File storage in `dir`, or memory storage when `dir` is `None`
    pub fn from_dir(dir: Option<&Path>) -> ParleyResult<Self> {
        match dir {
            Some(dir) => Ok(StorageBackend::File(FileStorage::new(dir)?)),
            None => Ok(StorageBackend::Memory(MemoryStorage::new())),
        }
    }
}

impl From<MemoryStorage> for StorageBackend {
    fn from(storage: MemoryStorage) -> Self {
        StorageBackend::Memory(storage)
    }
}

impl From<FileStorage> for StorageBackend {
    fn from(storage: FileStorage) -> Self {
        StorageBackend::File(storage)
    }
}

impl SnapshotStorage for StorageBackend {
    fn store(&mut self, key: &str, data: Vec<u8>) -> ParleyResult<()> {
        match self {
            StorageBackend::Memory(storage) => storage.store(key, data),
            StorageBackend::File(storage) => storage.store(key, data),
        }
    }

    fn retrieve(&self, key: &str) -> ParleyResult<Option<Vec<u8>>> {
        match self {
            StorageBackend::Memory(storage) => storage.retrieve(key),
            StorageBackend::File(storage) => storage.retrieve(key),
        }
    }

    fn delete(&mut self, key: &str) -> ParleyResult<()> {
        match self {
            StorageBackend::Memory(storage) => storage.delete(key),
            StorageBackend::File(storage) => storage.delete(key),
        }
    }

    fn is_available(&self) -> bool {
        match self {
            StorageBackend::Memory(storage) => storage.is_available(),
            StorageBackend::File(storage) => storage.is_available(),
        }
    }
}
