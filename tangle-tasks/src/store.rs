use std::convert::Infallible;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use log::debug;

/// Backing storage holding one encoded document.
pub trait Store {
    type Error;

    /// Returns the stored bytes, empty if nothing was saved.
    fn read(&self) -> Result<Vec<u8>, Self::Error>;

    /// Replaces the stored bytes.
    fn write(&self, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// In-memory store, for tests and throwaway boards.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    type Error = Infallible;

    fn read(&self) -> Result<Vec<u8>, Self::Error> {
        Ok(self
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn write(&self, bytes: &[u8]) -> Result<(), Self::Error> {
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = bytes.to_vec();
        Ok(())
    }
}

/// A single file, truncated and rewritten on every save.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Opens the file at `path`, creating it and its parent directory if
    /// they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        open_rw(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_rw(path: &Path) -> Result<File, std::io::Error> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

impl Store for FileStore {
    type Error = std::io::Error;

    fn read(&self) -> Result<Vec<u8>, Self::Error> {
        let mut bytes = Vec::new();
        open_rw(&self.path)?.read_to_end(&mut bytes)?;
        debug!("read {} bytes from {}", bytes.len(), self.path.display());
        Ok(bytes)
    }

    fn write(&self, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut file = open_rw(&self.path)?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(bytes)?;
        file.sync_all()?;
        debug!("wrote {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (FileStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("nested").join("db.json")).unwrap();
        (store, dir)
    }

    #[test]
    fn memory_write_read() {
        let store = MemoryStore::new();
        assert!(store.read().unwrap().is_empty());
        store.write(b"hello").unwrap();
        assert_eq!(store.read().unwrap(), b"hello");
    }

    #[test]
    fn open_creates_empty_file() {
        let (store, _dir) = temp_store();
        assert!(store.path().exists());
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn write_truncates() {
        let (store, _dir) = temp_store();
        store.write(b"a longer document").unwrap();
        store.write(b"short").unwrap();
        assert_eq!(store.read().unwrap(), b"short");
        store.write(b"").unwrap();
        assert_eq!(fs::metadata(store.path()).unwrap().len(), 0);
    }

    #[test]
    fn persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        FileStore::open(&path).unwrap().write(b"data survives restart").unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.read().unwrap(), b"data survives restart");
    }
}
