use std::path::Path;

use log::debug;
use tangle_core::{Shared, materialize, resolve, wire};

use crate::board::Board;
use crate::config::{StoreConfig, WireFormat};
use crate::error::StoreError;
use crate::store::{FileStore, Store};
use crate::task::Task;

/// Saves and loads a [`Board`] through a [`Store`].
///
/// The whole list is written as one document rooted at the head task.
#[derive(Debug)]
pub struct Repository<S> {
    store: S,
    format: WireFormat,
}

pub type FileRepository = Repository<FileStore>;

impl FileRepository {
    pub fn open(path: impl AsRef<Path>, format: WireFormat) -> Result<Self, StoreError> {
        Ok(Self::new(FileStore::open(path)?, format))
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::open(config.database_path(), config.format)
    }
}

impl<S: Store> Repository<S>
where
    StoreError: From<S::Error>,
{
    pub fn new(store: S, format: WireFormat) -> Self {
        Self { store, format }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Writes the board, replacing what was stored. An empty board stores
    /// nothing.
    pub fn save(&self, board: &Board) -> Result<(), StoreError> {
        let Some(root) = board.root() else {
            self.store.write(&[])?;
            return Ok(());
        };

        let node = tangle_core::serialize(root)?;
        let bytes = match self.format {
            WireFormat::Json => wire::encode_json(&node)?,
            WireFormat::Cbor => wire::encode_cbor(&node)?,
        };
        self.store.write(&bytes)?;
        debug!("saved {} nodes as {}", node.size(), self.format);
        Ok(())
    }

    /// Replaces the board's list with the stored one. Does nothing if the
    /// store is empty.
    pub fn load(&self, board: &mut Board) -> Result<(), StoreError> {
        let bytes = self.store.read()?;
        if bytes.is_empty() {
            debug!("store is empty, nothing to load");
            return Ok(());
        }

        let node = match self.format {
            WireFormat::Json => wire::decode_json(&bytes)?,
            WireFormat::Cbor => wire::decode_cbor(&bytes)?,
        };
        let tree = resolve(node);
        if tree.has_unresolved() {
            return Err(StoreError::Unresolved(tree.unresolved()));
        }

        let root: Shared<Task> = materialize(&tree)?;
        board.restore(root)?;
        Ok(())
    }
}
