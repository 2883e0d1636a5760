//! A doubly linked task list persisted through the tangle codec.
//!
//! The list is a cyclic graph (every task points at both neighbors), which
//! is what the codec exists for: a board is saved as one node tree rooted at
//! its head task and loaded back into the same shape.

mod board;
mod config;
mod error;
mod ids;
mod repository;
mod store;
mod task;

pub use board::Board;
pub use config::{StoreConfig, WireFormat, default_database_path};
pub use error::{BoardError, IdError, StoreError};
pub use ids::{DEFAULT_MAX_ID, IdAllocator};
pub use repository::{FileRepository, Repository};
pub use store::{FileStore, MemoryStore, Store};
pub use task::{Task, TaskState};
