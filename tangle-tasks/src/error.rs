use std::convert::Infallible;

use tangle_core::RefId;
use thiserror::Error;

use crate::task::TaskState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("all {max} ids are in use")]
    Exhausted { max: u32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("you have no selected task")]
    NoSelection,

    #[error("this task is already {0}")]
    AlreadyInState(TaskState),

    #[error("task {0} not found")]
    NotFound(u32),

    #[error("task list is corrupt at task {0}")]
    CorruptList(u32),

    #[error("id error: {0}")]
    Id(#[from] IdError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] tangle_core::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("database references missing refids {0:?}")]
    Unresolved(Vec<RefId>),

    #[error("board error: {0}")]
    Board(#[from] BoardError),
}

impl From<Infallible> for StoreError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
