use crate::collaborators::BlockTreeError;
use crate::primitives::hash::Hash;
use anyhow::Error as AnyError;
use std::fmt;

/// Error that aborts processing of a single block-data item.
///
/// The worker loop logs these and moves on to the next item; they never stop the loop.
#[derive(Debug)]
pub enum ProcessError {
    NilBlockData,
    NilBlock,
    HeaderVerification(AnyError),
    MissingBlockData { hash: Hash },
    BlockState {
        operation: &'static str,
        source: AnyError,
    },
    ParentNotFound { parent: Hash },
    BlockTree(BlockTreeError),
    StorageState(AnyError),
    MissingStorageState { root: Hash },
    StateRootMismatch { expected: Hash, actual: Hash },
    Runtime(AnyError),
    Execution(AnyError),
    Import(AnyError),
    CompareAndSet(AnyError),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::NilBlockData => write!(f, "got nil BlockData"),
            ProcessError::NilBlock => write!(f, "block or body is nil"),
            ProcessError::HeaderVerification(source) => {
                write!(f, "could not verify block: {source}")
            }
            ProcessError::MissingBlockData { hash } => {
                write!(f, "missing/inconsistent block data for block {hash}")
            }
            ProcessError::BlockState { operation, source } => {
                write!(f, "block state {operation} failed: {source}")
            }
            ProcessError::ParentNotFound { parent } => {
                write!(f, "failed to get parent header {parent}")
            }
            ProcessError::BlockTree(source) => {
                write!(f, "failed to add block to block tree: {source}")
            }
            ProcessError::StorageState(source) => {
                write!(f, "failed to load storage state: {source}")
            }
            ProcessError::MissingStorageState { root } => {
                write!(f, "no storage state for state root {root}")
            }
            ProcessError::StateRootMismatch { expected, actual } => write!(
                f,
                "parent state root {expected} does not match snapshot state root {actual}"
            ),
            ProcessError::Runtime(source) => write!(f, "failed to get runtime: {source}"),
            ProcessError::Execution(source) => write!(f, "failed to execute block: {source}"),
            ProcessError::Import(source) => write!(f, "failed to handle block import: {source}"),
            ProcessError::CompareAndSet(source) => {
                write!(f, "failed to compare and set data: {source}")
            }
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProcessError::HeaderVerification(source)
            | ProcessError::BlockState { source, .. }
            | ProcessError::StorageState(source)
            | ProcessError::Runtime(source)
            | ProcessError::Execution(source)
            | ProcessError::Import(source)
            | ProcessError::CompareAndSet(source) => Some(source.as_ref()),
            ProcessError::BlockTree(source) => Some(source),
            _ => None,
        }
    }
}

impl From<BlockTreeError> for ProcessError {
    fn from(error: BlockTreeError) -> Self {
        ProcessError::BlockTree(error)
    }
}
