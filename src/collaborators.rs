//! Capability traits for everything the chain processor calls but does not own.
//!
//! Production services and test doubles are both plain implementations of these traits; the
//! processor receives them as `Arc<dyn Trait>` at construction. Collaborators report failures
//! as [`anyhow::Error`] and are expected to provide their own internal synchronization.

use crate::primitives::block::{Block, Body, Extrinsic, Header};
use crate::primitives::block_data::BlockData;
use crate::primitives::hash::Hash;
use crate::primitives::trie_state::TrieState;
use crate::runtime::mailer::{TelemetryError, TelemetryMessage};
use anyhow::{Error as AnyError, Result};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Reason the block tree refused to attach a block.
#[derive(Debug)]
pub enum BlockTreeError {
    /// The block is already part of the tree.
    BlockExists,
    /// The block's parent is not in the tree.
    ParentNotFound { parent: Hash },
    /// Any other refusal, e.g. a fork-choice rule violation.
    Rejected(AnyError),
}

impl fmt::Display for BlockTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTreeError::BlockExists => write!(f, "block already exists in block tree"),
            BlockTreeError::ParentNotFound { parent } => {
                write!(f, "parent {parent} not found in block tree")
            }
            BlockTreeError::Rejected(source) => write!(f, "{source}"),
        }
    }
}

impl std::error::Error for BlockTreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlockTreeError::Rejected(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Persistent block store and block tree.
///
/// Presence checks must be cheap and side-effect free. Lookups return `Ok(None)` when the item
/// is simply not stored.
pub trait BlockState: Send + Sync {
    fn has_header(&self, hash: &Hash) -> Result<bool>;

    fn has_block_body(&self, hash: &Hash) -> Result<bool>;

    fn get_header(&self, hash: &Hash) -> Result<Option<Header>>;

    fn get_block_body(&self, hash: &Hash) -> Result<Option<Body>>;

    fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>>;

    /// Attaches `block` to the in-memory block tree.
    fn add_block_to_block_tree(&self, block: &Block) -> Result<(), BlockTreeError>;

    fn set_justification(&self, hash: &Hash, justification: &[u8]) -> Result<()>;

    /// Stores the populated fields of `data`, inserting when absent and updating stale entries.
    fn compare_and_set_block_data(&self, data: &BlockData) -> Result<()>;

    /// Returns a runtime instance bound to the post-state of the block `hash`.
    fn get_runtime(&self, hash: &Hash) -> Result<Arc<dyn RuntimeInstance>>;
}

/// Storage-state store: owner of state snapshots and of the import lock.
pub trait StorageState: Send + Sync {
    /// Acquires exclusive access to storage state for one import. Blocks until available.
    fn lock(&self);

    fn unlock(&self);

    /// Loads the snapshot committed to by `root`.
    fn trie_state(&self, root: &Hash) -> Result<Option<TrieState>>;
}

/// Transaction pool. Removal is idempotent; removing an unknown extrinsic is a no-op.
pub trait TransactionState: Send + Sync {
    fn remove_extrinsic(&self, extrinsic: &Extrinsic);
}

/// Block-production consensus check on headers.
pub trait HeaderVerifier: Send + Sync {
    fn verify_block(&self, header: &Header) -> Result<()>;
}

/// Finality-gadget check on justifications. Must not mutate state.
pub trait FinalityGadget: Send + Sync {
    fn verify_block_justification(&self, hash: &Hash, justification: &[u8]) -> Result<()>;
}

/// Persists the post-execution state of an imported block and moves the head pointer.
pub trait BlockImportHandler: Send + Sync {
    fn handle_block_import(&self, block: &Block, state: &TrieState) -> Result<()>;
}

/// Stateful runtime handle. Context storage must be set before `execute_block`.
pub trait RuntimeInstance: Send + Sync {
    fn set_context_storage(&self, state: TrieState);

    fn execute_block(&self, block: &Block) -> Result<Bytes>;
}

/// Best-effort telemetry sink.
pub trait TelemetryClient: Send + Sync {
    fn send_message(&self, message: TelemetryMessage) -> Result<(), TelemetryError>;
}

/// Holding area for block data whose parent has not arrived yet.
///
/// The processor only drains it: once an item has been handled, its hash no longer needs to be
/// tracked as pending.
pub trait DisjointBlockSet: Send + Sync {
    fn remove_block(&self, hash: &Hash);

    fn size(&self) -> usize;
}
