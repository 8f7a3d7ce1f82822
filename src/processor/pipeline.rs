//! Per-item block-data pipeline.
//!
//! Every function here is synchronous: the worker runs it on the blocking pool, and collaborators
//! are free to block (disk reads, block execution, waiting on the storage lock).

use super::chain_processor::ChainProcessor;
use super::outcome::{ImportOutcome, JustificationDiscard, JustificationOutcome};
use crate::collaborators::{BlockTreeError, StorageState};
use crate::error::ProcessError;
use crate::primitives::block::{Block, Body, Header};
use crate::primitives::block_data::BlockData;
use crate::primitives::hash::Hash;
use crate::primitives::trie_state::TrieState;
use crate::runtime::mailer::TelemetryMessage;
use anyhow::{anyhow, Error as AnyError};

/// Holds the storage-state lock for one import and releases it on every exit path.
struct StorageStateGuard<'a> {
    storage: &'a dyn StorageState,
}

impl<'a> StorageStateGuard<'a> {
    fn lock(storage: &'a dyn StorageState) -> Self {
        storage.lock();
        Self { storage }
    }
}

impl Drop for StorageStateGuard<'_> {
    fn drop(&mut self) {
        self.storage.unlock();
    }
}

fn block_state_error(operation: &'static str) -> impl FnOnce(AnyError) -> ProcessError {
    move |source| ProcessError::BlockState { operation, source }
}

impl ChainProcessor {
    /// Runs one ready item through the pipeline.
    ///
    /// Items whose header and body are both already stored take the cheap known-block path;
    /// anything else is verified, executed when a full block can be assembled, and recorded
    /// with the block state.
    pub fn process_block_data(
        &self,
        data: Option<&BlockData>,
    ) -> Result<ImportOutcome, ProcessError> {
        let data = data.ok_or(ProcessError::NilBlockData)?;

        let has_header = self
            .block_state
            .has_header(&data.hash)
            .map_err(block_state_error("has_header"))?;
        let has_body = self
            .block_state
            .has_block_body(&data.hash)
            .map_err(block_state_error("has_block_body"))?;

        if has_header && has_body {
            return self.process_known_block(data);
        }

        self.process_new_block(data, has_header, has_body)
    }

    fn process_known_block(&self, data: &BlockData) -> Result<ImportOutcome, ProcessError> {
        let block = self
            .block_state
            .get_block_by_hash(&data.hash)
            .map_err(block_state_error("get_block_by_hash"))?
            .ok_or(ProcessError::MissingBlockData { hash: data.hash })?;

        let outcome = match self.block_state.add_block_to_block_tree(&block) {
            Err(BlockTreeError::BlockExists) => {
                tracing::debug!(
                    hash = %data.hash,
                    number = block.number(),
                    "skipping block already in block tree"
                );
                ImportOutcome::AlreadyKnown
            }
            Err(err) => return Err(err.into()),
            Ok(()) => {
                self.reimport_stored_block(&data.hash, &block)?;
                ImportOutcome::Reattached
            }
        };

        self.handle_justification(
            &data.hash,
            Some(&block.header),
            data.justification.as_deref(),
        );
        Ok(outcome)
    }

    /// Hands an already executed block's stored post-state back to the import handler.
    fn reimport_stored_block(&self, hash: &Hash, block: &Block) -> Result<(), ProcessError> {
        let state_root = block.header.state_root;
        let _guard = StorageStateGuard::lock(self.storage_state.as_ref());
        let state = self.load_trie_state(&state_root)?;

        self.block_import_handler
            .handle_block_import(block, &state)
            .map_err(ProcessError::Import)?;

        tracing::debug!(
            %hash,
            number = block.number(),
            "re-attached stored block to block tree"
        );
        Ok(())
    }

    /// Verifies the item's header and imports the block when both halves are known.
    ///
    /// The body's extrinsics leave the pool only once the block is imported; a body that
    /// cannot be executed yet, or whose import fails, stays in the pool.
    fn process_new_block(
        &self,
        data: &BlockData,
        has_header: bool,
        has_body: bool,
    ) -> Result<ImportOutcome, ProcessError> {
        let block = self.resolve_block(data, has_header, has_body)?;

        if let Some(header) = data.header.as_ref() {
            self.handle_header(Some(header))?;
        }

        let outcome = match block.as_ref() {
            Some(block) => {
                self.handle_block(&data.hash, Some(block))?;
                self.handle_body(&block.body);
                self.metrics.record_imported_number(block.number());
                ImportOutcome::Imported
            }
            None => {
                tracing::trace!(hash = %data.hash, "recording incomplete block data");
                ImportOutcome::Recorded
            }
        };

        let header = block
            .as_ref()
            .map(|block| &block.header)
            .or(data.header.as_ref());
        self.handle_justification(&data.hash, header, data.justification.as_deref());

        self.block_state
            .compare_and_set_block_data(data)
            .map_err(ProcessError::CompareAndSet)?;

        Ok(outcome)
    }

    /// Completes the item with whatever piece the block state already stores.
    ///
    /// Returns `None` when no full block can be assembled yet.
    fn resolve_block(
        &self,
        data: &BlockData,
        has_header: bool,
        has_body: bool,
    ) -> Result<Option<Block>, ProcessError> {
        let block = match (data.header.as_ref(), data.body.as_ref()) {
            (Some(header), Some(body)) => Some(Block::new(header.clone(), body.clone())),
            (Some(header), None) if has_body => {
                let body = self
                    .block_state
                    .get_block_body(&data.hash)
                    .map_err(block_state_error("get_block_body"))?
                    .ok_or(ProcessError::MissingBlockData { hash: data.hash })?;
                Some(Block::new(header.clone(), body))
            }
            (None, Some(body)) if has_header => {
                let header = self
                    .block_state
                    .get_header(&data.hash)
                    .map_err(block_state_error("get_header"))?
                    .ok_or(ProcessError::MissingBlockData { hash: data.hash })?;
                Some(Block::new(header, body.clone()))
            }
            _ => None,
        };
        Ok(block)
    }

    /// Checks a header against the block-production consensus rules.
    pub fn handle_header(&self, header: Option<&Header>) -> Result<(), ProcessError> {
        let header =
            header.ok_or_else(|| ProcessError::HeaderVerification(anyhow!("nil header")))?;

        self.header_verifier
            .verify_block(header)
            .map_err(ProcessError::HeaderVerification)
    }

    /// Executes `block` on its parent's post-state and hands the result to the import handler.
    ///
    /// The storage-state lock is held from loading the parent snapshot until the import handler
    /// returns.
    pub fn handle_block(&self, hash: &Hash, block: Option<&Block>) -> Result<(), ProcessError> {
        let block = block.ok_or(ProcessError::NilBlock)?;
        let parent_hash = block.header.parent_hash;

        let parent = self
            .block_state
            .get_header(&parent_hash)
            .map_err(block_state_error("get_header"))?
            .ok_or(ProcessError::ParentNotFound {
                parent: parent_hash,
            })?;

        {
            let _guard = StorageStateGuard::lock(self.storage_state.as_ref());

            let state = self.load_trie_state(&parent.state_root)?;
            if state.root() != parent.state_root {
                return Err(ProcessError::StateRootMismatch {
                    expected: parent.state_root,
                    actual: state.root(),
                });
            }

            let instance = self
                .block_state
                .get_runtime(&parent_hash)
                .map_err(ProcessError::Runtime)?;
            instance.set_context_storage(state.clone());
            instance
                .execute_block(block)
                .map_err(ProcessError::Execution)?;

            self.block_import_handler
                .handle_block_import(block, &state)
                .map_err(ProcessError::Import)?;
        }

        tracing::debug!(
            %hash,
            number = block.number(),
            parent = %parent_hash,
            "imported block"
        );

        let message = TelemetryMessage::block_import(*hash, block.number());
        if let Err(err) = self.telemetry.send_message(message) {
            tracing::debug!(%hash, error = %err, "failed to send block import telemetry");
        }

        Ok(())
    }

    /// Drops the body's extrinsics from the transaction pool.
    ///
    /// Called for imported blocks only.
    pub fn handle_body(&self, body: &Body) {
        for extrinsic in body.iter() {
            self.transaction_state.remove_extrinsic(extrinsic);
        }
        self.metrics.record_removed_extrinsics(body.len() as u64);
    }

    /// Verifies and stores a justification. Failures are logged and the proof is discarded.
    pub fn handle_justification(
        &self,
        hash: &Hash,
        header: Option<&Header>,
        justification: Option<&[u8]>,
    ) -> JustificationOutcome {
        let (Some(header), Some(justification)) = (header, justification) else {
            return JustificationOutcome::Skipped;
        };

        if let Err(err) = self
            .finality_gadget
            .verify_block_justification(hash, justification)
        {
            tracing::warn!(
                %hash,
                number = header.number,
                error = %err,
                "discarding invalid justification"
            );
            self.metrics.record_discarded_justification();
            return JustificationOutcome::Discarded(JustificationDiscard::Invalid(err));
        }

        if let Err(err) = self.block_state.set_justification(hash, justification) {
            tracing::warn!(
                %hash,
                number = header.number,
                error = %err,
                "failed to store justification"
            );
            self.metrics.record_discarded_justification();
            return JustificationOutcome::Discarded(JustificationDiscard::NotPersisted(err));
        }

        tracing::debug!(%hash, number = header.number, "stored justification");
        self.metrics.record_stored_justification();
        JustificationOutcome::Stored
    }

    fn load_trie_state(&self, root: &Hash) -> Result<TrieState, ProcessError> {
        self.storage_state
            .trie_state(root)
            .map_err(ProcessError::StorageState)?
            .ok_or(ProcessError::MissingStorageState { root: *root })
    }
}
