//! Chain processor lifecycle and worker loop.
//!
//! The processor owns no chain state itself. Everything it reads or writes goes through the
//! collaborator traits in [`crate::collaborators`]; the per-item pipeline lives in
//! [`super::pipeline`].

use crate::collaborators::{
    BlockImportHandler, BlockState, DisjointBlockSet, FinalityGadget, HeaderVerifier,
    StorageState, TelemetryClient, TransactionState,
};
use crate::queue::ready_queue::ReadyQueue;
use crate::runtime::fatal::FatalErrorHandler;
use crate::runtime::telemetry::ImportMetrics;
use anyhow::{anyhow, bail, Context, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct ChainProcessorParams {
    pub ready_blocks: Arc<ReadyQueue>,
    pub pending_blocks: Arc<dyn DisjointBlockSet>,
    pub block_state: Arc<dyn BlockState>,
    pub storage_state: Arc<dyn StorageState>,
    pub transaction_state: Arc<dyn TransactionState>,
    pub header_verifier: Arc<dyn HeaderVerifier>,
    pub finality_gadget: Arc<dyn FinalityGadget>,
    pub block_import_handler: Arc<dyn BlockImportHandler>,
    pub telemetry: Arc<dyn TelemetryClient>,
}

/// Drains the ready queue and drives each item through verification, execution and import.
///
/// Items are handled strictly one at a time in pop order by a single worker task. An item that
/// fails with a [`ProcessError`](crate::error::ProcessError) is logged and skipped. A panic
/// inside a collaborator is not a per-item error: it is reported to the fatal error handler, the
/// worker stops, and [`ChainProcessor::stop`] returns the error.
pub struct ChainProcessor {
    pub(super) ready_blocks: Arc<ReadyQueue>,
    pub(super) pending_blocks: Arc<dyn DisjointBlockSet>,
    pub(super) block_state: Arc<dyn BlockState>,
    pub(super) storage_state: Arc<dyn StorageState>,
    pub(super) transaction_state: Arc<dyn TransactionState>,
    pub(super) header_verifier: Arc<dyn HeaderVerifier>,
    pub(super) finality_gadget: Arc<dyn FinalityGadget>,
    pub(super) block_import_handler: Arc<dyn BlockImportHandler>,
    pub(super) telemetry: Arc<dyn TelemetryClient>,
    pub(super) metrics: Arc<ImportMetrics>,
    shutdown: CancellationToken,
    fatal_handler: FatalErrorHandler,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ChainProcessor {
    /// Creates a processor with its own cancellation token. The worker is not started.
    pub fn new(params: ChainProcessorParams) -> Self {
        Self::with_cancellation_token(params, CancellationToken::new())
    }

    /// Creates a processor whose worker stops when `shutdown` is cancelled.
    pub fn with_cancellation_token(
        params: ChainProcessorParams,
        shutdown: CancellationToken,
    ) -> Self {
        let ChainProcessorParams {
            ready_blocks,
            pending_blocks,
            block_state,
            storage_state,
            transaction_state,
            header_verifier,
            finality_gadget,
            block_import_handler,
            telemetry,
        } = params;

        Self {
            ready_blocks,
            pending_blocks,
            block_state,
            storage_state,
            transaction_state,
            header_verifier,
            finality_gadget,
            block_import_handler,
            telemetry,
            metrics: Arc::new(ImportMetrics::default()),
            fatal_handler: FatalErrorHandler::new(shutdown.clone()),
            shutdown,
            worker: Mutex::new(None),
        }
    }

    pub fn ready_blocks(&self) -> &Arc<ReadyQueue> {
        &self.ready_blocks
    }

    pub fn metrics(&self) -> Arc<ImportMetrics> {
        self.metrics.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_running(&self) -> bool {
        self.worker_slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Spawns the worker loop.
    ///
    /// Fails if the worker was already started or the processor has been cancelled.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut worker = self.worker_slot();
        if worker.is_some() {
            bail!("chain processor already started");
        }
        if self.shutdown.is_cancelled() {
            bail!("chain processor has been cancelled");
        }

        tracing::info!(
            capacity = self.ready_blocks.capacity(),
            queued = self.ready_blocks.len(),
            "starting chain processor"
        );
        *worker = Some(tokio::spawn(Arc::clone(self).process_ready_blocks()));
        Ok(())
    }

    /// Signals the worker to stop after the item it is currently processing.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Cancels the worker, waits for it to exit and reports a fatal error if one occurred.
    pub async fn stop(&self) -> Result<()> {
        self.shutdown.cancel();

        let handle = self.worker_slot().take();
        if let Some(handle) = handle {
            handle
                .await
                .context("failed to join chain processor worker")?;
        }

        if let Some(err) = self.fatal_handler.error() {
            return Err(err).context("chain processor aborted");
        }

        Ok(())
    }

    async fn process_ready_blocks(self: Arc<Self>) {
        loop {
            let data = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                data = self.ready_blocks.pop() => data,
            };

            let hash = data.hash;
            let processor = Arc::clone(&self);
            let result =
                tokio::task::spawn_blocking(move || processor.process_block_data(Some(&data)))
                    .await;

            match result {
                Ok(Ok(outcome)) => {
                    self.metrics.record_outcome(outcome);
                    tracing::debug!(%hash, %outcome, "processed block data");
                }
                Ok(Err(err)) => {
                    self.metrics.record_rejected();
                    tracing::error!(%hash, error = %err, "block data processing failed");
                }
                Err(join_err) => {
                    tracing::error!(%hash, error = %join_err, "block data processing panicked");
                    self.fatal_handler.trigger(
                        "chain processor worker",
                        anyhow!("processing block data {hash} did not complete: {join_err}"),
                    );
                    break;
                }
            }

            self.pending_blocks.remove_block(&hash);
        }

        tracing::info!(
            queued = self.ready_blocks.len(),
            pending = self.pending_blocks.size(),
            "chain processor worker stopped"
        );
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
