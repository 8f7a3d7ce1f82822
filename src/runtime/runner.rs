use crate::collaborators::{
    BlockImportHandler, BlockState, DisjointBlockSet, FinalityGadget, HeaderVerifier,
    StorageState, TransactionState,
};
use crate::processor::chain_processor::{ChainProcessor, ChainProcessorParams};
use crate::queue::ready_queue::ReadyQueue;
use crate::runtime::config::SyncConfig;
use crate::runtime::mailer::{Mailer, MailerHandle, TelemetryEndpoint};
use crate::runtime::telemetry::{self, ImportMetrics};
use anyhow::{bail, Context, Result};
use futures::future::join_all;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Services the sync pipeline calls into but does not own.
pub struct Collaborators {
    pub pending_blocks: Arc<dyn DisjointBlockSet>,
    pub block_state: Arc<dyn BlockState>,
    pub storage_state: Arc<dyn StorageState>,
    pub transaction_state: Arc<dyn TransactionState>,
    pub header_verifier: Arc<dyn HeaderVerifier>,
    pub finality_gadget: Arc<dyn FinalityGadget>,
    pub block_import_handler: Arc<dyn BlockImportHandler>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunnerState {
    Idle,
    Running,
    Stopped,
}

/// Coordinates the sync pipeline lifecycle and handles OS signals for graceful shutdowns.
///
/// A runner is single-use: once stopped it cannot be started again.
pub struct Runner {
    config: SyncConfig,
    shutdown: CancellationToken,
    mailer_shutdown: CancellationToken,
    processor: Arc<ChainProcessor>,
    mailer: Option<Mailer>,
    telemetry: MailerHandle,
    endpoints: Vec<Arc<dyn TelemetryEndpoint>>,
    background: Vec<JoinHandle<()>>,
    state: RunnerState,
}

impl Runner {
    /// Builds the ready queue, the telemetry mailer and the chain processor.
    ///
    /// The processor's cancellation token is a child of the runner's root token, so cancelling
    /// the root stops the worker.
    pub fn new(
        config: SyncConfig,
        collaborators: Collaborators,
        endpoints: Vec<Arc<dyn TelemetryEndpoint>>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let ready_blocks = Arc::new(ReadyQueue::new(config.ready_queue_capacity()));
        let mailer = Mailer::new(config.telemetry_queue_capacity());
        let telemetry = mailer.handle();

        let Collaborators {
            pending_blocks,
            block_state,
            storage_state,
            transaction_state,
            header_verifier,
            finality_gadget,
            block_import_handler,
        } = collaborators;

        let processor = Arc::new(ChainProcessor::with_cancellation_token(
            ChainProcessorParams {
                ready_blocks,
                pending_blocks,
                block_state,
                storage_state,
                transaction_state,
                header_verifier,
                finality_gadget,
                block_import_handler,
                telemetry: Arc::new(telemetry.clone()),
            },
            shutdown.child_token(),
        ));

        Self {
            config,
            shutdown,
            mailer_shutdown: CancellationToken::new(),
            processor,
            mailer: Some(mailer),
            telemetry,
            endpoints,
            background: Vec::new(),
            state: RunnerState::Idle,
        }
    }

    /// Queue the ingestion layer pushes assembled block data onto.
    pub fn ready_blocks(&self) -> Arc<ReadyQueue> {
        self.processor.ready_blocks().clone()
    }

    pub fn processor(&self) -> Arc<ChainProcessor> {
        self.processor.clone()
    }

    pub fn metrics(&self) -> Arc<ImportMetrics> {
        self.processor.metrics()
    }

    /// Producer handle for components that want to emit their own telemetry.
    pub fn telemetry(&self) -> MailerHandle {
        self.telemetry.clone()
    }

    /// Returns a clone of the root shutdown token so external callers can integrate
    /// with their own signal handlers or cancellation strategies.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Starts the telemetry mailer, the metrics reporter and the chain processor worker.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            RunnerState::Running => bail!("runner already started"),
            RunnerState::Stopped => bail!("runner has been stopped and cannot be restarted"),
            RunnerState::Idle => {}
        }

        let mailer = self
            .mailer
            .take()
            .context("telemetry mailer already consumed")?;
        self.background.push(
            mailer.spawn(self.endpoints.clone(), self.mailer_shutdown.clone()),
        );
        self.background.push(telemetry::spawn_metrics_reporter(
            self.processor.metrics(),
            self.processor.ready_blocks().clone(),
            self.processor.cancellation_token().child_token(),
            self.config.metrics_interval(),
        ));

        if let Err(err) = self.processor.start() {
            self.shutdown.cancel();
            self.shutdown_background().await;
            self.state = RunnerState::Stopped;
            return Err(err).context("failed to start chain processor");
        }

        tracing::info!(
            ready_queue_capacity = self.config.ready_queue_capacity(),
            telemetry_queue_capacity = self.config.telemetry_queue_capacity(),
            "sync pipeline started"
        );
        self.state = RunnerState::Running;
        Ok(())
    }

    /// Stops the processor first, then the mailer, and reports a fatal processor error if any.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state != RunnerState::Running {
            return Ok(());
        }

        tracing::info!("stopping sync pipeline");
        self.shutdown.cancel();
        let result = self.processor.stop().await;
        self.shutdown_background().await;
        self.state = RunnerState::Stopped;

        let snapshot = self.processor.metrics().snapshot();
        tracing::info!(
            imported = snapshot.imported,
            rejected = snapshot.rejected,
            best = snapshot.best_number,
            dropped_telemetry = self.telemetry.dropped(),
            "sync pipeline stopped"
        );
        result
    }

    /// Runs until a Ctrl-C (SIGINT) is received or the pipeline is cancelled elsewhere.
    pub async fn run_until_ctrl_c(&mut self) -> Result<()> {
        self.start().await?;
        tracing::info!("runner started; waiting for Ctrl-C (SIGINT) to initiate shutdown");

        let processor_token = self.processor.cancellation_token();
        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("Ctrl-C received; shutting down runner");
            }
            _ = processor_token.cancelled() => {
                tracing::info!("runner shutdown token cancelled");
            }
        }

        self.stop().await
    }

    async fn shutdown_background(&mut self) {
        self.mailer_shutdown.cancel();
        let results = join_all(self.background.drain(..)).await;
        for result in results {
            if let Err(err) = result {
                tracing::warn!(error = %err, "background task terminated unexpectedly");
            }
        }
    }
}
