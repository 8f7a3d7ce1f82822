use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use chain_sync::{
    Block, BlockData, Body, ChainProcessor, ChainProcessorParams, Extrinsic, Hash, Header,
    ImportMetrics, ImportMetricsSnapshot, ReadyQueue, TelemetryClient, TelemetryEndpoint,
    TelemetryError, TelemetryMessage,
};
use once_cell::sync::Lazy;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use super::mock_chain::{MockChain, PendingBlocks};

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

pub fn block_hash(number: u64) -> Hash {
    let mut bytes = [0u8; 32];
    bytes[0] = 0xb1;
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    Hash::new(bytes)
}

fn state_root(number: u64) -> Hash {
    let mut bytes = [0u8; 32];
    bytes[0] = 0x5e;
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    Hash::new(bytes)
}

pub fn genesis_header() -> Header {
    Header::new(Hash::default(), 0, state_root(0), Hash::default())
}

/// Linear chain of blocks `1..=count` on top of genesis, each carrying one extrinsic.
pub fn build_chain(count: u64) -> Vec<(Hash, Block)> {
    (1..=count)
        .map(|number| {
            let header = Header::new(
                block_hash(number - 1),
                number,
                state_root(number),
                Hash::default(),
            );
            let body = Body::new(vec![Extrinsic::from(number.to_le_bytes().to_vec())]);
            (block_hash(number), Block::new(header, body))
        })
        .collect()
}

pub fn full_block_data(hash: Hash, block: &Block) -> BlockData {
    BlockData::new(hash)
        .with_header(block.header.clone())
        .with_body(block.body.clone())
}

pub fn new_chain() -> Arc<MockChain> {
    MockChain::new(block_hash(0), genesis_header())
}

/// Telemetry sink that keeps every message it receives.
#[derive(Default)]
pub struct RecordingTelemetry {
    messages: Mutex<Vec<TelemetryMessage>>,
}

impl RecordingTelemetry {
    pub fn messages(&self) -> Vec<TelemetryMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl TelemetryClient for RecordingTelemetry {
    fn send_message(&self, message: TelemetryMessage) -> Result<(), TelemetryError> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

/// Endpoint collecting encoded payloads shipped by the mailer.
#[derive(Default)]
pub struct CollectingEndpoint {
    payloads: Mutex<Vec<String>>,
}

impl CollectingEndpoint {
    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

impl TelemetryEndpoint for CollectingEndpoint {
    fn ship(&self, payload: &str) -> Result<()> {
        self.payloads.lock().unwrap().push(payload.to_owned());
        Ok(())
    }
}

pub struct ProcessorHarness {
    pub processor: Arc<ChainProcessor>,
    pub chain: Arc<MockChain>,
    pub pending: Arc<PendingBlocks>,
    pub telemetry: Arc<RecordingTelemetry>,
}

impl ProcessorHarness {
    pub fn new(capacity: usize) -> Self {
        let chain = new_chain();
        let pending = Arc::new(PendingBlocks::default());
        let telemetry = Arc::new(RecordingTelemetry::default());
        let processor = Arc::new(ChainProcessor::new(ChainProcessorParams {
            ready_blocks: Arc::new(ReadyQueue::new(capacity)),
            pending_blocks: pending.clone(),
            block_state: chain.clone(),
            storage_state: chain.clone(),
            transaction_state: chain.clone(),
            header_verifier: chain.clone(),
            finality_gadget: chain.clone(),
            block_import_handler: chain.clone(),
            telemetry: telemetry.clone(),
        }));

        Self {
            processor,
            chain,
            pending,
            telemetry,
        }
    }

    pub fn queue(&self) -> &Arc<ReadyQueue> {
        self.processor.ready_blocks()
    }

    pub async fn push(&self, data: BlockData) {
        self.pending.add(data.hash);
        self.queue().push(data).await;
    }
}

/// Polls the metrics until `predicate` holds or `timeout` elapses.
pub async fn wait_for_metrics(
    metrics: &Arc<ImportMetrics>,
    timeout: Duration,
    predicate: impl Fn(&ImportMetricsSnapshot) -> bool,
) -> Result<()> {
    let start = Instant::now();
    loop {
        let snapshot = metrics.snapshot();
        if predicate(&snapshot) {
            return Ok(());
        }

        if start.elapsed() > timeout {
            bail!("metrics did not reach the expected state within {timeout:?}: {snapshot:?}");
        }

        sleep(Duration::from_millis(10)).await;
    }
}

pub fn assert_is_contiguous(numbers: &[u64]) {
    for window in numbers.windows(2) {
        if let [lhs, rhs] = window {
            assert_eq!(rhs, &(lhs + 1), "imports must follow parent-before-child order");
        }
    }
}
