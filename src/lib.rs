pub mod collaborators;
pub mod error;
pub mod primitives;
pub mod processor;
pub mod queue;
pub mod runtime;

pub use collaborators::{
    BlockImportHandler, BlockState, BlockTreeError, DisjointBlockSet, FinalityGadget,
    HeaderVerifier, RuntimeInstance, StorageState, TelemetryClient, TransactionState,
};
pub use error::ProcessError;
pub use primitives::block::{Block, Body, DigestItem, Extrinsic, Header};
pub use primitives::block_data::BlockData;
pub use primitives::hash::Hash;
pub use primitives::trie_state::TrieState;
pub use processor::chain_processor::{ChainProcessor, ChainProcessorParams};
pub use processor::outcome::{ImportOutcome, JustificationDiscard, JustificationOutcome};
pub use queue::ready_queue::ReadyQueue;
pub use queue::sized_queue::QueueByteSize;
pub use runtime::config::{SyncConfig, SyncConfigBuilder, SyncConfigParams};
pub use runtime::mailer::{
    Mailer, MailerHandle, TelemetryEndpoint, TelemetryError, TelemetryMessage, TracingEndpoint,
};
pub use runtime::runner::{Collaborators, Runner};
pub use runtime::telemetry::{init_tracing, ImportMetrics, ImportMetricsSnapshot};
