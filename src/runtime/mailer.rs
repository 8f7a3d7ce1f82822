//! Process-wide telemetry queue.
//!
//! One bounded channel is created at startup. Any component holding a [`MailerHandle`] can
//! enqueue messages without blocking; a single background task drains the channel, encodes each
//! message as JSON and ships it to every configured endpoint.

use crate::collaborators::TelemetryClient;
use crate::primitives::hash::Hash;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TELEMETRY_QUEUE_CAPACITY: usize = 256;

/// Origin reported for blocks imported by the sync pipeline.
pub const NETWORK_INITIAL_SYNC: &str = "NetworkInitialSync";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "msg")]
pub enum TelemetryMessage {
    #[serde(rename = "block.import")]
    BlockImport {
        best: Hash,
        height: u64,
        origin: String,
    },
}

impl TelemetryMessage {
    pub fn block_import(best: Hash, height: u64) -> Self {
        TelemetryMessage::BlockImport {
            best,
            height,
            origin: NETWORK_INITIAL_SYNC.to_string(),
        }
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            TelemetryMessage::BlockImport { .. } => "block.import",
        }
    }

    /// JSON payload shipped to endpoints: the message fields plus `msg` and a `ts` in unix
    /// milliseconds.
    pub fn encode(&self, timestamp_millis: u128) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut value {
            fields.insert("ts".to_string(), Value::from(timestamp_millis as u64));
        }
        Ok(serde_json::to_string(&value)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    QueueFull,
    Closed,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::QueueFull => write!(f, "telemetry queue is full; message dropped"),
            TelemetryError::Closed => write!(f, "telemetry queue is closed"),
        }
    }
}

impl std::error::Error for TelemetryError {}

/// Destination for encoded telemetry payloads.
pub trait TelemetryEndpoint: Send + Sync {
    fn ship(&self, payload: &str) -> Result<()>;
}

/// Endpoint that writes payloads to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEndpoint;

impl TelemetryEndpoint for TracingEndpoint {
    fn ship(&self, payload: &str) -> Result<()> {
        tracing::info!(target: "chain_sync::telemetry", payload, "telemetry message");
        Ok(())
    }
}

/// Cheap, clonable producer side of the telemetry queue.
#[derive(Debug, Clone)]
pub struct MailerHandle {
    sender: mpsc::Sender<TelemetryMessage>,
    dropped: Arc<AtomicU64>,
}

impl MailerHandle {
    /// Messages dropped because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl TelemetryClient for MailerHandle {
    fn send_message(&self, message: TelemetryMessage) -> Result<(), TelemetryError> {
        match self.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(TelemetryError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(TelemetryError::Closed)
            }
        }
    }
}

/// Owner of the telemetry channel until the drain task is spawned.
pub struct Mailer {
    handle: MailerHandle,
    receiver: mpsc::Receiver<TelemetryMessage>,
}

impl Mailer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "telemetry queue capacity must be greater than zero");
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            handle: MailerHandle {
                sender,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            receiver,
        }
    }

    pub fn handle(&self) -> MailerHandle {
        self.handle.clone()
    }

    /// Spawns the single drain task.
    ///
    /// On shutdown the task ships whatever is already queued, then exits. It also exits once
    /// every handle has been dropped.
    pub fn spawn(
        self,
        endpoints: Vec<Arc<dyn TelemetryEndpoint>>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let Mailer {
            handle,
            mut receiver,
        } = self;
        drop(handle);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        receiver.close();
                        while let Ok(message) = receiver.try_recv() {
                            ship_message(&endpoints, &message);
                        }
                        break;
                    }
                    message = receiver.recv() => match message {
                        Some(message) => ship_message(&endpoints, &message),
                        None => break,
                    }
                }
            }
            tracing::debug!("telemetry mailer stopped");
        })
    }
}

fn ship_message(endpoints: &[Arc<dyn TelemetryEndpoint>], message: &TelemetryMessage) {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();

    let payload = match message.encode(timestamp) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!(error = %err, "failed to encode telemetry message");
            return;
        }
    };

    for endpoint in endpoints {
        if let Err(err) = endpoint.ship(&payload) {
            tracing::debug!(
                msg = message.message_type(),
                error = %err,
                "failed to ship telemetry message"
            );
        }
    }
}
