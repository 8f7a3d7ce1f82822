use crate::processor::outcome::ImportOutcome;
use crate::queue::ready_queue::ReadyQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Counters describing what the chain processor did with each ready item.
#[derive(Default, Debug)]
pub struct ImportMetrics {
    imported: AtomicU64,
    reattached: AtomicU64,
    already_known: AtomicU64,
    recorded: AtomicU64,
    rejected: AtomicU64,
    stored_justifications: AtomicU64,
    discarded_justifications: AtomicU64,
    removed_extrinsics: AtomicU64,
    best_number: AtomicU64,
}

impl ImportMetrics {
    pub fn record_outcome(&self, outcome: ImportOutcome) {
        let counter = match outcome {
            ImportOutcome::Imported => &self.imported,
            ImportOutcome::Reattached => &self.reattached,
            ImportOutcome::AlreadyKnown => &self.already_known,
            ImportOutcome::Recorded => &self.recorded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Raises the best imported number; lower numbers (forks, late arrivals) are ignored.
    pub fn record_imported_number(&self, number: u64) {
        self.best_number.fetch_max(number, Ordering::Relaxed);
    }

    pub fn record_stored_justification(&self) {
        self.stored_justifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded_justification(&self) {
        self.discarded_justifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removed_extrinsics(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.removed_extrinsics.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ImportMetricsSnapshot {
        ImportMetricsSnapshot {
            imported: self.imported.load(Ordering::Relaxed),
            reattached: self.reattached.load(Ordering::Relaxed),
            already_known: self.already_known.load(Ordering::Relaxed),
            recorded: self.recorded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            stored_justifications: self.stored_justifications.load(Ordering::Relaxed),
            discarded_justifications: self.discarded_justifications.load(Ordering::Relaxed),
            removed_extrinsics: self.removed_extrinsics.load(Ordering::Relaxed),
            best_number: self.best_number.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ImportMetricsSnapshot {
    pub imported: u64,
    pub reattached: u64,
    pub already_known: u64,
    pub recorded: u64,
    pub rejected: u64,
    pub stored_justifications: u64,
    pub discarded_justifications: u64,
    pub removed_extrinsics: u64,
    pub best_number: u64,
}

impl ImportMetricsSnapshot {
    /// Items the processor finished with, successfully or not.
    pub fn processed(&self) -> u64 {
        self.imported + self.reattached + self.already_known + self.recorded + self.rejected
    }
}

/// Spawns a background task that periodically logs import throughput and ready-queue depth.
pub fn spawn_metrics_reporter(
    metrics: Arc<ImportMetrics>,
    queue: Arc<ReadyQueue>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_snapshot = metrics.snapshot();
        let mut last_tick = Instant::now();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "chain_sync::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let current = metrics.snapshot();
                    let imported_delta = current.imported.saturating_sub(last_snapshot.imported);
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    let throughput = if elapsed <= f64::EPSILON {
                        0.0
                    } else {
                        imported_delta as f64 / elapsed
                    };

                    tracing::info!(
                        target: "chain_sync::metrics",
                        throughput = format!("{throughput:.2}"),
                        best = current.best_number,
                        imported = current.imported,
                        reattached = current.reattached,
                        known = current.already_known,
                        recorded = current.recorded,
                        rejected = current.rejected,
                        justifications = current.stored_justifications,
                        discarded_justifications = current.discarded_justifications,
                        queue_blocks = queue.len(),
                        queue_bytes = queue.bytes(),
                        "import metrics snapshot"
                    );

                    last_snapshot = current;
                    last_tick = Instant::now();
                }
            }
        }
    })
}
