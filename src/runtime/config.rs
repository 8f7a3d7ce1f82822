use crate::runtime::{mailer, telemetry};
use anyhow::{bail, Result};
use std::time::Duration;

/// Blocks a single peer response may carry.
const MAX_BLOCKS_PER_RESPONSE: usize = 128;
/// Ready queue sized for thirty full responses in flight.
const DEFAULT_READY_QUEUE_CAPACITY: usize = MAX_BLOCKS_PER_RESPONSE * 30;

/// Runtime configuration for the sync pipeline.
///
/// All instances must be constructed via [`SyncConfig::builder`] or [`SyncConfig::new`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    ready_queue_capacity: usize,
    telemetry_queue_capacity: usize,
    metrics_interval: Duration,
}

pub struct SyncConfigParams {
    pub ready_queue_capacity: usize,
    pub telemetry_queue_capacity: usize,
    pub metrics_interval: Duration,
}

impl Default for SyncConfigParams {
    fn default() -> Self {
        Self {
            ready_queue_capacity: DEFAULT_READY_QUEUE_CAPACITY,
            telemetry_queue_capacity: mailer::DEFAULT_TELEMETRY_QUEUE_CAPACITY,
            metrics_interval: telemetry::DEFAULT_METRICS_INTERVAL,
        }
    }
}

impl SyncConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    pub fn new(params: SyncConfigParams) -> Result<Self> {
        let SyncConfigParams {
            ready_queue_capacity,
            telemetry_queue_capacity,
            metrics_interval,
        } = params;

        let config = Self {
            ready_queue_capacity,
            telemetry_queue_capacity,
            metrics_interval,
        };

        config.validate()?;
        Ok(config)
    }

    /// Maximum number of block-data items waiting between ingestion and import.
    pub fn ready_queue_capacity(&self) -> usize {
        self.ready_queue_capacity
    }

    /// Maximum number of telemetry messages buffered before new ones are dropped.
    pub fn telemetry_queue_capacity(&self) -> usize {
        self.telemetry_queue_capacity
    }

    /// Interval used by the metrics reporter.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        if self.ready_queue_capacity == 0 {
            bail!("ready_queue_capacity must be greater than 0");
        }

        if self.telemetry_queue_capacity == 0 {
            bail!("telemetry_queue_capacity must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        let SyncConfigParams {
            ready_queue_capacity,
            telemetry_queue_capacity,
            metrics_interval,
        } = SyncConfigParams::default();
        Self {
            ready_queue_capacity,
            telemetry_queue_capacity,
            metrics_interval,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SyncConfigBuilder {
    ready_queue_capacity: Option<usize>,
    telemetry_queue_capacity: Option<usize>,
    metrics_interval: Option<Duration>,
}

impl SyncConfigBuilder {
    pub fn ready_queue_capacity(mut self, capacity: usize) -> Self {
        self.ready_queue_capacity = Some(capacity);
        self
    }

    pub fn telemetry_queue_capacity(mut self, capacity: usize) -> Self {
        self.telemetry_queue_capacity = Some(capacity);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<SyncConfig> {
        let defaults = SyncConfigParams::default();
        let params = SyncConfigParams {
            ready_queue_capacity: self
                .ready_queue_capacity
                .unwrap_or(defaults.ready_queue_capacity),
            telemetry_queue_capacity: self
                .telemetry_queue_capacity
                .unwrap_or(defaults.telemetry_queue_capacity),
            metrics_interval: self.metrics_interval.unwrap_or(defaults.metrics_interval),
        };

        SyncConfig::new(params)
    }
}
