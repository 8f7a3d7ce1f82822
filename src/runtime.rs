//! Runtime glue that wires configuration, telemetry, fatal-error capture and runner
//! orchestration around the chain processor.

pub mod config;
pub mod fatal;
pub mod mailer;
pub mod runner;
pub mod telemetry;
