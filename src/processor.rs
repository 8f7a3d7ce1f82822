//! Chain processor: the single consumer of the ready queue.
//!
//! - `chain_processor` owns the collaborators, the worker task and its lifecycle.
//! - `pipeline` drives one block-data item through header, block, body and justification
//!   handling.
//! - `outcome` holds the per-item result types.

pub mod chain_processor;
pub mod outcome;
pub mod pipeline;
