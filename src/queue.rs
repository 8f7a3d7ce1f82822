//! Hand-off between block-data producers and the chain processor: the bounded,
//! hash-deduplicating ready queue and its byte accounting.

pub mod ready_queue;
pub mod sized_queue;
