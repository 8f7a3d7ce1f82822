use super::block::{Block, Body, Header};
use super::hash::{Hash, HASH_LENGTH};
use crate::queue::sized_queue::QueueByteSize;
use anyhow::{bail, Result};
use bytes::Bytes;

/// Partially populated record for one block, keyed by its hash.
///
/// Peers deliver headers, bodies and justifications independently, so any subset of the
/// optional fields may be present. Two values with the same hash describe the same block and
/// are combined with [`BlockData::merge`], never treated as conflicting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    pub hash: Hash,
    pub header: Option<Header>,
    pub body: Option<Body>,
    pub receipt: Option<Bytes>,
    pub message_queue: Option<Bytes>,
    pub justification: Option<Bytes>,
}

impl BlockData {
    pub fn new(hash: Hash) -> Self {
        Self {
            hash,
            header: None,
            body: None,
            receipt: None,
            message_queue: None,
            justification: None,
        }
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.header = Some(header);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_justification(mut self, justification: impl Into<Bytes>) -> Self {
        self.justification = Some(justification.into());
        self
    }

    pub fn with_receipt(mut self, receipt: impl Into<Bytes>) -> Self {
        self.receipt = Some(receipt.into());
        self
    }

    pub fn with_message_queue(mut self, message_queue: impl Into<Bytes>) -> Self {
        self.message_queue = Some(message_queue.into());
        self
    }

    /// True when both header and body are present, i.e. the item can be executed as is.
    pub fn is_full(&self) -> bool {
        self.header.is_some() && self.body.is_some()
    }

    /// Returns the assembled block when the item carries both halves.
    pub fn to_block(&self) -> Option<Block> {
        match (&self.header, &self.body) {
            (Some(header), Some(body)) => Some(Block::new(header.clone(), body.clone())),
            _ => None,
        }
    }

    /// Folds the fields of `other` that are missing here into `self`.
    ///
    /// Fields already populated are kept as they are.
    pub fn merge(&mut self, other: BlockData) -> Result<()> {
        if other.hash != self.hash {
            bail!(
                "cannot merge block data for {} into block data for {}",
                other.hash,
                self.hash
            );
        }

        fill(&mut self.header, other.header);
        fill(&mut self.body, other.body);
        fill(&mut self.receipt, other.receipt);
        fill(&mut self.message_queue, other.message_queue);
        fill(&mut self.justification, other.justification);
        Ok(())
    }
}

fn fill<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if slot.is_none() {
        *slot = incoming;
    }
}

impl QueueByteSize for BlockData {
    fn queue_bytes(&self) -> usize {
        HASH_LENGTH
            .saturating_add(self.header.queue_bytes())
            .saturating_add(self.body.queue_bytes())
            .saturating_add(self.receipt.queue_bytes())
            .saturating_add(self.message_queue.queue_bytes())
            .saturating_add(self.justification.queue_bytes())
    }
}
