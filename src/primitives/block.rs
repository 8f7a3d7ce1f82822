use super::hash::{Hash, HASH_LENGTH};
use crate::queue::sized_queue::QueueByteSize;
use bytes::Bytes;

/// Four-byte identifier of the consensus engine a digest item belongs to.
pub type ConsensusEngineId = [u8; 4];

/// Consensus-specific entries carried in a header digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestItem {
    PreRuntime {
        engine: ConsensusEngineId,
        data: Bytes,
    },
    Consensus {
        engine: ConsensusEngineId,
        data: Bytes,
    },
    Seal {
        engine: ConsensusEngineId,
        data: Bytes,
    },
    Other(Bytes),
}

impl QueueByteSize for DigestItem {
    fn queue_bytes(&self) -> usize {
        match self {
            DigestItem::PreRuntime { engine, data }
            | DigestItem::Consensus { engine, data }
            | DigestItem::Seal { engine, data } => engine.len().saturating_add(data.len()),
            DigestItem::Other(data) => data.len(),
        }
    }
}

/// Block header. Only meaningful relative to the post-state of its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub parent_hash: Hash,
    pub number: u64,
    pub state_root: Hash,
    pub extrinsics_root: Hash,
    pub digest: Vec<DigestItem>,
}

impl Header {
    pub fn new(parent_hash: Hash, number: u64, state_root: Hash, extrinsics_root: Hash) -> Self {
        Self {
            parent_hash,
            number,
            state_root,
            extrinsics_root,
            digest: Vec::new(),
        }
    }

    pub fn with_digest(mut self, digest: Vec<DigestItem>) -> Self {
        self.digest = digest;
        self
    }
}

impl QueueByteSize for Header {
    fn queue_bytes(&self) -> usize {
        let fixed = core::mem::size_of::<u64>().saturating_add(HASH_LENGTH * 3);
        fixed.saturating_add(self.digest.queue_bytes())
    }
}

/// Opaque transaction-like unit included in a block body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Extrinsic(Bytes);

impl Extrinsic {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Extrinsic {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Extrinsic {
    fn from(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }
}

impl QueueByteSize for Extrinsic {
    fn queue_bytes(&self) -> usize {
        self.0.queue_bytes()
    }
}

/// Ordered sequence of extrinsics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body(Vec<Extrinsic>);

impl Body {
    pub fn new(extrinsics: Vec<Extrinsic>) -> Self {
        Self(extrinsics)
    }

    pub fn extrinsics(&self) -> &[Extrinsic] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extrinsic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Extrinsic>> for Body {
    fn from(extrinsics: Vec<Extrinsic>) -> Self {
        Self(extrinsics)
    }
}

impl QueueByteSize for Body {
    fn queue_bytes(&self) -> usize {
        self.0.queue_bytes()
    }
}

/// Header plus body: the unit handed to the runtime for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    pub body: Body,
}

impl Block {
    pub fn new(header: Header, body: Body) -> Self {
        Self { header, body }
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }
}
