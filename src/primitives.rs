//! Chain primitives handed around by the sync pipeline: hashes, headers,
//! bodies, assembled blocks, partially populated block data, and storage
//! snapshots used as execution context.

pub mod block;
pub mod block_data;
pub mod hash;
pub mod trie_state;
