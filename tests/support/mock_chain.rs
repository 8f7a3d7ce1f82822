use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use anyhow::{bail, Result};
use bytes::Bytes;
use chain_sync::{
    Block, BlockData, BlockImportHandler, BlockState, BlockTreeError, Body, DisjointBlockSet,
    Extrinsic, FinalityGadget, Hash, Header, HeaderVerifier, RuntimeInstance, StorageState,
    TransactionState, TrieState,
};

/// In-memory chain backing every collaborator the processor needs.
///
/// Headers and bodies are stored by block hash. The block tree is keyed by
/// `(parent_hash, number)` because blocks do not carry their own hash.
pub struct MockChain {
    inner: Mutex<ChainState>,
    storage_locked: Mutex<bool>,
    storage_released: Condvar,
    executions: Arc<AtomicUsize>,
    compare_and_sets: AtomicUsize,
}

#[derive(Default)]
struct ChainState {
    headers: HashMap<Hash, Header>,
    bodies: HashMap<Hash, Body>,
    justifications: HashMap<Hash, Vec<u8>>,
    states: HashMap<Hash, TrieState>,
    tree: HashSet<(Hash, u64)>,
    import_log: Vec<u64>,
    pool: HashSet<Extrinsic>,
    fail_execution_at: Option<u64>,
    panic_at: Option<u64>,
}

impl MockChain {
    /// Creates a chain whose genesis header and post-state are stored.
    pub fn new(genesis_hash: Hash, genesis: Header) -> Arc<Self> {
        let mut state = ChainState::default();
        state
            .states
            .insert(genesis.state_root, TrieState::new(genesis.state_root));
        state.tree.insert((genesis.parent_hash, genesis.number));
        state.headers.insert(genesis_hash, genesis);
        state.bodies.insert(genesis_hash, Body::default());

        Arc::new(Self {
            inner: Mutex::new(state),
            storage_locked: Mutex::new(false),
            storage_released: Condvar::new(),
            executions: Arc::new(AtomicUsize::new(0)),
            compare_and_sets: AtomicUsize::new(0),
        })
    }

    pub fn import_log(&self) -> Vec<u64> {
        self.inner.lock().unwrap().import_log.clone()
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn compare_and_sets(&self) -> usize {
        self.compare_and_sets.load(Ordering::SeqCst)
    }

    pub fn justification(&self, hash: &Hash) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().justifications.get(hash).cloned()
    }

    pub fn add_to_pool(&self, extrinsic: Extrinsic) {
        self.inner.lock().unwrap().pool.insert(extrinsic);
    }

    pub fn pool_len(&self) -> usize {
        self.inner.lock().unwrap().pool.len()
    }

    pub fn fail_execution_at(&self, number: Option<u64>) {
        self.inner.lock().unwrap().fail_execution_at = number;
    }

    pub fn panic_at(&self, number: Option<u64>) {
        self.inner.lock().unwrap().panic_at = number;
    }
}

impl BlockState for MockChain {
    fn has_header(&self, hash: &Hash) -> Result<bool> {
        Ok(self.inner.lock().unwrap().headers.contains_key(hash))
    }

    fn has_block_body(&self, hash: &Hash) -> Result<bool> {
        Ok(self.inner.lock().unwrap().bodies.contains_key(hash))
    }

    fn get_header(&self, hash: &Hash) -> Result<Option<Header>> {
        Ok(self.inner.lock().unwrap().headers.get(hash).cloned())
    }

    fn get_block_body(&self, hash: &Hash) -> Result<Option<Body>> {
        Ok(self.inner.lock().unwrap().bodies.get(hash).cloned())
    }

    fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>> {
        let inner = self.inner.lock().unwrap();
        let header = inner.headers.get(hash).cloned();
        let body = inner.bodies.get(hash).cloned();
        Ok(header.zip(body).map(|(header, body)| Block::new(header, body)))
    }

    fn add_block_to_block_tree(&self, block: &Block) -> Result<(), BlockTreeError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.headers.contains_key(&block.header.parent_hash) {
            return Err(BlockTreeError::ParentNotFound {
                parent: block.header.parent_hash,
            });
        }
        if !inner.tree.insert((block.header.parent_hash, block.number())) {
            return Err(BlockTreeError::BlockExists);
        }
        Ok(())
    }

    fn set_justification(&self, hash: &Hash, justification: &[u8]) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .justifications
            .insert(*hash, justification.to_vec());
        Ok(())
    }

    fn compare_and_set_block_data(&self, data: &BlockData) -> Result<()> {
        self.compare_and_sets.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        if let Some(header) = data.header.clone() {
            inner.headers.insert(data.hash, header);
        }
        if let Some(body) = data.body.clone() {
            inner.bodies.insert(data.hash, body);
        }
        Ok(())
    }

    fn get_runtime(&self, _hash: &Hash) -> Result<Arc<dyn RuntimeInstance>> {
        let inner = self.inner.lock().unwrap();
        Ok(Arc::new(MockRuntime {
            context: Mutex::new(None),
            executions: self.executions.clone(),
            fail_at: inner.fail_execution_at,
            panic_at: inner.panic_at,
        }))
    }
}

impl StorageState for MockChain {
    fn lock(&self) {
        let mut locked = self.storage_locked.lock().unwrap();
        while *locked {
            locked = self.storage_released.wait(locked).unwrap();
        }
        *locked = true;
    }

    fn unlock(&self) {
        *self.storage_locked.lock().unwrap() = false;
        self.storage_released.notify_one();
    }

    fn trie_state(&self, root: &Hash) -> Result<Option<TrieState>> {
        Ok(self.inner.lock().unwrap().states.get(root).cloned())
    }
}

impl TransactionState for MockChain {
    fn remove_extrinsic(&self, extrinsic: &Extrinsic) {
        self.inner.lock().unwrap().pool.remove(extrinsic);
    }
}

impl HeaderVerifier for MockChain {
    fn verify_block(&self, header: &Header) -> Result<()> {
        if header.number == 0 {
            bail!("genesis cannot be imported");
        }
        Ok(())
    }
}

impl FinalityGadget for MockChain {
    fn verify_block_justification(&self, _hash: &Hash, justification: &[u8]) -> Result<()> {
        if justification.len() < 2 {
            bail!("justification too short");
        }
        Ok(())
    }
}

impl BlockImportHandler for MockChain {
    fn handle_block_import(&self, block: &Block, _state: &TrieState) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.import_log.push(block.number());
        inner.tree.insert((block.header.parent_hash, block.number()));
        inner
            .states
            .insert(block.header.state_root, TrieState::new(block.header.state_root));
        Ok(())
    }
}

struct MockRuntime {
    context: Mutex<Option<TrieState>>,
    executions: Arc<AtomicUsize>,
    fail_at: Option<u64>,
    panic_at: Option<u64>,
}

impl RuntimeInstance for MockRuntime {
    fn set_context_storage(&self, state: TrieState) {
        *self.context.lock().unwrap() = Some(state);
    }

    fn execute_block(&self, block: &Block) -> Result<Bytes> {
        if self.context.lock().unwrap().is_none() {
            bail!("context storage not set");
        }
        self.executions.fetch_add(1, Ordering::SeqCst);
        if self.panic_at == Some(block.number()) {
            panic!("runtime trapped at block {}", block.number());
        }
        if self.fail_at == Some(block.number()) {
            bail!("execution failed at block {}", block.number());
        }
        Ok(Bytes::copy_from_slice(&block.number().to_le_bytes()))
    }
}

/// Pending-set stand-in that only tracks which hashes are still waiting.
#[derive(Default)]
pub struct PendingBlocks {
    hashes: Mutex<HashSet<Hash>>,
}

impl PendingBlocks {
    pub fn add(&self, hash: Hash) {
        self.hashes.lock().unwrap().insert(hash);
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.hashes.lock().unwrap().contains(hash)
    }
}

impl DisjointBlockSet for PendingBlocks {
    fn remove_block(&self, hash: &Hash) {
        self.hashes.lock().unwrap().remove(hash);
    }

    fn size(&self) -> usize {
        self.hashes.lock().unwrap().len()
    }
}
