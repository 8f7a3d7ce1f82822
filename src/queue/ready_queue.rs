use super::sized_queue::QueueByteSize;
use crate::primitives::block_data::BlockData;
use crate::primitives::hash::Hash;
use std::collections::HashMap;
use std::sync::{Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, Mutex};

struct QueueEntry {
    data: BlockData,
    size_bytes: usize,
}

#[derive(Default)]
struct Membership {
    hashes: HashMap<Hash, usize>,
    len: usize,
    total_bytes: usize,
}

impl Membership {
    fn claim(&mut self, hash: Hash) {
        *self.hashes.entry(hash).or_insert(0) += 1;
    }

    fn release(&mut self, hash: &Hash) {
        if let Some(count) = self.hashes.get_mut(hash) {
            *count -= 1;
            if *count == 0 {
                self.hashes.remove(hash);
            }
        }
    }

    fn enqueue(&mut self, size_bytes: usize) {
        self.len += 1;
        self.total_bytes = self.total_bytes.saturating_add(size_bytes);
    }

    fn dequeue(&mut self, hash: &Hash, size_bytes: usize) {
        self.release(hash);
        self.len = self.len.saturating_sub(1);
        self.total_bytes = self.total_bytes.saturating_sub(size_bytes);
    }
}

/// Membership claimed by a push that is still waiting for a free slot.
///
/// Released on drop unless the item made it into the channel.
struct PendingClaim<'a> {
    queue: &'a ReadyQueue,
    hash: Hash,
    committed: bool,
}

impl<'a> PendingClaim<'a> {
    fn new(queue: &'a ReadyQueue, hash: Hash) -> Self {
        queue.membership().claim(hash);
        Self {
            queue,
            hash,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.queue.membership().release(&self.hash);
        }
    }
}

/// Bounded FIFO of assembled block data, shared by many producers and a single consumer.
///
/// A hash is reported by [`ReadyQueue::has`] from the moment a push for it begins, including
/// while that push waits for a free slot, until the item carrying it is popped. A push that is
/// dropped before its item enters the channel withdraws the hash again, so `has` never reports
/// an item that `pop` will not eventually yield.
pub struct ReadyQueue {
    capacity: usize,
    tx: mpsc::Sender<QueueEntry>,
    rx: Mutex<mpsc::Receiver<QueueEntry>>,
    membership: StdMutex<Membership>,
}

impl ReadyQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            capacity,
            tx,
            rx: Mutex::new(rx),
            membership: StdMutex::new(Membership::default()),
        }
    }

    /// Enqueues `data`, waiting for a free slot while the queue is at capacity.
    ///
    /// The hash becomes visible to [`ReadyQueue::has`] before the wait starts. Cancel-safe:
    /// dropping the future before it resolves enqueues nothing and withdraws the hash.
    pub async fn push(&self, data: BlockData) {
        let size_bytes = data.queue_bytes();
        let claim = PendingClaim::new(self, data.hash);
        let permit = match self.tx.reserve().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("ready queue owns its receiver"),
        };

        claim.commit();
        self.membership().enqueue(size_bytes);
        permit.send(QueueEntry { data, size_bytes });
    }

    /// Waits for the next item and removes it from the queue.
    ///
    /// Cancel-safe: dropping the returned future before it resolves loses no item.
    pub async fn pop(&self) -> BlockData {
        let entry = {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        };
        let Some(entry) = entry else {
            unreachable!("ready queue owns a sender");
        };

        self.membership().dequeue(&entry.data.hash, entry.size_bytes);
        entry.data
    }

    /// Non-blocking membership test for items enqueued or being pushed.
    pub fn has(&self, hash: &Hash) -> bool {
        self.membership().hashes.contains_key(hash)
    }

    /// Items sitting in the queue; pushes still waiting for a slot are not counted.
    pub fn len(&self) -> usize {
        self.membership().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate bytes retained by queued items.
    pub fn bytes(&self) -> usize {
        self.membership().total_bytes
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn membership(&self) -> MutexGuard<'_, Membership> {
        self.membership
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
