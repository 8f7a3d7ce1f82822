use bytes::Bytes;

/// Trait describing how many bytes a value contributes to the ready-queue footprint.
///
/// The ready queue is bounded by item count; byte accounting only feeds the metrics reporter so
/// operators can see how much block data is parked between ingestion and import.
pub trait QueueByteSize {
    /// Estimate the number of bytes retained when this value is enqueued.
    fn queue_bytes(&self) -> usize;
}

impl QueueByteSize for [u8] {
    fn queue_bytes(&self) -> usize {
        self.len()
    }
}

impl QueueByteSize for Bytes {
    fn queue_bytes(&self) -> usize {
        self.len()
    }
}

impl<T: QueueByteSize + ?Sized> QueueByteSize for Box<T> {
    fn queue_bytes(&self) -> usize {
        (**self).queue_bytes()
    }
}

impl<T: QueueByteSize> QueueByteSize for Option<T> {
    fn queue_bytes(&self) -> usize {
        self.as_ref().map(QueueByteSize::queue_bytes).unwrap_or(0)
    }
}

impl<T: QueueByteSize> QueueByteSize for Vec<T> {
    fn queue_bytes(&self) -> usize {
        self.iter()
            .fold(0usize, |acc, item| acc.saturating_add(item.queue_bytes()))
            .saturating_add(core::mem::size_of::<usize>() * 3)
    }
}
