//! A thread-safe FIFO of envelopes.
//!
//! Producers (the network reader) push under a short lock. The consumer
//! (a tick) takes the whole backlog in one swap and processes it with the
//! lock released, so a slow handler never stalls a producer.

use std::collections::VecDeque;

use parking_lot::Mutex;
use realmkeep_protocol::Envelope;

#[derive(Debug, Default)]
pub struct PacketQueue {
    inner: Mutex<VecDeque<Envelope>>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, envelope: Envelope) {
        self.inner.lock().push_back(envelope);
    }

    /// Swaps the backlog out, leaving the queue empty.
    pub fn take_all(&self) -> VecDeque<Envelope> {
        std::mem::take(&mut *self.inner.lock())
    }

    /// Keeps only the envelopes matching `keep`.
    pub fn retain(&self, keep: impl FnMut(&Envelope) -> bool) {
        self.inner.lock().retain(keep);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
