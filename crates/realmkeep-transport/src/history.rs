//! Bounded record of the most recent opcodes seen on a connection.
//!
//! Purely diagnostic: when a session is kicked for a bad payload, the
//! history says what the client was doing right before.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Default number of opcodes remembered per connection.
pub const DEFAULT_HISTORY_CAPACITY: usize = 32;

/// A fixed-capacity ring of raw opcode values, oldest first.
///
/// Written by the connection's reader task, read from any thread.
#[derive(Debug)]
pub struct OpcodeHistory {
    capacity: usize,
    recent: Mutex<VecDeque<u16>>,
}

impl OpcodeHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Records an opcode, evicting the oldest entry when full.
    pub fn record(&self, opcode: u16) {
        if self.capacity == 0 {
            return;
        }
        let mut recent = self.recent.lock();
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(opcode);
    }

    /// Copies the history out, oldest first.
    pub fn snapshot(&self) -> Vec<u16> {
        self.recent.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.recent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.lock().is_empty()
    }
}

impl Default for OpcodeHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
