//! Deferred callbacks that run on the owning session's tick.
//!
//! Any thread may [`post`](MessagerHandle::post) a closure; only the tick
//! that owns the target runs them, in posting order. Closures must carry
//! plain data (a guid, a flag) and look the target up again when they run,
//! because whatever they observed at posting time may be gone by then.

use tokio::sync::mpsc;

/// A deferred callback.
pub type Callback<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Cloneable posting side.
pub struct MessagerHandle<T> {
    tx: mpsc::UnboundedSender<Callback<T>>,
}

impl<T> Clone for MessagerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> MessagerHandle<T> {
    /// Schedules `callback` for the target's next tick. Returns `false`
    /// when the target is gone.
    pub fn post(&self, callback: impl FnOnce(&mut T) + Send + 'static) -> bool {
        self.tx.send(Box::new(callback)).is_ok()
    }
}

/// Receiving side, owned by the target.
pub struct Messager<T> {
    tx: mpsc::UnboundedSender<Callback<T>>,
    rx: mpsc::UnboundedReceiver<Callback<T>>,
}

impl<T> Default for Messager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Messager<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> MessagerHandle<T> {
        MessagerHandle {
            tx: self.tx.clone(),
        }
    }

    /// Takes everything posted so far.
    ///
    /// Callbacks posted while the returned batch runs wait for the next
    /// drain, so a callback that posts itself cannot loop forever.
    pub fn drain(&mut self) -> Vec<Callback<T>> {
        let mut batch = Vec::new();
        while let Ok(callback) = self.rx.try_recv() {
            batch.push(callback);
        }
        batch
    }

    /// Runs every pending callback against `target`.
    pub fn execute(&mut self, target: &mut T) {
        for callback in self.drain() {
            callback(target);
        }
    }
}
