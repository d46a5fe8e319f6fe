use std::sync::{Mutex, PoisonError};
use tokio::sync::oneshot;

/// A single-fire notification that can be triggered through a shared reference.
///
/// Only the first `fire` delivers its value; later calls are no-ops.
#[derive(Debug)]
pub(crate) struct OnceSignal<T> {
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> OnceSignal<T> {
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Returns whether this call was the one that fired.
    pub fn fire(&self, value: T) -> bool {
        // Called from message and ack callbacks, which have nowhere to propagate a poison error.
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match tx {
            Some(tx) => {
                // The receiver may have given up already; that is not this side's concern.
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    pub fn is_fired(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
