use crate::signal::OnceSignal;
use stampede_core::transport::{AckHandler, TransportError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Counts asynchronous publish acknowledgements against a target and resolves once, either
/// when the last one arrives or when the first failure does.
#[derive(Clone, Debug)]
pub struct AckTracker {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    target: u64,
    acked: AtomicU64,
    done: OnceSignal<Result<(), TransportError>>,
}

/// Receiving half of an [`AckTracker`].
#[derive(Debug)]
pub struct AckCompletion {
    rx: oneshot::Receiver<Result<(), TransportError>>,
}

impl AckTracker {
    pub fn new(target: u64) -> (Self, AckCompletion) {
        let (done, rx) = OnceSignal::new();
        let tracker = Self {
            inner: Arc::new(Inner {
                target,
                acked: AtomicU64::new(0),
                done,
            }),
        };

        if target == 0 {
            tracker.inner.done.fire(Ok(()));
        }

        (tracker, AckCompletion { rx })
    }

    /// Callback to hand to one asynchronous publish.
    pub fn handler(&self) -> AckHandler {
        let tracker = self.clone();
        Box::new(move |res| tracker.record(res))
    }

    pub fn record(&self, res: Result<(), TransportError>) {
        match res {
            Ok(()) => {
                let acked = self.inner.acked.fetch_add(1, Ordering::AcqRel) + 1;

                #[cfg(feature = "metrics")]
                metrics::counter!("stampede_acked").increment(1);

                if acked == self.inner.target {
                    self.inner.done.fire(Ok(()));
                }
            }
            Err(err) => {
                self.inner.done.fire(Err(err));
            }
        }
    }

    pub fn acked(&self) -> u64 {
        self.inner.acked.load(Ordering::Acquire)
    }
}

impl AckCompletion {
    /// `None` if every tracker handle was dropped before completion.
    pub async fn wait(self) -> Option<Result<(), TransportError>> {
        self.rx.await.ok()
    }
}
