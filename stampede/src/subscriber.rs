use crate::error::BenchError;
use crate::queue_group::{GroupProgress, QueueGroupState};
use crate::signal::OnceSignal;
use bytes::Bytes;
use stampede_core::transport::{
    ConnectOptions, Connection, Connector, MessageHandler, StartPosition, Subscription,
};
use stampede_core::{Sample, SENTINEL_PAYLOAD};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Per-subscriber delivery bookkeeping, driven from the message handler.
#[derive(Debug)]
pub(crate) struct DeliveryTally {
    received: AtomicU64,
    target: u64,
    group: Option<Arc<QueueGroupState>>,
    first: OnceSignal<Instant>,
    done: OnceSignal<Instant>,
}

/// The two single-fire timestamps a subscriber waits on.
pub(crate) struct Rendezvous {
    first: oneshot::Receiver<Instant>,
    done: oneshot::Receiver<Instant>,
}

impl DeliveryTally {
    pub fn new(target: u64, group: Option<Arc<QueueGroupState>>) -> (Arc<Self>, Rendezvous) {
        let (first, first_rx) = OnceSignal::new();
        let (done, done_rx) = OnceSignal::new();
        let tally = Arc::new(Self {
            received: AtomicU64::new(0),
            target,
            group,
            first,
            done,
        });

        if target == 0 {
            let now = Instant::now();
            tally.first.fire(now);
            tally.done.fire(now);
        }

        (
            tally,
            Rendezvous {
                first: first_rx,
                done: done_rx,
            },
        )
    }

    pub fn on_delivery(&self) {
        let now = Instant::now();
        let received = self.received.fetch_add(1, Ordering::AcqRel) + 1;
        self.first.fire(now);

        #[cfg(feature = "metrics")]
        metrics::counter!("stampede_received").increment(1);

        let complete = match &self.group {
            // Deliveries past the group's target are sentinels nudging this member out.
            Some(group) => group.record_delivery(self.target) != GroupProgress::Pending,
            None => received >= self.target,
        };
        if complete && self.done.fire(now) {
            trace!("Completed after {received} deliveries");
        }
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    pub fn is_done(&self) -> bool {
        self.done.is_fired()
    }
}

impl Rendezvous {
    /// Resolves with the first and the completing delivery's timestamps.
    pub async fn wait(self) -> Result<(Instant, Instant), BenchError> {
        let start = self.first.await.map_err(|_| BenchError::SignalDropped)?;
        let end = self.done.await.map_err(|_| BenchError::SignalDropped)?;
        Ok((start, end))
    }
}

pub(crate) struct Subscriber<C: Connector> {
    pub connector: Arc<C>,
    pub options: Arc<ConnectOptions>,
    pub client_id: String,
    pub subject: String,
    pub queue_group: Option<String>,
    pub target: u64,
    pub msg_size: usize,
    pub start: StartPosition,
    pub group: Option<Arc<QueueGroupState>>,
}

impl<C: Connector> Subscriber<C> {
    /// Subscribe, report readiness, then wait until this member is done.
    #[instrument(name = "subscriber", skip_all, fields(client = %self.client_id))]
    pub async fn run(self, ready: mpsc::Sender<()>) -> Result<Sample, BenchError> {
        let conn = self
            .connector
            .connect(&self.client_id, &self.options)
            .await
            .map_err(|source| BenchError::Connect {
                client: self.client_id.clone(),
                source,
            })?;

        let (tally, rendezvous) = DeliveryTally::new(self.target, self.group.clone());
        let handler_tally = tally.clone();
        let handler: MessageHandler = Box::new(move |_| handler_tally.on_delivery());

        let sub = conn
            .subscribe(
                &self.subject,
                self.queue_group.as_deref(),
                self.start,
                handler,
            )
            .await
            .map_err(|source| BenchError::Subscribe {
                client: self.client_id.clone(),
                source,
            })?;
        debug!("Subscribed to {}", self.subject);

        // The orchestrator only stops listening once it has given up on the run.
        let _ = ready.send(()).await;
        drop(ready);

        let (start, end) = tokio::select! {
            res = rendezvous.wait() => res?,
            err = conn.lost() => return Err(BenchError::lost(&self.client_id, err)),
        };
        debug_assert!(tally.is_done());

        sub.close().await.map_err(|source| BenchError::Subscribe {
            client: self.client_id.clone(),
            source,
        })?;
        let received = tally.received();

        if let Some(group) = &self.group {
            let remaining = group.leave();
            if remaining > 0 && self.target > 0 {
                debug!("Leaving queue group with {remaining} members still active");
                conn.publish(&self.subject, Bytes::from_static(SENTINEL_PAYLOAD))
                    .await
                    .map_err(|err| BenchError::publish(&self.client_id, err))?;

                #[cfg(feature = "metrics")]
                metrics::counter!("stampede_sentinels").increment(1);
            }
        }

        conn.close().await;
        debug!("Received {received} messages");
        Ok(Sample::new(received, self.msg_size, start, end))
    }
}
