use crate::ack::AckTracker;
use crate::error::BenchError;
use bytes::Bytes;
use stampede_core::transport::{ConnectOptions, Connection, Connector};
use stampede_core::{PublishMode, Sample};
use std::sync::Arc;
use std::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

pub(crate) struct Publisher<C: Connector> {
    pub connector: Arc<C>,
    pub options: Arc<ConnectOptions>,
    pub client_id: String,
    pub subject: String,
    pub num_msgs: u64,
    pub payload: Bytes,
    pub mode: PublishMode,
}

impl<C: Connector> Publisher<C> {
    #[instrument(name = "publisher", skip_all, fields(client = %self.client_id, msgs = self.num_msgs))]
    pub async fn run(self) -> Result<Sample, BenchError> {
        let conn = self
            .connector
            .connect(&self.client_id, &self.options)
            .await
            .map_err(|source| BenchError::Connect {
                client: self.client_id.clone(),
                source,
            })?;

        let (start, end) = tokio::select! {
            res = self.publish_all(&conn) => res?,
            err = conn.lost() => return Err(BenchError::lost(&self.client_id, err)),
        };

        conn.close().await;
        debug!("Published {} messages", self.num_msgs);
        Ok(Sample::new(self.num_msgs, self.payload.len(), start, end))
    }

    async fn publish_all(&self, conn: &C::Connection) -> Result<(Instant, Instant), BenchError> {
        let start = Instant::now();

        match self.mode {
            PublishMode::Sync => {
                for _ in 0..self.num_msgs {
                    conn.publish(&self.subject, self.payload.clone())
                        .await
                        .map_err(|err| BenchError::publish(&self.client_id, err))?;

                    #[cfg(feature = "metrics")]
                    metrics::counter!("stampede_published").increment(1);
                }
            }
            PublishMode::Async => {
                let (tracker, completion) = AckTracker::new(self.num_msgs);
                for _ in 0..self.num_msgs {
                    conn.publish_async(&self.subject, self.payload.clone(), tracker.handler())
                        .await
                        .map_err(|err| BenchError::publish(&self.client_id, err))?;

                    #[cfg(feature = "metrics")]
                    metrics::counter!("stampede_published").increment(1);
                }
                drop(tracker);

                match completion.wait().await {
                    Some(Ok(())) => {}
                    Some(Err(err)) => return Err(BenchError::publish(&self.client_id, err)),
                    None => return Err(BenchError::SignalDropped),
                }
            }
        }

        Ok((start, Instant::now()))
    }
}
