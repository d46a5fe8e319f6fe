//! Benchmark orchestration
//!
//! A run spawns every subscriber, waits until each one holds an active subscription, then
//! spawns the publishers with their share of the messages and waits for every worker to
//! finish. The first worker error ends the run and abandons the remaining workers.
use crate::aggregator::Aggregator;
use crate::error::BenchError;
use crate::publisher::Publisher;
use crate::queue_group::QueueGroupState;
use crate::subscriber::Subscriber;
use bytes::Bytes;
use stampede_core::transport::{ConnectOptions, Connector};
use stampede_core::{MessageShares, Report, Role, RunConfig, BENCH_NAME};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

pub struct Benchmark<C: Connector> {
    connector: Arc<C>,
    options: Arc<ConnectOptions>,
    config: RunConfig,
    name: String,
}

impl<C: Connector> Benchmark<C> {
    pub fn new(connector: C, mut options: ConnectOptions, config: RunConfig) -> Self {
        options.max_pub_acks_inflight = config.max_pub_acks_inflight;
        Self {
            connector: Arc::new(connector),
            options: Arc::new(options),
            config,
            name: BENCH_NAME.to_string(),
        }
    }

    /// Title used for the combined line of the report.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    #[instrument(name = "benchmark", skip_all, fields(subject = %self.config.subject))]
    pub async fn run(&self) -> Result<Report, BenchError> {
        let config = &self.config;
        let shares = MessageShares::split(config.num_msgs, config.num_pubs);
        let aggregator = Arc::new(Aggregator::new(&self.name));
        let group = config
            .queue_group
            .as_ref()
            .map(|_| Arc::new(QueueGroupState::new(config.num_subs)));

        let started = Instant::now();
        let mut workers = JoinSet::new();

        let (ready_tx, mut ready_rx) = mpsc::channel(config.num_subs.max(1));
        for idx in 0..config.num_subs {
            let client_id = config.subscriber_id(idx);
            let subscriber = Subscriber {
                connector: self.connector.clone(),
                options: self.options.clone(),
                client_id: client_id.clone(),
                subject: config.subject.clone(),
                queue_group: config.queue_group.clone(),
                target: config.num_msgs,
                msg_size: config.message_size,
                start: config.start_position(),
                group: group.clone(),
            };
            let ready = ready_tx.clone();
            let aggregator = aggregator.clone();
            workers.spawn(async move {
                let sample = subscriber.run(ready).await?;
                aggregator.add(Role::Subscriber, idx, &client_id, sample)
            });
        }
        drop(ready_tx);

        let mut subscribed = 0;
        while subscribed < config.num_subs {
            tokio::select! {
                Some(()) = ready_rx.recv() => subscribed += 1,
                Some(res) = workers.join_next() => settle(res)?,
                else => return Err(BenchError::StartBarrier),
            }
        }
        debug!("All {subscribed} subscribers are ready");

        let payload = Bytes::from(vec![0u8; config.message_size]);
        for (idx, num_msgs) in shares.iter().copied().enumerate() {
            let client_id = config.publisher_id(idx);
            let publisher = Publisher {
                connector: self.connector.clone(),
                options: self.options.clone(),
                client_id: client_id.clone(),
                subject: config.subject.clone(),
                num_msgs,
                payload: payload.clone(),
                mode: config.publish_mode,
            };
            let aggregator = aggregator.clone();
            workers.spawn(async move {
                let sample = publisher.run().await?;
                aggregator.add(Role::Publisher, idx, &client_id, sample)
            });
        }

        info!(
            "Starting benchmark [msgs={}, msgsize={}, pubs={}, subs={}]",
            config.num_msgs, config.message_size, config.num_pubs, config.num_subs
        );

        while let Some(res) = workers.join_next().await {
            settle(res)?;
        }

        let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);
        info!("Benchmark finished in {}", humantime::format_duration(elapsed));
        aggregator.finalize()
    }
}

fn settle(res: Result<Result<(), BenchError>, JoinError>) -> Result<(), BenchError> {
    match res {
        Ok(res) => res,
        Err(err) => Err(BenchError::WorkerPanicked(err.to_string())),
    }
}
