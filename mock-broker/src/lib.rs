//! In-process message broker
//!
//! Backs the `mem://` server scheme and the test-suite. Subjects keep their full history so
//! that late subscribers can replay it, queue groups load-balance each message to a single
//! member, and asynchronous publishes are throttled per connection and acknowledged from a
//! separate task. Faults can be injected to exercise the harness' fail-fast paths.
use bytes::Bytes;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use stampede_core::transport::{
    AckHandler, ConnectOptions, Connection, Connector, Delivery, MessageHandler, StartPosition,
    Subscription, TransportError,
};
use stampede_core::DEFAULT_CLUSTER_ID;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, trace, warn};

/// How a queue group picks the member that receives a message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueueRouting {
    #[default]
    RoundRobin,
    /// Always the longest-standing member. The most uneven split possible.
    Sticky,
    /// Uniformly random member, seeded for reproducibility.
    Random(u64),
}

#[derive(Clone, Debug)]
pub struct BrokerConfig {
    pub cluster_id: String,
    pub routing: QueueRouting,
    pub credentials: Option<(String, String)>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            cluster_id: DEFAULT_CLUSTER_ID.to_string(),
            routing: QueueRouting::default(),
            credentials: None,
        }
    }
}

impl BrokerConfig {
    pub fn cluster_id(mut self, cluster_id: &str) -> Self {
        self.cluster_id = cluster_id.to_string();
        self
    }

    pub fn routing(mut self, routing: QueueRouting) -> Self {
        self.routing = routing;
        self
    }

    pub fn credentials(mut self, user: &str, password: &str) -> Self {
        self.credentials = Some((user.to_string(), password.to_string()));
        self
    }
}

/// Cheaply cloneable handle to a shared in-memory broker.
#[derive(Clone)]
pub struct MockBroker {
    inner: Arc<Inner>,
}

struct Inner {
    config: BrokerConfig,
    state: Mutex<State>,
    faults: Faults,
    next_route: AtomicU64,
}

#[derive(Default)]
struct Faults {
    refused: Mutex<HashSet<String>>,
    fail_acks: AtomicBool,
    fail_publishes: AtomicBool,
}

struct State {
    topics: HashMap<String, Topic>,
    clients: HashMap<String, watch::Sender<Option<TransportError>>>,
    rng: SmallRng,
}

#[derive(Default)]
struct Topic {
    next_sequence: u64,
    history: Vec<(u64, Bytes)>,
    plain: Vec<Arc<Route>>,
    groups: HashMap<String, Group>,
}

#[derive(Default)]
struct Group {
    members: Vec<Arc<Route>>,
    cursor: usize,
}

impl Group {
    fn pick(&mut self, routing: QueueRouting, rng: &mut SmallRng) -> Option<&Arc<Route>> {
        if self.members.is_empty() {
            return None;
        }
        let idx = match routing {
            QueueRouting::RoundRobin => {
                let idx = self.cursor % self.members.len();
                self.cursor = self.cursor.wrapping_add(1);
                idx
            }
            QueueRouting::Sticky => 0,
            QueueRouting::Random(_) => rng.gen_range(0..self.members.len()),
        };
        self.members.get(idx)
    }
}

struct Route {
    id: u64,
    client_id: String,
    tx: mpsc::UnboundedSender<Delivery>,
    closed: Arc<AtomicBool>,
}

impl Route {
    fn send(&self, delivery: Delivery) {
        // The delivery task only goes away once the route is closed.
        let _ = self.tx.send(delivery);
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBroker {
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    pub fn with_config(config: BrokerConfig) -> Self {
        let seed = match config.routing {
            QueueRouting::Random(seed) => seed,
            _ => 0,
        };
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State {
                    topics: HashMap::new(),
                    clients: HashMap::new(),
                    rng: SmallRng::seed_from_u64(seed),
                }),
                faults: Faults::default(),
                next_route: AtomicU64::new(1),
            }),
        }
    }

    /// Reject future connection attempts from `client_id`.
    pub fn refuse(&self, client_id: &str) {
        self.inner
            .faults
            .refused
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(client_id.to_string());
    }

    /// Make every subsequent asynchronous acknowledgement report a failure.
    pub fn fail_acks(&self, fail: bool) {
        self.inner.faults.fail_acks.store(fail, Ordering::Release);
    }

    /// Make every subsequent publish fail outright.
    pub fn fail_publishes(&self, fail: bool) {
        self.inner.faults.fail_publishes.store(fail, Ordering::Release);
    }

    /// Drop `client_id`'s connection as if the server went away.
    pub fn sever(&self, client_id: &str, reason: &str) -> bool {
        let mut state = self.state();
        let Some(tx) = state.clients.remove(client_id) else {
            return false;
        };
        warn!("Severing connection for {client_id}: {reason}");
        let _ = tx.send(Some(TransportError::ConnectionLost(reason.to_string())));
        remove_client_routes(&mut state, client_id);
        true
    }

    /// Seed `subject` with messages, as if an earlier run had published them.
    pub fn preload(&self, subject: &str, count: u64, payload: Bytes) {
        let mut state = self.state();
        let topic = state.topics.entry(subject.to_string()).or_default();
        for _ in 0..count {
            topic.next_sequence += 1;
            topic.history.push((topic.next_sequence, payload.clone()));
        }
    }

    /// Number of messages retained for `subject`.
    pub fn retained(&self, subject: &str) -> usize {
        self.state()
            .topics
            .get(subject)
            .map(|t| t.history.len())
            .unwrap_or(0)
    }

    /// Number of open subscriptions on `subject`, queue members included.
    pub fn subscriptions(&self, subject: &str) -> usize {
        self.state()
            .topics
            .get(subject)
            .map(|t| t.plain.len() + t.groups.values().map(|g| g.members.len()).sum::<usize>())
            .unwrap_or(0)
    }

    pub fn connected_clients(&self) -> usize {
        self.state().clients.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn route(&self, client_id: &str, subject: &str, payload: Bytes) -> Result<u64, TransportError> {
        if self.inner.faults.fail_publishes.load(Ordering::Acquire) {
            return Err(TransportError::Publish("rejected by server".to_string()));
        }

        let mut state = self.state();
        if !state.clients.contains_key(client_id) {
            return Err(TransportError::Closed);
        }

        let State { topics, rng, .. } = &mut *state;
        let topic = topics.entry(subject.to_string()).or_default();
        topic.next_sequence += 1;
        let sequence = topic.next_sequence;
        topic.history.push((sequence, payload.clone()));

        let delivery = Delivery {
            subject: subject.to_string(),
            sequence,
            payload,
        };
        for route in &topic.plain {
            route.send(delivery.clone());
        }
        for group in topic.groups.values_mut() {
            if let Some(route) = group.pick(self.inner.config.routing, rng) {
                route.send(delivery.clone());
            }
        }

        trace!("Routed {subject} #{sequence}");
        Ok(sequence)
    }

    fn register(
        &self,
        client_id: &str,
        subject: &str,
        queue_group: Option<&str>,
        start: StartPosition,
        handler: MessageHandler,
    ) -> Result<MockSubscription, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let route = Arc::new(Route {
            id: self.inner.next_route.fetch_add(1, Ordering::Relaxed),
            client_id: client_id.to_string(),
            tx,
            closed: closed.clone(),
        });

        {
            let mut state = self.state();
            if !state.clients.contains_key(client_id) {
                return Err(TransportError::Closed);
            }

            let topic = state.topics.entry(subject.to_string()).or_default();
            // A queue group shares one position in the subject, fixed by its first member.
            let replay = match queue_group {
                None => {
                    topic.plain.push(route.clone());
                    true
                }
                Some(name) => {
                    let group = topic.groups.entry(name.to_string()).or_default();
                    group.members.push(route.clone());
                    group.members.len() == 1
                }
            };

            if replay && start == StartPosition::AllAvailable {
                for (sequence, payload) in &topic.history {
                    route.send(Delivery {
                        subject: subject.to_string(),
                        sequence: *sequence,
                        payload: payload.clone(),
                    });
                }
            }
        }

        tokio::spawn(deliver(rx, closed, handler));

        debug!("{client_id} subscribed to {subject} (queue={queue_group:?}, start={start:?})");
        Ok(MockSubscription {
            broker: self.clone(),
            subject: subject.to_string(),
            queue_group: queue_group.map(str::to_string),
            route_id: route.id,
        })
    }

    fn unregister(&self, subject: &str, queue_group: Option<&str>, route_id: u64) {
        let mut state = self.state();
        let Some(topic) = state.topics.get_mut(subject) else {
            return;
        };

        match queue_group {
            None => retain_open(&mut topic.plain, |r| r.id != route_id),
            Some(name) => {
                if let Some(group) = topic.groups.get_mut(name) {
                    retain_open(&mut group.members, |r| r.id != route_id);
                    if group.members.is_empty() {
                        topic.groups.remove(name);
                    }
                }
            }
        }
    }

    fn disconnect(&self, client_id: &str) {
        let mut state = self.state();
        state.clients.remove(client_id);
        remove_client_routes(&mut state, client_id);
    }
}

/// Keep the routes matching `keep`; close the rest.
fn retain_open(routes: &mut Vec<Arc<Route>>, keep: impl Fn(&Route) -> bool) {
    routes.retain(|route| {
        let keep = keep(route);
        if !keep {
            route.closed.store(true, Ordering::Release);
        }
        keep
    });
}

fn remove_client_routes(state: &mut State, client_id: &str) {
    for topic in state.topics.values_mut() {
        retain_open(&mut topic.plain, |r| r.client_id != client_id);
        for group in topic.groups.values_mut() {
            retain_open(&mut group.members, |r| r.client_id != client_id);
        }
        topic.groups.retain(|_, g| !g.members.is_empty());
    }
}

async fn deliver(
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    closed: Arc<AtomicBool>,
    handler: MessageHandler,
) {
    while let Some(delivery) = rx.recv().await {
        if closed.load(Ordering::Acquire) {
            break;
        }
        handler(delivery);
    }
}

impl Connector for MockBroker {
    type Connection = MockConnection;

    async fn connect(
        &self,
        client_id: &str,
        options: &ConnectOptions,
    ) -> Result<MockConnection, TransportError> {
        let config = &self.inner.config;
        if options.cluster_id != config.cluster_id {
            return Err(TransportError::Connect(format!(
                "unknown cluster id {:?}",
                options.cluster_id
            )));
        }

        let refused = self
            .inner
            .faults
            .refused
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(client_id);
        if refused {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        if let Some((user, password)) = &config.credentials {
            match &options.user_password {
                Some((u, p)) if u == user && p == password => {}
                _ => return Err(TransportError::Auth("invalid user or password".to_string())),
            }
        }

        let (lost_tx, lost_rx) = watch::channel(None);
        {
            let mut state = self.state();
            if state.clients.contains_key(client_id) {
                return Err(TransportError::Connect(format!(
                    "client id {client_id:?} already registered"
                )));
            }
            state.clients.insert(client_id.to_string(), lost_tx);
        }

        debug!("{client_id} connected as {:?}", options.name);
        let max_inflight = options.max_pub_acks_inflight.max(1);
        Ok(MockConnection {
            broker: self.clone(),
            client_id: client_id.to_string(),
            inflight: Arc::new(Semaphore::new(max_inflight)),
            max_inflight,
            lost: lost_rx,
        })
    }
}

pub struct MockConnection {
    broker: MockBroker,
    client_id: String,
    inflight: Arc<Semaphore>,
    max_inflight: usize,
    lost: watch::Receiver<Option<TransportError>>,
}

impl MockConnection {
    /// Publishes currently awaiting an acknowledgement.
    pub fn pending_acks(&self) -> usize {
        self.max_inflight - self.inflight.available_permits()
    }
}

impl Connection for MockConnection {
    type Subscription = MockSubscription;

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError> {
        self.broker.route(&self.client_id, subject, payload)?;
        // Stand-in for the server round trip.
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn publish_async(
        &self,
        subject: &str,
        payload: Bytes,
        on_ack: AckHandler,
    ) -> Result<(), TransportError> {
        let permit = self
            .inflight
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Closed)?;

        self.broker.route(&self.client_id, subject, payload)?;

        let verdict = if self.broker.inner.faults.fail_acks.load(Ordering::Acquire) {
            Err(TransportError::Publish("negative acknowledgement".to_string()))
        } else {
            Ok(())
        };
        tokio::spawn(async move {
            on_ack(verdict);
            drop(permit);
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        subject: &str,
        queue_group: Option<&str>,
        start: StartPosition,
        handler: MessageHandler,
    ) -> Result<MockSubscription, TransportError> {
        self.broker
            .register(&self.client_id, subject, queue_group, start, handler)
    }

    async fn lost(&self) -> TransportError {
        let mut rx = self.lost.clone();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(reason) = current {
                return reason;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    async fn close(self) {
        drop(self);
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.broker.disconnect(&self.client_id);
    }
}

pub struct MockSubscription {
    broker: MockBroker,
    subject: String,
    queue_group: Option<String>,
    route_id: u64,
}

impl Subscription for MockSubscription {
    async fn close(self) -> Result<(), TransportError> {
        drop(self);
        Ok(())
    }
}

impl Drop for MockSubscription {
    fn drop(&mut self) {
        self.broker
            .unregister(&self.subject, self.queue_group.as_deref(), self.route_id);
    }
}
