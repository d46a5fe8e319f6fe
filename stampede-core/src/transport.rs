//! Messaging collaborator interface
//!
//! The harness never speaks a wire protocol itself. Everything it needs from the messaging
//! layer goes through these traits: connecting a named client, publishing (blocking or with an
//! asynchronous acknowledgement), subscribing with a delivery callback, and learning that a
//! connection was lost after setup.
use bytes::Bytes;
use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;

use crate::{CONNECTION_NAME, DEFAULT_CLUSTER_ID, DEFAULT_MAX_PUB_ACKS_INFLIGHT};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Unable to connect: {0}")]
    Connect(String),

    #[error("Authorization violation: {0}")]
    Auth(String),

    #[error("Subscription failed: {0}")]
    Subscribe(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Connection closed")]
    Closed,
}

/// Where a new subscription starts reading the subject.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartPosition {
    /// Only messages published after the subscription exists.
    NewOnly,
    /// Replay the subject's retained history before live delivery.
    AllAvailable,
}

/// A single message handed to a subscription's handler.
#[derive(Clone, Debug)]
pub struct Delivery {
    pub subject: String,
    pub sequence: u64,
    pub payload: Bytes,
}

/// Invoked once per delivered message, possibly concurrently with other subscriptions'
/// handlers.
pub type MessageHandler = Box<dyn Fn(Delivery) + Send + Sync + 'static>;

/// Invoked exactly once per asynchronous publish with the server's verdict.
pub type AckHandler = Box<dyn FnOnce(Result<(), TransportError>) + Send + 'static>;

#[derive(Clone, Debug)]
pub struct ConnectOptions {
    pub name: String,
    pub cluster_id: String,
    pub credentials: Option<PathBuf>,
    pub user_password: Option<(String, String)>,
    pub root_certificates: Vec<PathBuf>,
    pub client_certificate: Option<(PathBuf, PathBuf)>,
    pub max_pub_acks_inflight: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            name: CONNECTION_NAME.to_string(),
            cluster_id: DEFAULT_CLUSTER_ID.to_string(),
            credentials: None,
            user_password: None,
            root_certificates: vec![],
            client_certificate: None,
            max_pub_acks_inflight: DEFAULT_MAX_PUB_ACKS_INFLIGHT,
        }
    }
}

pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    fn connect(
        &self,
        client_id: &str,
        options: &ConnectOptions,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

pub trait Connection: Send + Sync + 'static {
    type Subscription: Subscription;

    /// Publish and wait for the server to acknowledge.
    fn publish(
        &self,
        subject: &str,
        payload: Bytes,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Publish without waiting for the acknowledgement.
    ///
    /// Resolves once the message is handed off, which may take a while if the connection
    /// already has its maximum number of unacknowledged publishes outstanding. `on_ack` runs
    /// exactly once, later, with the outcome.
    fn publish_async(
        &self,
        subject: &str,
        payload: Bytes,
        on_ack: AckHandler,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Subscribe to `subject`, optionally as a member of `queue_group`.
    ///
    /// The subscription is registered by the time this resolves.
    fn subscribe(
        &self,
        subject: &str,
        queue_group: Option<&str>,
        start: StartPosition,
        handler: MessageHandler,
    ) -> impl Future<Output = Result<Self::Subscription, TransportError>> + Send;

    /// Resolves if the connection is lost after setup. Never resolves otherwise.
    fn lost(&self) -> impl Future<Output = TransportError> + Send;

    fn close(self) -> impl Future<Output = ()> + Send;
}

pub trait Subscription: Send + Sync + 'static {
    /// Stop routing messages to this subscription. No handler invocation starts after this
    /// resolves.
    fn close(self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
