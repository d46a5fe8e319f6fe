use stampede_core::transport::TransportError;
use std::sync::PoisonError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{client}: can't connect: {source}")]
    Connect {
        client: String,
        #[source]
        source: TransportError,
    },

    #[error("{client}: can't subscribe: {source}")]
    Subscribe {
        client: String,
        #[source]
        source: TransportError,
    },

    #[error("{client}: error during publish: {source}")]
    Publish {
        client: String,
        #[source]
        source: TransportError,
    },

    #[error("{client}: connection lost: {source}")]
    ConnectionLost {
        client: String,
        #[source]
        source: TransportError,
    },

    #[error("Worker task panicked: {0}")]
    WorkerPanicked(String),

    #[error("A worker exited before its subscription was established.")]
    StartBarrier,

    #[error("Completion signal dropped before it fired.")]
    SignalDropped,

    #[error("Mutex is poisoned.")]
    PoisonData,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    pub(crate) fn publish(client: &str, source: TransportError) -> Self {
        Self::Publish {
            client: client.to_string(),
            source,
        }
    }

    pub(crate) fn lost(client: &str, source: TransportError) -> Self {
        Self::ConnectionLost {
            client: client.to_string(),
            source,
        }
    }
}

impl<T> From<PoisonError<T>> for BenchError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::PoisonData
    }
}
