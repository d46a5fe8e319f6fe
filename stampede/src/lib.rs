//! Stampede
//!
//! Drives concurrent publishers and subscribers against a single subject of a streaming
//! pub/sub server and reports the throughput each side achieved.
//!
//! ```ignore
//! use mock_broker::MockBroker;
//! use stampede::{Benchmark, ConnectOptions, RunConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RunConfig::new("foo").publishers(4).subscribers(2);
//!     let report = Benchmark::new(MockBroker::new(), ConnectOptions::default(), config)
//!         .run()
//!         .await
//!         .unwrap();
//!     print!("{report}");
//! }
//! ```
mod ack;
mod aggregator;
mod bench;
pub mod cli;
mod error;
mod publisher;
mod queue_group;
mod signal;
mod subscriber;

pub use ack::{AckCompletion, AckTracker};
pub use aggregator::Aggregator;
pub use bench::Benchmark;
pub use error::BenchError;
pub use queue_group::{GroupProgress, QueueGroupState};
pub use stampede_core::transport::{self, ConnectOptions, StartPosition, TransportError};
pub use stampede_core::{
    ClientSample, Epoch, MessageShares, PublishMode, Report, Role, RunConfig, Sample, SampleGroup,
};
