/// Name printed at the top of a report.
pub const BENCH_NAME: &str = "Stampede";

pub const DEFAULT_NUM_MSGS: u64 = 100_000;
pub const DEFAULT_NUM_PUBS: usize = 10;
pub const DEFAULT_NUM_SUBS: usize = 0;
pub const DEFAULT_MESSAGE_SIZE: usize = 128;
pub const DEFAULT_IGNORE_OLD: bool = false;
pub const DEFAULT_MAX_PUB_ACKS_INFLIGHT: usize = 512;
pub const DEFAULT_CLIENT_ID: &str = "benchmark";
pub const DEFAULT_CLUSTER_ID: &str = "test-cluster";
pub const DEFAULT_SERVER_URL: &str = "mem://local";

/// Connection label sent along with every worker connection.
pub const CONNECTION_NAME: &str = "Stampede Benchmark";

/// Payload of the message a finished queue-group member publishes to wake its siblings.
pub const SENTINEL_PAYLOAD: &[u8] = b"done";
