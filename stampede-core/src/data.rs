use std::ops::Deref;
use std::time::{Duration, Instant, SystemTime};

/// Per-publisher message counts for a run.
///
/// The total is split as evenly as possible, with the remainder handed out one message at a
/// time to the lowest-indexed publishers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageShares(Vec<u64>);

impl MessageShares {
    pub fn split(total: u64, clients: usize) -> Self {
        if clients == 0 {
            return Self(vec![]);
        }

        let clients_u64 = clients as u64;
        let base = total / clients_u64;
        let extra = (total % clients_u64) as usize;

        Self(
            (0..clients)
                .map(|idx| if idx < extra { base + 1 } else { base })
                .collect(),
        )
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }
}

impl Deref for MessageShares {
    type Target = [u64];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// One client's measured interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sample {
    pub msg_count: u64,
    pub msg_size: usize,
    pub start: Instant,
    pub end: Instant,
}

impl Sample {
    pub fn new(msg_count: u64, msg_size: usize, start: Instant, end: Instant) -> Self {
        Self {
            msg_count,
            msg_size,
            start,
            end: end.max(start),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn msg_bytes(&self) -> u64 {
        self.msg_count.saturating_mul(self.msg_size as u64)
    }

    /// Messages per second.
    pub fn rate(&self) -> f64 {
        per_second(self.msg_count, self.duration())
    }

    /// Bytes per second.
    pub fn throughput(&self) -> f64 {
        per_second(self.msg_bytes(), self.duration())
    }
}

pub(crate) fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0. {
        count as f64 / secs
    } else {
        0.
    }
}

/// Pairs the monotonic clock with the wall clock at the start of a run so that sample
/// instants can be reported as timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Epoch {
    instant: Instant,
    system: SystemTime,
}

impl Epoch {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            system: SystemTime::now(),
        }
    }

    pub fn wall_time(&self, at: Instant) -> SystemTime {
        if at >= self.instant {
            self.system + (at - self.instant)
        } else {
            self.system - (self.instant - at)
        }
    }
}
