use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// What a single delivery did to the group's shared total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupProgress {
    /// Counted; the target is still ahead.
    Pending,
    /// Counted, and this delivery was the one that reached the target.
    Reached,
    /// Not counted. The target was reached by an earlier delivery.
    AlreadyReached,
}

/// Coordination state shared by the members of one queue group for one run.
#[derive(Debug)]
pub struct QueueGroupState {
    delivered: AtomicU64,
    active: AtomicUsize,
}

impl QueueGroupState {
    pub fn new(members: usize) -> Self {
        Self {
            delivered: AtomicU64::new(0),
            active: AtomicUsize::new(members),
        }
    }

    /// Count one delivery against `target`. The total never exceeds `target`, so exactly one
    /// caller observes [`GroupProgress::Reached`].
    pub fn record_delivery(&self, target: u64) -> GroupProgress {
        match self
            .delivered
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < target).then_some(n + 1)
            }) {
            Ok(prev) if prev + 1 == target => GroupProgress::Reached,
            Ok(_) => GroupProgress::Pending,
            Err(_) => GroupProgress::AlreadyReached,
        }
    }

    /// Mark one member finished and return how many are still active.
    pub fn leave(&self) -> usize {
        match self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(prev) => prev - 1,
            Err(_) => 0,
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Acquire)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}
