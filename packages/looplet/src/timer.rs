use crate::task::Task;
use smallvec::SmallVec;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Instant;

/// A task bound to an absolute expiry instant.
///
/// The expiry is fixed at creation and never mutated. Ordering is
/// deterministic: ascending expiry, ties broken by the task's enqueue
/// ordinal, so two timers registered for the same instant always promote in
/// registration order.
pub struct TimerEntry<B> {
    expiry: Instant,
    task: Task<B>,
}

impl<B> TimerEntry<B> {
    fn key(&self) -> (Instant, u64) {
        (self.expiry, self.task.seq())
    }
}

impl<B> PartialEq for TimerEntry<B> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<B> Eq for TimerEntry<B> {}

impl<B> PartialOrd for TimerEntry<B> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<B> Ord for TimerEntry<B> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Pending timers, kept as a min-heap keyed by `(expiry, seq)`.
///
/// `drain_expired` and `min_expiry` are logarithmic/constant instead of the
/// linear scan-and-splice of a flat list; the observable behavior is the
/// same. Expiries are compared against a monotonic "now" supplied by the
/// scheduler, never read from a wall clock here.
pub struct TimerSet<B> {
    heap: BinaryHeap<Reverse<TimerEntry<B>>>,
}

impl<B> TimerSet<B> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Register a task to become due at `expiry`.
    pub fn insert_at(&mut self, expiry: Instant, task: Task<B>) {
        self.heap.push(Reverse(TimerEntry { expiry, task }));
    }

    /// Remove and return every task whose expiry is at or before `now`, in
    /// ascending expiry order (ties in registration order).
    ///
    /// Removal and return happen in one step, so an entry can never be
    /// observed again here once it has been handed to the caller.
    pub fn drain_expired(&mut self, now: Instant) -> SmallVec<[Task<B>; 4]> {
        let mut due = SmallVec::new();
        while let Some(Reverse(entry)) = self.heap.pop() {
            if entry.expiry <= now {
                due.push(entry.task);
            } else {
                self.heap.push(Reverse(entry));
                break;
            }
        }
        due
    }

    /// Smallest expiry among the remaining entries, used to size the idle
    /// wait.
    pub fn min_expiry(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(entry)| entry.expiry)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

impl<B> Default for TimerSet<B> {
    fn default() -> Self {
        Self::new()
    }
}
