//! Deterministic run-to-completion event loop.
//!
//! Callbacks are partitioned into three priority classes and drained in a
//! strict, repeatable order:
//! - **Microtasks** — highest priority, always run to exhaustion (including
//!   work they enqueue themselves) before anything else.
//! - **Macrotasks** — at most one per loop iteration, so freshly produced
//!   microtasks interleave ahead of the next macrotask.
//! - **Timers** — tasks gated by an absolute monotonic expiry, promoted
//!   into the macrotask queue once due (ascending expiry, registration
//!   order on ties).
//!
//! The loop returns once all three containers are simultaneously empty;
//! while only unexpired timers remain it blocks until the nearest expiry
//! rather than spinning.
//!
//! Two hostings of the same algorithm:
//! - [`LocalScheduler`] — single-threaded, clock-injectable, fully
//!   deterministic under a [`ManualClock`].
//! - [`SharedScheduler`] — cloneable handle whose loop runs on a dedicated
//!   thread while producers schedule from anywhere.
//!
//! # Examples
//!
//! ```
//! use looplet::{LocalScheduler, Scheduler};
//!
//! let scheduler = LocalScheduler::new();
//! scheduler.queue_microtask(Box::new(|| println!("first")));
//! scheduler.run();
//! ```

pub mod clock;
pub mod queue;
pub mod scheduler;
pub mod shared;
pub mod task;
pub mod timer;

use std::time::{Duration, Instant};

/// The producer-facing scheduling surface.
///
/// Callable at any time: before the loop starts (seeding the initial
/// state) or from inside an executing task (self-scheduling work). Both
/// operations are fire-and-forget and always succeed.
pub trait Scheduler {
    /// Append a task to the microtask queue (highest priority, runs before
    /// any macrotask, even transitively).
    fn queue_microtask(&self, task: Box<dyn FnOnce()>);

    /// Register a task to run once `delay` has elapsed; it is promoted to
    /// the macrotask class at expiry, never executed inline.
    fn schedule_after(&self, task: Box<dyn FnOnce()>, delay: Duration);

    /// The scheduler's current monotonic time.
    fn now(&self) -> Instant;
}

pub use clock::{ManualClock, MonotonicClock, SystemClock};
pub use queue::TaskQueue;
pub use scheduler::{LocalScheduler, ScheduleError};
pub use shared::SharedScheduler;
pub use task::{LocalTaskFn, SharedTaskFn, Task};
pub use timer::{TimerEntry, TimerSet};
