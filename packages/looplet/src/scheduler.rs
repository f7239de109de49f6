use crate::clock::{MonotonicClock, SystemClock};
use crate::queue::TaskQueue;
use crate::task::{LocalTaskFn, Task};
use crate::timer::TimerSet;
use std::cell::RefCell;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace};

/// Floor for the idle wait when the computed time-to-next-expiry rounds to
/// zero; keeps clock-granularity edge cases from degenerating into a spin.
pub(crate) const MIN_TICK: Duration = Duration::from_millis(1);

/// Horizon that delays are clamped to so expiry arithmetic can never
/// overflow the platform clock's representable range.
pub(crate) const MAX_TIMER_DELAY: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 100);

pub(crate) fn expiry_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay.min(MAX_TIMER_DELAY)).unwrap_or(now)
}

/// A schedule request the loop refuses to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The millisecond API was handed a negative delay. Nothing is
    /// inserted; a zero delay is fine and simply expires on the next scan.
    #[error("negative timer delay: {0} ms")]
    NegativeDelay(i64),
}

/// The three task containers plus the bookkeeping both loop flavors share.
///
/// Every mutation goes through whichever single mutual-exclusion point the
/// owning scheduler wraps around this (a `RefCell` locally, a `Mutex` for
/// the shared loop); nothing else ever touches the containers.
pub(crate) struct LoopState<B> {
    pub(crate) microtasks: TaskQueue<B>,
    pub(crate) macrotasks: TaskQueue<B>,
    pub(crate) timers: TimerSet<B>,
    next_seq: u64,
    last_now: Instant,
}

impl<B> LoopState<B> {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            microtasks: TaskQueue::new(),
            macrotasks: TaskQueue::new(),
            timers: TimerSet::new(),
            next_seq: 0,
            last_now: now,
        }
    }

    pub(crate) fn next_task(&mut self, body: B) -> Task<B> {
        let seq = self.next_seq;
        self.next_seq += 1;
        Task::new(seq, body)
    }

    /// Clamp the observed time to its high-water mark. A clock that jumps
    /// backward must not un-expire timers that were already due.
    pub(crate) fn observe(&mut self, now: Instant) -> Instant {
        if now > self.last_now {
            self.last_now = now;
        }
        self.last_now
    }

    /// Move every expired timer into the macrotask queue, in ascending
    /// expiry order. Returns how many were promoted.
    pub(crate) fn promote_expired(&mut self, now: Instant) -> usize {
        let due = self.timers.drain_expired(now);
        let promoted = due.len();
        for task in due {
            self.macrotasks.push_back(task);
        }
        promoted
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.microtasks.is_empty() && self.macrotasks.is_empty() && self.timers.is_empty()
    }

    pub(crate) fn pending(&self) -> usize {
        self.microtasks.len() + self.macrotasks.len() + self.timers.len()
    }
}

/// The single-threaded run-to-completion loop.
///
/// Owns the microtask queue, the macrotask queue, and the timer set
/// exclusively; there is no ambient state, so any number of independent
/// schedulers can coexist in one process. Scheduling calls are accepted
/// from the moment of construction — seeding work before [`run`] starts is
/// how an embedding program sets the initial state — and from inside an
/// executing task, which is how self-scheduling work is expressed.
///
/// The container state sits behind one `RefCell` whose borrow is never held
/// across a task body: a task that panics unwinds out of [`run`] with the
/// containers structurally consistent (the task was popped before it ran),
/// so a caller that catches the panic may call [`run`] again and resume.
///
/// [`run`]: LocalScheduler::run
pub struct LocalScheduler<C: MonotonicClock = SystemClock> {
    state: RefCell<LoopState<LocalTaskFn>>,
    clock: C,
}

impl LocalScheduler<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for LocalScheduler<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: MonotonicClock> LocalScheduler<C> {
    /// Build a loop over an injected clock (a [`ManualClock`] makes every
    /// test in this crate deterministic).
    ///
    /// [`ManualClock`]: crate::clock::ManualClock
    pub fn with_clock(clock: C) -> Self {
        let now = clock.now();
        Self {
            state: RefCell::new(LoopState::new(now)),
            clock,
        }
    }

    /// Millisecond mirror of [`schedule_after`]; rejects negative delays
    /// without inserting anything. A zero delay is accepted and the task
    /// still rides the timer-to-macrotask promotion path, preserving order
    /// against macrotasks that are already queued.
    ///
    /// [`schedule_after`]: crate::Scheduler::schedule_after
    pub fn set_timeout(&self, task: LocalTaskFn, delay_ms: i64) -> Result<(), ScheduleError> {
        if delay_ms < 0 {
            return Err(ScheduleError::NegativeDelay(delay_ms));
        }
        crate::Scheduler::schedule_after(self, task, Duration::from_millis(delay_ms as u64));
        Ok(())
    }

    /// One outer iteration of the draining algorithm: exhaust microtasks,
    /// promote expired timers, exhaust microtasks again, then run at most
    /// one macrotask and re-scan timers. Never idle-waits. Returns whether
    /// any work (including unexpired timers) is still pending.
    pub fn tick(&self) -> bool {
        self.drain_microtasks();
        self.promote_expired();
        self.drain_microtasks();
        let macrotask = self.state.borrow_mut().macrotasks.pop_front();
        if let Some(task) = macrotask {
            trace!(seq = task.seq(), "macrotask");
            task.run();
            // The macrotask may have run long enough for more timers to
            // expire; the next iteration's microtask drain must see them.
            self.promote_expired();
        }
        !self.state.borrow().is_drained()
    }

    /// Drive the loop until all three containers are simultaneously empty.
    ///
    /// While only unexpired timers remain, blocks via the clock for
    /// `min_expiry - now` (floored at [`MIN_TICK`]) instead of spinning.
    pub fn run(&self) {
        loop {
            if !self.tick() {
                debug!("loop drained");
                return;
            }
            if self.only_timers_pending() {
                self.idle_wait();
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state.borrow().is_drained()
    }

    /// Total tasks pending across all three containers.
    pub fn pending(&self) -> usize {
        self.state.borrow().pending()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn drain_microtasks(&self) {
        // Emptiness is re-checked after every execution rather than
        // snapshot up front: a running microtask may enqueue more, and
        // those must run before any macrotask does.
        loop {
            let task = self.state.borrow_mut().microtasks.pop_front();
            match task {
                Some(task) => task.run(),
                None => return,
            }
        }
    }

    fn promote_expired(&self) {
        let mut state = self.state.borrow_mut();
        let now = state.observe(self.clock.now());
        let promoted = state.promote_expired(now);
        if promoted > 0 {
            trace!(promoted, "timers expired");
        }
    }

    fn only_timers_pending(&self) -> bool {
        let state = self.state.borrow();
        state.microtasks.is_empty() && state.macrotasks.is_empty() && !state.timers.is_empty()
    }

    fn idle_wait(&self) {
        let wait = {
            let mut state = self.state.borrow_mut();
            let now = state.observe(self.clock.now());
            state
                .timers
                .min_expiry()
                .map(|expiry| expiry.saturating_duration_since(now))
        };
        if let Some(wait) = wait {
            let wait = if wait.is_zero() { MIN_TICK } else { wait };
            trace!(?wait, "idle until next timer");
            self.clock.sleep(wait);
        }
    }
}

impl<C: MonotonicClock> crate::Scheduler for LocalScheduler<C> {
    fn queue_microtask(&self, task: LocalTaskFn) {
        let mut state = self.state.borrow_mut();
        let task = state.next_task(task);
        state.microtasks.push_back(task);
    }

    fn schedule_after(&self, task: LocalTaskFn, delay: Duration) {
        let mut state = self.state.borrow_mut();
        let now = state.observe(self.clock.now());
        let task = state.next_task(task);
        state.timers.insert_at(expiry_after(now, delay), task);
    }

    fn now(&self) -> Instant {
        self.clock.now()
    }
}
