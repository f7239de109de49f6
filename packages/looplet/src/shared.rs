use crate::clock::{MonotonicClock, SystemClock};
use crate::scheduler::{LoopState, MIN_TICK, ScheduleError, expiry_after};
use crate::task::SharedTaskFn;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

struct Inner<C> {
    state: Mutex<LoopState<SharedTaskFn>>,
    wake: Condvar,
    clock: C,
}

/// The dedicated-thread flavor of the loop: producers clone the handle and
/// schedule from any thread while [`run`] drains on one.
///
/// Execution is still run-to-completion on the loop thread; the containers
/// are the only shared mutable state and sit behind a single coarse mutex.
/// The mutex is released around every task body, so a task can schedule
/// into its own loop without deadlocking, and a panicking body unwinds out
/// of [`run`] without poisoning a mid-operation container. The idle wait is
/// a condvar wait bounded by the nearest expiry; any scheduling call
/// signals it, so a producer that registers sooner work shortens the wait
/// instead of being stuck behind a fixed poll tick.
///
/// Termination is emptiness of all three containers: seed the initial work
/// before [`spawn`]ing the loop, or it may observe an empty state and
/// return at once.
///
/// [`run`]: SharedScheduler::run
/// [`spawn`]: SharedScheduler::spawn
pub struct SharedScheduler<C: MonotonicClock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl<C: MonotonicClock> Clone for SharedScheduler<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SharedScheduler<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for SharedScheduler<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: MonotonicClock> SharedScheduler<C> {
    /// Build a shared loop over an injected clock.
    ///
    /// The clock governs expiry computation and comparison only; the idle
    /// wait itself is a real-time condvar wait, so a manual clock does not
    /// make this flavor's blocking deterministic the way it does for the
    /// single-threaded loop.
    pub fn with_clock(clock: C) -> Self {
        let now = clock.now();
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(LoopState::new(now)),
                wake: Condvar::new(),
                clock,
            }),
        }
    }

    /// Append to the microtask queue and wake the loop if it is idling.
    pub fn queue_microtask(&self, task: SharedTaskFn) {
        let mut state = self.lock();
        let task = state.next_task(task);
        state.microtasks.push_back(task);
        self.inner.wake.notify_one();
    }

    /// Register a timer due `delay` from now and wake the loop so it can
    /// re-size its idle wait.
    pub fn schedule_after(&self, task: SharedTaskFn, delay: Duration) {
        let mut state = self.lock();
        let now = state.observe(self.inner.clock.now());
        let task = state.next_task(task);
        state.timers.insert_at(expiry_after(now, delay), task);
        self.inner.wake.notify_one();
    }

    /// Millisecond mirror of [`schedule_after`]; a negative delay is
    /// rejected and nothing is inserted.
    ///
    /// [`schedule_after`]: SharedScheduler::schedule_after
    pub fn set_timeout(&self, task: SharedTaskFn, delay_ms: i64) -> Result<(), ScheduleError> {
        if delay_ms < 0 {
            return Err(ScheduleError::NegativeDelay(delay_ms));
        }
        self.schedule_after(task, Duration::from_millis(delay_ms as u64));
        Ok(())
    }

    pub fn now(&self) -> Instant {
        self.inner.clock.now()
    }

    pub fn is_idle(&self) -> bool {
        self.lock().is_drained()
    }

    pub fn pending(&self) -> usize {
        self.lock().pending()
    }

    /// Drive the loop on the calling thread until all three containers are
    /// simultaneously empty, then return.
    pub fn run(&self) {
        loop {
            self.drain_microtasks();
            self.promote_expired();
            self.drain_microtasks();

            let macrotask = self.lock().macrotasks.pop_front();
            if let Some(task) = macrotask {
                trace!(seq = task.seq(), "macrotask");
                task.run();
                self.promote_expired();
                continue;
            }

            let mut state = self.lock();
            if state.is_drained() {
                debug!("loop drained");
                return;
            }
            if !state.microtasks.is_empty() || !state.macrotasks.is_empty() {
                // A producer slipped work in between the pop and this lock.
                continue;
            }
            let now = state.observe(self.inner.clock.now());
            if let Some(expiry) = state.timers.min_expiry() {
                let wait = expiry.saturating_duration_since(now);
                let wait = if wait.is_zero() { MIN_TICK } else { wait };
                trace!(?wait, "idle until next timer");
                let _unused = self
                    .inner
                    .wake
                    .wait_timeout(state, wait)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
    }

    /// Run the loop on its own thread; join the handle to wait for the
    /// drained state, mirroring a host that parks until all work is done.
    pub fn spawn(&self) -> thread::JoinHandle<()>
    where
        C: Send + Sync + 'static,
    {
        let scheduler = self.clone();
        thread::spawn(move || scheduler.run())
    }

    fn drain_microtasks(&self) {
        loop {
            let task = self.lock().microtasks.pop_front();
            match task {
                Some(task) => task.run(),
                None => return,
            }
        }
    }

    fn promote_expired(&self) {
        let mut state = self.lock();
        let now = state.observe(self.inner.clock.now());
        let promoted = state.promote_expired(now);
        if promoted > 0 {
            trace!(promoted, "timers expired");
        }
    }

    // Tasks never run under the lock, so a poisoned mutex still guards a
    // structurally consistent state; recover the guard rather than unwind.
    fn lock(&self) -> MutexGuard<'_, LoopState<SharedTaskFn>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
