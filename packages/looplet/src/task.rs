/// Boxed task body for the single-threaded loop.
pub type LocalTaskFn = Box<dyn FnOnce()>;

/// Boxed task body for the shared (cross-thread) loop.
pub type SharedTaskFn = Box<dyn FnOnce() + Send>;

/// An opaque, zero-argument unit of work.
///
/// The ordinal (`seq`) is assigned at enqueue time by the owning scheduler
/// and is the only identity a task has. It breaks ties between timers that
/// share an expiry and gives tests something stable to observe. A task is
/// consumed exactly once: it is moved, never copied, between containers,
/// and `run` takes it by value.
pub struct Task<B> {
    seq: u64,
    body: B,
}

impl<B> Task<B> {
    pub fn new(seq: u64, body: B) -> Self {
        Self { seq, body }
    }

    /// Enqueue ordinal (registration order across all scheduling calls).
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl<B: FnOnce()> Task<B> {
    /// Execute the body, consuming the task.
    pub fn run(self) {
        (self.body)()
    }
}
