use crate::task::Task;
use std::collections::VecDeque;

/// A strict-FIFO queue of tasks.
///
/// Arrival order is the only ordering key; both the microtask and the
/// macrotask class use this same structure. A task popped from the queue is
/// gone — re-pushing after draining behaves exactly like a fresh queue.
pub struct TaskQueue<B> {
    queue: VecDeque<Task<B>>,
}

impl<B> TaskQueue<B> {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn push_back(&mut self, task: Task<B>) {
        self.queue.push_back(task);
    }

    pub fn pop_front(&mut self) -> Option<Task<B>> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl<B> Default for TaskQueue<B> {
    fn default() -> Self {
        Self::new()
    }
}
