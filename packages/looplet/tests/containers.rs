use looplet::{Task, TaskQueue, TimerSet};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

type Body = Box<dyn FnOnce()>;

fn recording_task(seq: u64, log: &Rc<RefCell<Vec<u64>>>) -> Task<Body> {
    let log = log.clone();
    Task::new(seq, Box::new(move || log.borrow_mut().push(seq)))
}

#[test]
fn test_queue_is_fifo_after_reuse() {
    // Popping to empty and re-pushing behaves exactly like a fresh queue.
    let mut queue: TaskQueue<Body> = TaskQueue::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    for seq in 0..3 {
        queue.push_back(recording_task(seq, &log));
    }
    while let Some(task) = queue.pop_front() {
        task.run();
    }
    assert!(queue.is_empty());

    for seq in 3..6 {
        queue.push_back(recording_task(seq, &log));
    }
    while let Some(task) = queue.pop_front() {
        task.run();
    }

    assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_timer_set_orders_by_expiry_then_seq() {
    let mut timers: TimerSet<Body> = TimerSet::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let base = Instant::now();

    // Registered out of order; two entries share an expiry.
    timers.insert_at(base + Duration::from_millis(200), recording_task(0, &log));
    timers.insert_at(base + Duration::from_millis(100), recording_task(1, &log));
    timers.insert_at(base + Duration::from_millis(100), recording_task(2, &log));

    assert_eq!(timers.min_expiry(), Some(base + Duration::from_millis(100)));
    assert_eq!(timers.len(), 3);

    // Expiry comparison is inclusive: entries due exactly "now" drain.
    let due = timers.drain_expired(base + Duration::from_millis(100));
    assert_eq!(due.len(), 2);
    for task in due {
        task.run();
    }
    assert_eq!(*log.borrow(), vec![1, 2]);
    assert_eq!(timers.len(), 1);
    assert_eq!(timers.min_expiry(), Some(base + Duration::from_millis(200)));

    let due = timers.drain_expired(base + Duration::from_millis(500));
    for task in due {
        task.run();
    }
    assert_eq!(*log.borrow(), vec![1, 2, 0]);
    assert!(timers.is_empty());
    assert_eq!(timers.min_expiry(), None);
}

#[test]
fn test_drain_expired_leaves_unexpired_entries() {
    let mut timers: TimerSet<Body> = TimerSet::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let base = Instant::now();

    timers.insert_at(base + Duration::from_millis(10), recording_task(0, &log));
    timers.insert_at(base + Duration::from_millis(20), recording_task(1, &log));

    let due = timers.drain_expired(base);
    assert!(due.is_empty());
    assert_eq!(timers.len(), 2);
}
