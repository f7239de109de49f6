use looplet::{LocalScheduler, ManualClock, ScheduleError, Scheduler, SharedScheduler};
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_run_returns_once_drained() {
    let scheduler = LocalScheduler::with_clock(ManualClock::new());
    let log = Rc::new(RefCell::new(Vec::new()));

    {
        let log = log.clone();
        scheduler.queue_microtask(Box::new(move || {
            log.borrow_mut().push("micro");
        }));
    }
    {
        let log = log.clone();
        scheduler
            .set_timeout(
                Box::new(move || {
                    log.borrow_mut().push("timer");
                }),
                50,
            )
            .unwrap();
    }

    scheduler.run();

    assert_eq!(*log.borrow(), vec!["micro", "timer"]);
    assert!(scheduler.is_idle());
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn test_panicking_task_leaves_state_consistent() {
    // The faulting task is popped before it runs, so it is neither
    // re-queued nor stuck; the remaining work survives and a second run()
    // drains it in the original order.
    let scheduler = LocalScheduler::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    {
        let log = log.clone();
        scheduler.queue_microtask(Box::new(move || {
            log.borrow_mut().push("before");
        }));
    }
    scheduler.queue_microtask(Box::new(|| {
        panic!("task fault");
    }));
    {
        let log = log.clone();
        scheduler.queue_microtask(Box::new(move || {
            log.borrow_mut().push("after");
        }));
    }

    let result = catch_unwind(AssertUnwindSafe(|| scheduler.run()));
    assert!(result.is_err());
    assert_eq!(*log.borrow(), vec!["before"]);
    assert_eq!(scheduler.pending(), 1);

    scheduler.run();

    assert_eq!(*log.borrow(), vec!["before", "after"]);
    assert!(scheduler.is_idle());
}

#[test]
fn test_shared_loop_drains_seeded_work() {
    let scheduler = SharedScheduler::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    // Registered out of order; the earlier expiry still runs first.
    {
        let log = log.clone();
        scheduler
            .set_timeout(
                Box::new(move || {
                    log.lock().unwrap().push("t30");
                }),
                30,
            )
            .unwrap();
    }
    {
        let log = log.clone();
        scheduler
            .set_timeout(
                Box::new(move || {
                    log.lock().unwrap().push("t10");
                }),
                10,
            )
            .unwrap();
    }
    {
        let log = log.clone();
        scheduler.queue_microtask(Box::new(move || {
            log.lock().unwrap().push("micro");
        }));
    }

    let handle = scheduler.spawn();
    handle.join().expect("loop thread panicked");

    assert_eq!(*log.lock().unwrap(), vec!["micro", "t10", "t30"]);
    assert!(scheduler.is_idle());
}

#[test]
fn test_shared_producer_wakes_idle_wait() {
    let scheduler = SharedScheduler::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let started = Instant::now();
    let micro_at = Arc::new(Mutex::new(None));

    {
        let log = log.clone();
        scheduler
            .set_timeout(
                Box::new(move || {
                    log.lock().unwrap().push("far");
                }),
                300,
            )
            .unwrap();
    }

    let handle = scheduler.spawn();

    // Let the loop settle into its 300ms wait, then interrupt it.
    thread::sleep(Duration::from_millis(20));
    {
        let log = log.clone();
        let micro_at = micro_at.clone();
        scheduler.queue_microtask(Box::new(move || {
            log.lock().unwrap().push("micro");
            *micro_at.lock().unwrap() = Some(started.elapsed());
        }));
    }

    handle.join().expect("loop thread panicked");

    assert_eq!(*log.lock().unwrap(), vec!["micro", "far"]);
    let woke_after = micro_at.lock().unwrap().expect("microtask never ran");
    assert!(
        woke_after < Duration::from_millis(250),
        "microtask waited for the timer: {woke_after:?}"
    );
}

#[test]
fn test_shared_negative_delay_rejected() {
    let scheduler = SharedScheduler::new();

    let result = scheduler.set_timeout(Box::new(|| {}), -1);

    assert_eq!(result, Err(ScheduleError::NegativeDelay(-1)));
    assert_eq!(scheduler.pending(), 0);
}
