use anyhow::Result;
use looplet::SharedScheduler;
use std::time::Instant;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let scheduler = SharedScheduler::new();
    let started = Instant::now();

    info!("start");

    {
        let sch = scheduler.clone();
        scheduler.set_timeout(
            Box::new(move || {
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "timeout 1"
                );
                sch.queue_microtask(Box::new(|| {
                    info!("microtask from timeout 1");
                }));
            }),
            1000,
        )?;
    }

    scheduler.set_timeout(
        Box::new(move || {
            info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "timeout 2"
            );
        }),
        1000,
    )?;

    scheduler.queue_microtask(Box::new(|| {
        info!("microtask 1");
    }));

    info!("end");

    let handle = scheduler.spawn();
    if handle.join().is_err() {
        anyhow::bail!("event loop thread panicked");
    }

    info!("event loop drained, all tasks executed");
    Ok(())
}
