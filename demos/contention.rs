//! Contention Demo
//!
//! Drives a small simulation on a manual clock:
//! - a producer floods a queue and one direction of a pipe
//! - two processes fight over a shared-memory segment until the waiter is
//!   flagged as deadlocked
//!
//! A background task follows segment lock changes through a subscription
//! while the main task reports bottlenecks and deadlocks.

use std::{sync::Arc, time::Duration};

use futures_util::StreamExt;
use ipcsim::{
    ChangeKind, Config, Direction, Document, Label, MockClock, ResourceKind, Simulator, Value,
};

#[tokio::main]
async fn main() -> ipcsim::Result {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let clock = MockClock::new(0);
    let mut sim = Simulator::new(Config::default(), Arc::new(clock.clone()));

    let mut locks = sim
        .segments_mut()
        .subscribe([ChangeKind::Locked, ChangeKind::Unlocked]);
    let watcher = tokio::spawn(async move {
        while let Some(envelope) = locks.next().await {
            let holder = envelope
                .event
                .current()
                .and_then(|s| s.holder().map(|h| h.to_string()))
                .unwrap_or_else(|| "nobody".into());
            println!(
                "[#{} @{}ms] {}: held by {holder}",
                envelope.meta.sequence(),
                envelope.meta.timestamp(),
                envelope.event.kind.label(),
            );
        }
    });

    let jobs = sim.queues_mut().create("jobs", 20).id();
    for i in 0..19 {
        let payload = format!("job {i}");
        let size = payload.len();
        sim.queues_mut().send(jobs, payload, "producer")?;
        sim.record_transfer(ResourceKind::Queue, jobs, size);
        clock.advance(Duration::from_millis(100));
    }

    let pipe = sim.channels_mut().create("shell", "pager").id();
    while sim.channels_mut().send(pipe, Direction::AtoB, "line").is_ok() {}

    let shm = sim.segments_mut().create_default("frame-buffer").id();
    sim.segments_mut().lock(shm, "renderer")?;
    let update = Document::from([("frame".to_string(), Value::Int(1))]);
    for _ in 0..6 {
        match sim.segments_mut().write(shm, "compositor", update.clone()) {
            Ok(()) => break,
            Err(err) => println!(
                "compositor: {err} (deadlock suspected: {})",
                err.deadlock_suspected()
            ),
        }
        clock.advance(Duration::from_secs(1));
    }

    println!("\nBottlenecks:");
    for b in sim.bottlenecks() {
        println!("  [{}] {} {}: {}", b.severity, b.kind, b.resource_id, b.message);
    }
    println!("Deadlocks:");
    for d in sim.deadlocks() {
        println!("  {:?} on {:?}: {}", d.cycle, d.resources, d.message);
    }
    let stats = sim.transfer_stats(ResourceKind::Queue, jobs);
    println!(
        "Queue throughput: {} transfers, {} bytes, {:.1} B/s",
        stats.count, stats.total_bytes, stats.bytes_per_sec
    );

    sim.segments_mut().unlock(shm, "renderer")?;
    sim.segments_mut().write(shm, "compositor", update)?;
    println!("Deadlocks after unlock: {}", sim.deadlocks().len());

    drop(sim);
    let _ = watcher.await;
    Ok(())
}
