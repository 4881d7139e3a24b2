//! Live resizing integration tests: conservation under generic-slot
//! exchange, refusal when the generic reserve is exhausted, and the
//! shrink-never-cancels rule while work is in flight.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tagpool::core::{PoolError, Tag, TagPool, TaskResult, ThreadExecutor};

fn pool(pairs: &[(Tag, usize)], workers: usize) -> TagPool<u64> {
    TagPool::with_executor(pairs.iter().cloned().collect(), ThreadExecutor::new(workers)).unwrap()
}

fn gated(rx: mpsc::Receiver<()>) -> impl FnOnce() -> TaskResult<u64> + Send + 'static {
    move || {
        let _ = rx.recv();
        Ok(0)
    }
}

fn total_reserved(pool: &TagPool<u64>) -> usize {
    pool.tags().values().sum()
}

#[test]
fn test_adjust_conserves_with_generic_slots() {
    let pool = pool(&[(Tag::named("a"), 5), (Tag::Generic, 5)], 2);

    let report = pool.adjust("a", 2, true).unwrap();
    assert_eq!(report.previous, 5);
    assert_eq!(report.current, 2);
    assert_eq!(report.generic_reserved, 8);

    let tags = pool.tags();
    assert_eq!(tags[&Tag::named("a")], 2);
    assert_eq!(tags[&Tag::Generic], 8);
    assert_eq!(total_reserved(&pool), 10);

    let err = pool.adjust("a", 100, true).unwrap_err();
    assert!(matches!(err, PoolError::InsufficientGeneric { .. }));

    // The failed adjustment left everything as it was.
    let tags = pool.tags();
    assert_eq!(tags[&Tag::named("a")], 2);
    assert_eq!(tags[&Tag::Generic], 8);
    assert_eq!(total_reserved(&pool), 10);

    pool.stop(true);
}

#[test]
fn test_adjust_without_generic_changes_total() {
    let pool = pool(&[(Tag::named("a"), 2), (Tag::Generic, 1)], 2);
    pool.adjust("a", 6, false).unwrap();
    assert_eq!(pool.tags()[&Tag::Generic], 1);
    assert_eq!(total_reserved(&pool), 7);
    pool.stop(true);
}

#[test]
fn test_shrink_keeps_surplus_running() {
    let pool = pool(&[(Tag::named("a"), 3), (Tag::Generic, 0)], 4);
    let a = Tag::named("a");

    let gates: Vec<mpsc::Sender<()>> = (0..3)
        .map(|_| {
            let (finish, gate) = mpsc::channel();
            pool.put("a", gated(gate)).unwrap();
            finish
        })
        .collect();
    assert_eq!(pool.usage(&a).in_use, 3);

    pool.adjust("a", 1, false).unwrap();

    // Nothing was cancelled.
    assert_eq!(pool.usage(&a).in_use, 3);
    assert_eq!(pool.pending(), 3);

    let (finish_waiter, waiter_gate) = mpsc::channel();
    let (admitted_tx, admitted_rx) = mpsc::channel();
    thread::scope(|s| {
        let pool = &pool;
        s.spawn(move || {
            pool.put("a", gated(waiter_gate)).unwrap();
            admitted_tx.send(()).unwrap();
        });

        // Two releases settle at the new bound; still no room.
        for finish in &gates[..2] {
            finish.send(()).unwrap();
        }
        assert!(
            admitted_rx.recv_timeout(Duration::from_millis(300)).is_err(),
            "admission granted while still at the shrunk bound"
        );

        // The third release finally opens the single remaining slot.
        gates[2].send(()).unwrap();
        admitted_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("waiter not admitted after surplus drained");
    });

    finish_waiter.send(()).unwrap();
    pool.join();
    pool.stop(true);
}

#[test]
fn test_grow_wakes_admission_waiters() {
    let pool = pool(&[(Tag::named("a"), 1), (Tag::Generic, 0)], 4);

    let (finish_first, first_gate) = mpsc::channel();
    pool.put("a", gated(first_gate)).unwrap();

    let (finish_second, second_gate) = mpsc::channel();
    let (admitted_tx, admitted_rx) = mpsc::channel();
    thread::scope(|s| {
        let pool = &pool;
        s.spawn(move || {
            pool.put("a", gated(second_gate)).unwrap();
            admitted_tx.send(()).unwrap();
        });

        assert!(admitted_rx.recv_timeout(Duration::from_millis(200)).is_err());

        // No release happens here; growth alone unblocks the waiter.
        pool.adjust("a", 2, false).unwrap();
        admitted_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("waiter not admitted after growth");
    });

    finish_first.send(()).unwrap();
    finish_second.send(()).unwrap();
    pool.join();
    pool.stop(true);
}

#[test]
fn test_adjust_creates_tag() {
    let pool = pool(&[(Tag::Generic, 1)], 2);
    pool.adjust("fresh", 2, false).unwrap();
    assert_eq!(pool.tags()[&Tag::named("fresh")], 2);

    let (finish, gate) = mpsc::channel();
    pool.put("fresh", gated(gate)).unwrap();
    assert_eq!(pool.usage(&Tag::named("fresh")).borrowed, 0);

    finish.send(()).unwrap();
    pool.join();
    pool.stop(true);
}

#[test]
fn test_shrink_returns_slots_to_generic() {
    let pool = pool(&[(Tag::named("a"), 4), (Tag::Generic, 0)], 2);
    let report = pool.adjust("a", 1, true).unwrap();
    assert_eq!(report.generic_reserved, 3);
    assert_eq!(total_reserved(&pool), 4);
    pool.stop(true);
}
