//! Benchmarks for the slot ledger and the end-to-end submission path.
//!
//! Covers:
//! - Raw admit/release cycles on the ledger (own-reserve and borrow paths)
//! - Resize while counters are populated
//! - End-to-end put/join over the thread executor

use std::collections::HashMap;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use tagpool::builders::TagPoolBuilder;
use tagpool::core::{SlotLedger, Tag, TagPool};

fn ledger_with_tags(tag_count: usize, slots_per_tag: usize, generic: usize) -> SlotLedger {
    let mut reservations: HashMap<Tag, usize> = (0..tag_count)
        .map(|i| (Tag::named(format!("tag-{i}")), slots_per_tag))
        .collect();
    reservations.insert(Tag::Generic, generic);
    SlotLedger::new(reservations)
}

fn bench_admit_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_admit_release");

    for tag_count in [1usize, 8, 64] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("own_reserve", tag_count),
            &tag_count,
            |b, &tag_count| {
                let mut ledger = ledger_with_tags(tag_count, 4, 0);
                let tags: Vec<Tag> = (0..tag_count)
                    .map(|i| Tag::named(format!("tag-{i}")))
                    .collect();
                let mut rng = rand::rng();
                b.iter(|| {
                    let tag = &tags[rng.random_range(0..tags.len())];
                    let admission = ledger.try_admit(black_box(tag)).unwrap();
                    ledger.release(tag, admission.borrowed);
                });
            },
        );
    }

    // Saturated own reservations force every admission through the borrow
    // path.
    group.bench_function("borrow_path", |b| {
        let mut ledger = ledger_with_tags(8, 0, 16);
        let tags: Vec<Tag> = (0..8).map(|i| Tag::named(format!("tag-{i}"))).collect();
        let mut rng = rand::rng();
        b.iter(|| {
            let tag = &tags[rng.random_range(0..tags.len())];
            let admission = ledger.try_admit(black_box(tag)).unwrap();
            ledger.release(tag, admission.borrowed);
        });
    });

    group.finish();
}

fn bench_resize(c: &mut Criterion) {
    c.bench_function("ledger_resize_generic_exchange", |b| {
        let mut ledger = ledger_with_tags(8, 4, 32);
        let tag = Tag::named("tag-3");
        let mut size = 4usize;
        b.iter(|| {
            size = if size == 4 { 8 } else { 4 };
            ledger.resize(black_box(&tag), size, true).unwrap();
        });
    });
}

fn bench_put_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_put_join");
    group.sample_size(20);

    for batch in [64usize, 256] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("trivial", batch), &batch, |b, &batch| {
            // Discard results through the default callback so the queue
            // does not grow across iterations.
            let pool: TagPool<u64> = TagPoolBuilder::new()
                .reserve("bench", 4)
                .generic_slots(4)
                .worker_threads(4)
                .on_data(|_| {})
                .build()
                .unwrap();

            b.iter(|| {
                for n in 0..batch as u64 {
                    pool.put("bench", move || Ok(black_box(n))).unwrap();
                }
                pool.join();
            });

            pool.stop(true);
        });
    }

    group.finish();
}

criterion_group!(benches, bench_admit_release, bench_resize, bench_put_join);
criterion_main!(benches);
