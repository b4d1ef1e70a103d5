//! Submission throughput benchmarks for the worker pool.

use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use taskmill::{task, ThreadPool};

fn bench_submit_throughput(c: &mut Criterion) {
    let pool = ThreadPool::new(4).unwrap();

    c.bench_function("submit_1000_counting_tasks", |b| {
        b.iter(|| {
            let count = Arc::new(AtomicU64::new(0));
            let mut results = Vec::with_capacity(1000);
            for _ in 0..1000 {
                let counter = Arc::clone(&count);
                let (work, result) = task::with_result(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
                pool.submit(work);
                results.push(result);
            }
            taskmill::promise::when_all(results).wait();
            assert_eq!(count.load(Ordering::Relaxed), 1000);
        });
    });
}

fn bench_submit_no_wait(c: &mut Criterion) {
    let pool = ThreadPool::new(2).unwrap();

    c.bench_function("submit_single_noop_task", |b| {
        b.iter(|| {
            pool.submit(task::from_fn(|| {}));
        });
    });
}

criterion_group!(benches, bench_submit_throughput, bench_submit_no_wait);
criterion_main!(benches);
