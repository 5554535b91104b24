//! Benchmark suite for the control-loop primitives
//!
//! Measures the per-request cost of the hot-path operations:
//! - Sampling-interval reads and updates
//! - Arrival/completion accounting
//! - Threshold random-walk steps (once per cycle, cheap by construction)

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gci_proxy::{threshold::SheddingThreshold, waiter::PendingWaiter, window::SampleWindow};

fn bench_threshold(c: &mut Criterion) {
    let mut threshold = SheddingThreshold::new(42, 64 * 1024 * 1024);
    c.bench_function("threshold_next_value", |b| {
        b.iter(|| black_box(threshold.next_value()));
    });
}

fn bench_window(c: &mut Criterion) {
    let window = SampleWindow::new();
    c.bench_function("window_size", |b| b.iter(|| black_box(window.size())));

    let mut finished = 0u64;
    c.bench_function("window_update", |b| {
        b.iter(|| {
            finished += 1;
            window.update(black_box(finished));
        });
    });
}

fn bench_waiter(c: &mut Criterion) {
    let waiter = PendingWaiter::new();
    c.bench_function("waiter_arrive_finish", |b| {
        b.iter(|| {
            waiter.request_arrived();
            black_box(waiter.request_finished());
        });
    });
}

criterion_group!(benches, bench_threshold, bench_window, bench_waiter);
criterion_main!(benches);
