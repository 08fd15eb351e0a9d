//! Criterion microbenches for boxlab label decoding, matching and hit testing.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the performance of:
//! - Sniffing and decoding label text (sniff_line, decode_text)
//! - Greedy IoU reconciliation of two box sets (reconcile)
//! - Pointer hit testing against a crowded image (hit_test)

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use boxlab::codec::{decode_text, sniff_line, SniffedFormat};
use boxlab::editor::{hit_test, CoordinateSpace};
use boxlab::model::{LabeledBox, NormalizedBox};
use boxlab::reconcile::reconcile;
use kurbo::{Point, Rect};

const YOLO_FIXTURE: &str = "0 0.512 0.433 0.120 0.310
1 0.150 0.200 0.050 0.080
2 0.800 0.750 0.210 0.190
0 0.333 0.666 0.100 0.100
3 0.900 0.100 0.040 0.060
";

/// A deterministic grid of boxes, jittered so the two sides differ a little.
fn grid(n: usize, jitter: f64) -> Vec<NormalizedBox> {
    let side = (n as f64).sqrt().ceil() as usize;
    let cell = 1.0 / side as f64;
    (0..n)
        .filter_map(|i| {
            let x = (i % side) as f64 * cell + jitter;
            let y = (i / side) as f64 * cell + jitter;
            NormalizedBox::new(x, y, x + cell * 0.8, y + cell * 0.8, (i % 4) as i32)
        })
        .collect()
}

/// Benchmark format sniffing of a single line.
fn bench_sniff(c: &mut Criterion) {
    let mut group = c.benchmark_group("sniff");
    group.bench_function("sniff_line", |b| {
        b.iter(|| black_box(sniff_line(black_box("0 0.512 0.433 0.120 0.310"))))
    });
    group.finish();
}

/// Benchmark decoding a small YOLO file body.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(YOLO_FIXTURE.len() as u64));

    group.bench_function("decode_text_yolo", |b| {
        b.iter(|| {
            let boxes = decode_text(black_box(YOLO_FIXTURE), SniffedFormat::Yolo, None);
            black_box(boxes)
        })
    });

    group.finish();
}

/// Benchmark greedy reconciliation at a few set sizes.
fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    for n in [10usize, 100, 400] {
        let a = grid(n, 0.0);
        let b = grid(n, 0.002);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("greedy_{n}"), |bench| {
            bench.iter(|| black_box(reconcile(black_box(&a), black_box(&b), 0.9)))
        });
    }

    group.finish();
}

/// Benchmark hit testing with many boxes on screen.
fn bench_hit_test(c: &mut Criterion) {
    let boxes: Vec<LabeledBox> = (0..200)
        .map(|i| {
            let x = (i % 20) as f64 * 50.0;
            let y = (i / 20) as f64 * 50.0;
            LabeledBox::new(Rect::new(x, y, x + 40.0, y + 40.0), 0)
        })
        .collect();
    let space = CoordinateSpace::new();

    let mut group = c.benchmark_group("hit_test");
    group.throughput(Throughput::Elements(boxes.len() as u64));

    group.bench_function("miss", |b| {
        b.iter(|| black_box(hit_test(black_box(Point::new(2000.0, 2000.0)), &boxes, &space, 7.0)))
    });
    group.bench_function("body", |b| {
        b.iter(|| black_box(hit_test(black_box(Point::new(470.0, 470.0)), &boxes, &space, 7.0)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_sniff,
    bench_decode,
    bench_reconcile,
    bench_hit_test,
);
criterion_main!(benches);
