//! # Modelling Bus Benchmarks
//!
//! Hot paths every posting goes through:
//!
//! | Area | Path |
//! |------|------|
//! | mb-02 Transport | Envelope encode/decode, inline and repository |
//! | mb-03 Artefacts | Delta computation and application |
//! | shared-types | Timestamp generation |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mb_01_repository::BlobPointer;
use mb_02_transport::Envelope;
use mb_03_artefacts::Delta;
use serde_json::{json, Value};
use shared_types::{SystemTimestamps, TimestampSource};

const TIMESTAMP: &str = "2024-01-01-00-00-00-000000-0000";

// ============================================================================
// MB-02: Envelope Benchmarks
// ============================================================================

fn json_payload(size: usize) -> Vec<u8> {
    format!("{{\"data\":\"{}\"}}", "x".repeat(size.saturating_sub(12))).into_bytes()
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("mb-02-envelope");

    for size in [64usize, 4 * 1024, 256 * 1024] {
        let envelope = Envelope::inline(TIMESTAMP, json_payload(size));
        let encoded = envelope.encode().unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encode_inline", size), &envelope, |b, e| {
            b.iter(|| black_box(e.encode().unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode_inline", size), &encoded, |b, bytes| {
            b.iter(|| black_box(Envelope::decode(bytes).unwrap()))
        });
    }

    let pointer = BlobPointer::new(
        "agent.repository",
        21,
        format!("mb/exp/agent/observations/json/series/{}", TIMESTAMP),
        ".json",
    );
    let remote = Envelope::remote(TIMESTAMP, pointer);
    let encoded = remote.encode().unwrap();
    group.throughput(Throughput::Elements(1));
    group.bench_function("encode_repository", |b| {
        b.iter(|| black_box(remote.encode().unwrap()))
    });
    group.bench_function("decode_repository", |b| {
        b.iter(|| black_box(Envelope::decode(&encoded).unwrap()))
    });

    group.finish();
}

// ============================================================================
// MB-03: Delta Benchmarks
// ============================================================================

fn model(elements: usize, revision: usize) -> Value {
    let items: Vec<Value> = (0..elements)
        .map(|i| json!({"id": i, "name": format!("element-{}", i), "rev": i % 7 + revision}))
        .collect();
    json!({"elements": items, "revision": revision})
}

fn bench_delta(c: &mut Criterion) {
    let mut group = c.benchmark_group("mb-03-delta");

    for elements in [10usize, 100, 1000] {
        let before = model(elements, 0);
        let after = model(elements, 1);
        let delta = Delta::between(&before, &after, TIMESTAMP, TIMESTAMP);

        group.throughput(Throughput::Elements(elements as u64));
        group.bench_with_input(
            BenchmarkId::new("between", elements),
            &(before.clone(), after),
            |b, (from, to)| b.iter(|| black_box(Delta::between(from, to, TIMESTAMP, TIMESTAMP))),
        );
        group.bench_with_input(
            BenchmarkId::new("apply_to", elements),
            &(delta, before),
            |b, (delta, base)| b.iter(|| black_box(delta.apply_to(base).unwrap())),
        );
    }

    group.finish();
}

// ============================================================================
// Shared: Timestamp Benchmarks
// ============================================================================

fn bench_timestamps(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared-timestamps");
    let source = SystemTimestamps::new();

    group.bench_function("next_timestamp", |b| {
        b.iter(|| black_box(source.next_timestamp()))
    });

    group.finish();
}

criterion_group!(benches, bench_envelope, bench_delta, bench_timestamps);
criterion_main!(benches);
