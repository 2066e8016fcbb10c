#![allow(clippy::all)]
//! Benchmarks for the forwarding core.
//!
//! Tests: Directional relay throughput, rule parsing, counter updates.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use portfwd::forwarder::{Direction, DuplexPipe, ForwardRule, ForwardStats};
use std::hint::black_box;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Relay throughput
// ---------------------------------------------------------------------------

fn bench_pipe_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("forwarding/pipe");
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let data = vec![0x5au8; 1024 * 1024];
    let payload: &[u8] = &data;
    group.throughput(Throughput::Bytes(payload.len() as u64));

    for buffer_size in [4096usize, 16384, 65536] {
        group.bench_with_input(
            BenchmarkId::new("relay_1mib", buffer_size),
            &buffer_size,
            |b, &size| {
                b.to_async(&rt).iter(|| async move {
                    let outcome =
                        DuplexPipe::new(Direction::ClientToServer, payload, tokio::io::sink())
                            .with_buffer_size(size)
                            .run()
                            .await;
                    black_box(outcome.bytes)
                });
            },
        );
    }

    group.bench_function("relay_1mib_with_stats", |b| {
        let stats = Arc::new(ForwardStats::new());
        b.to_async(&rt).iter(|| {
            let stats = Arc::clone(&stats);
            async move {
                let outcome =
                    DuplexPipe::new(Direction::ServerToClient, payload, tokio::io::sink())
                        .with_stats(stats)
                        .run()
                        .await;
                black_box(outcome.bytes)
            }
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Rule parsing
// ---------------------------------------------------------------------------

fn bench_rule_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("forwarding/rule_parse");

    group.bench_function("wildcard_ipv4", |b| {
        b.iter(|| black_box(ForwardRule::parse("tcp://*:9000", "127.0.0.1:80")));
    });

    group.bench_function("bracketed_ipv6", |b| {
        b.iter(|| black_box(ForwardRule::parse("tcp://[::1]:2222", "[fd00::5]:22")));
    });

    group.bench_function("rejected", |b| {
        b.iter(|| black_box(ForwardRule::parse("udp://*:53", "8.8.8.8:53")));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

fn bench_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("forwarding/stats");
    let stats = ForwardStats::new();

    group.bench_function("add_bytes", |b| {
        b.iter(|| stats.add_bytes(Direction::ClientToServer, black_box(16384)));
    });

    group.bench_function("snapshot", |b| {
        b.iter(|| black_box(stats.snapshot()));
    });

    group.finish();
}

criterion_group!(benches, bench_pipe_throughput, bench_rule_parse, bench_stats);
criterion_main!(benches);
