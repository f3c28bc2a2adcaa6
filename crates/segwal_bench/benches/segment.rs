//! Chunk codec and in-memory segment benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use segwal_bench::random_data;
use segwal_core::chunk::{decode_chunk, encode_chunk};
use segwal_core::{ChunkType, Segment, BLOCK_SIZE, HEADER_SIZE};
use segwal_storage::InMemoryBackend;
use std::sync::Arc;

/// Benchmark encoding and decoding a single chunk.
fn bench_chunk_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_codec");

    for size in [64usize, 1024, BLOCK_SIZE - HEADER_SIZE].iter() {
        let payload = random_data(*size);
        let encoded = encode_chunk(&payload, ChunkType::Full);
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &payload, |b, payload| {
            b.iter(|| black_box(encode_chunk(black_box(payload), ChunkType::Full)));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, encoded| {
            b.iter(|| black_box(decode_chunk(black_box(encoded)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark segment appends without file system cost.
fn bench_segment_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_append");

    for size in [64usize, 4096, 3 * BLOCK_SIZE].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = random_data(size);
            let mut segment = Segment::open(0, Box::new(InMemoryBackend::new()), u64::MAX).unwrap();
            let mut written = 0u64;

            b.iter(|| {
                // Keep the in-memory image bounded.
                if written > 256 * 1024 * 1024 {
                    segment = Segment::open(0, Box::new(InMemoryBackend::new()), u64::MAX).unwrap();
                    written = 0;
                }
                let position = segment.write(black_box(&data)).unwrap();
                written += u64::from(position.chunk_size);
                black_box(position);
            });
        });
    }

    group.finish();
}

/// Benchmark replaying an in-memory segment.
fn bench_segment_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_replay");

    let segment = Arc::new(Segment::open(0, Box::new(InMemoryBackend::new()), u64::MAX).unwrap());
    for _ in 0..1024 {
        segment.write(&random_data(2048)).unwrap();
    }

    group.throughput(Throughput::Bytes(segment.size()));
    group.bench_function("1024x2KiB", |b| {
        b.iter(|| black_box(segment.new_reader().count()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_chunk_codec,
    bench_segment_append,
    bench_segment_replay,
);
criterion_main!(benches);
