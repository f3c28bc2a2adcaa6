//! WAL write, batch and read benchmarks against real segment files.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use segwal_bench::{random_data, random_records, temp_wal};
use segwal_core::{ChunkPosition, BLOCK_SIZE, GB, KB, MB};

/// Benchmark single-record writes of increasing size.
fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_write");

    for size in [64usize, 1024, 16 * 1024, 256 * 1024 + 500].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (_dir, wal) = temp_wal(GB);
            let data = random_data(size);

            b.iter(|| {
                let position = wal.write(black_box(&data)).unwrap();
                black_box(position);
            });
        });
    }

    group.finish();
}

/// Benchmark a batch of 32 records of 1 MiB each.
fn bench_write_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_write_batch");
    group.sample_size(10);

    let records = random_records(32, MB as usize);
    group.throughput(Throughput::Bytes(32 * MB));
    group.bench_function("32x1MiB", |b| {
        let (_dir, wal) = temp_wal(GB);
        b.iter(|| {
            for record in &records {
                wal.pending_writes(record.clone());
            }
            let positions = wal.write_all().unwrap();
            black_box(positions);
        });
    });

    group.finish();
}

/// Benchmark writes with fsync after every record.
fn bench_write_synced(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_write_synced");
    group.sample_size(20);

    let data = random_data(4 * KB as usize);
    group.throughput(Throughput::Bytes(4 * KB));
    group.bench_function("4KiB", |b| {
        let dir = tempfile::TempDir::new().unwrap();
        let wal = segwal_core::Wal::open(
            segwal_core::WalOptions::new().dir_path(dir.path()).sync(true),
        )
        .unwrap();
        b.iter(|| {
            black_box(wal.write(black_box(&data)).unwrap());
        });
    });

    group.finish();
}

/// Benchmark point reads by position.
fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_read");

    for size in [64usize, 4096, 2 * BLOCK_SIZE].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (_dir, wal) = temp_wal(GB);
            let positions: Vec<ChunkPosition> = (0..256)
                .map(|_| wal.write(&random_data(size)).unwrap())
                .collect();

            let mut i = 0;
            b.iter(|| {
                let data = wal.read(black_box(&positions[i % positions.len()])).unwrap();
                i += 1;
                black_box(data);
            });
        });
    }

    group.finish();
}

/// Benchmark a full replay of the log.
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_replay");
    group.sample_size(20);

    let (_dir, wal) = temp_wal(8 * MB);
    let records = random_records(4096, 1024);
    for record in &records {
        wal.write(record).unwrap();
    }

    group.throughput(Throughput::Bytes((records.len() * 1024) as u64));
    group.bench_function("4096x1KiB", |b| {
        b.iter(|| {
            let count = wal.new_reader().unwrap().map(|r| r.unwrap()).count();
            black_box(count);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_write,
    bench_write_batch,
    bench_write_synced,
    bench_read,
    bench_replay,
);
criterion_main!(benches);
