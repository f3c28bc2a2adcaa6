//! Stress tests for segwal.
//!
//! These drive a WAL with many writes and with readers running alongside a
//! writer. A read counts as failed if it errors or returns bytes other than
//! the ones written.

use crate::generators::patterned;
use segwal_core::{ChunkPosition, Wal};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of records to write.
    pub operations: usize,
    /// Number of reader threads.
    pub threads: usize,
    /// Payload size in bytes.
    pub record_size: usize,
    /// Records per `write_all` in batched tests.
    pub batch_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            record_size: 256,
            batch_size: 100,
        }
    }
}

fn record(config: &StressConfig, i: usize) -> Vec<u8> {
    patterned(config.record_size, i as u8)
}

fn verify(wal: &Wal, position: &ChunkPosition, expected: &[u8]) -> bool {
    matches!(wal.read(position), Ok(data) if data == expected)
}

/// Writes `config.operations` records one at a time.
pub fn stress_sequential_writes(wal: &Wal, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        match wal.write(&record(config, i)) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Writes `config.operations` records in batches of `config.batch_size`.
pub fn stress_batched_writes(wal: &Wal, config: &StressConfig) -> StressTestResult {
    let batch_size = config.batch_size.max(1);
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for batch in 0..(config.operations / batch_size) {
        for i in 0..batch_size {
            wal.pending_writes(record(config, batch * batch_size + i));
        }
        match wal.write_all() {
            Ok(positions) if positions.len() == batch_size => successful += batch_size,
            _ => failed += batch_size,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Writes the records first, then reads them back from several threads.
pub fn stress_concurrent_reads(wal: &Wal, config: &StressConfig) -> StressTestResult {
    let positions: Vec<ChunkPosition> = (0..config.operations)
        .filter_map(|i| wal.write(&record(config, i)).ok())
        .collect();

    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(config.operations - positions.len());
    let threads = config.threads.max(1);
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..threads {
            let positions = &positions;
            let successful = &successful;
            let failed = &failed;
            scope.spawn(move || {
                for i in (t..positions.len()).step_by(threads) {
                    if verify(wal, &positions[i], &record(config, i)) {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// One writer appends while `config.threads` readers replay the log.
///
/// Every replay must yield a prefix of the written sequence. Each write and
/// each replay counts as one operation.
pub fn stress_write_while_replaying(wal: &Wal, config: &StressConfig) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let done = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..config.operations {
                match wal.write(&record(config, i)) {
                    Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                    Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                };
            }
            done.store(1, Ordering::Release);
        });

        for _ in 0..config.threads {
            scope.spawn(|| loop {
                let finished = done.load(Ordering::Acquire) == 1;
                let prefix = wal.new_reader().map(|reader| {
                    reader
                        .enumerate()
                        .all(|(i, entry)| matches!(entry, Ok((data, _)) if data == record(config, i)))
                });
                match prefix {
                    Ok(true) => successful.fetch_add(1, Ordering::Relaxed),
                    _ => failed.fetch_add(1, Ordering::Relaxed),
                };
                if finished {
                    break;
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
