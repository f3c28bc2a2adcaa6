//! Shared access from several threads.

use segwal_testkit::prelude::*;
use std::collections::HashSet;
use std::thread;

#[test]
fn concurrent_writers_get_distinct_positions() {
    let wal = TestWal::with_segment_size(128 * KB);
    let threads = 4u8;
    let per_thread = 100usize;

    let written: Vec<(Vec<u8>, ChunkPosition)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let wal = &wal;
                scope.spawn(move || {
                    (0..per_thread)
                        .map(|i| {
                            let record = patterned(100 + i * 13, t.wrapping_mul(61).wrapping_add(i as u8));
                            let position = wal.write(&record).unwrap();
                            (record, position)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().expect("writer panicked"))
            .collect()
    });

    let unique: HashSet<ChunkPosition> = written.iter().map(|(_, p)| *p).collect();
    assert_eq!(unique.len(), written.len());
    for (record, position) in &written {
        assert_eq!(&wal.read(position).unwrap(), record);
    }

    let mut by_position = written.clone();
    by_position.sort_by_key(|(_, p)| *p);
    assert_eq!(collect_entries(&wal).unwrap(), by_position);
}

#[test]
fn forced_rotation_races_with_writers() {
    let wal = TestWal::with_segment_size(MB);

    let positions: Vec<ChunkPosition> = thread::scope(|scope| {
        let writers: Vec<_> = (0..3u8)
            .map(|t| {
                let wal = &wal;
                scope.spawn(move || {
                    (0..200)
                        .map(|_| wal.write(&[t; 48]).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let wal = &wal;
        scope.spawn(move || {
            for _ in 0..10 {
                wal.open_new_active_segment().unwrap();
            }
        });
        writers
            .into_iter()
            .flat_map(|h| h.join().expect("writer panicked"))
            .collect()
    });

    assert_eq!(wal.active_segment_id().unwrap(), 10);
    assert_eq!(collect_records(&wal).unwrap().len(), 600);
    for position in &positions {
        assert_eq!(wal.read(position).unwrap().len(), 48);
    }
}

#[test]
fn readers_run_alongside_a_writer() {
    let wal = TestWal::with_segment_size(64 * KB);
    let config = StressConfig {
        operations: 400,
        threads: 4,
        record_size: 900,
        batch_size: 1,
    };

    let result = stress_write_while_replaying(&wal, &config);
    assert_eq!(result.failed_ops, 0);
    assert_eq!(collect_records(&wal).unwrap().len(), 400);
}

#[test]
fn point_reads_from_many_threads() {
    let wal = TestWal::with_segment_size(64 * KB);
    let config = StressConfig {
        operations: 1000,
        threads: 8,
        record_size: 333,
        batch_size: 1,
    };

    let result = stress_concurrent_reads(&wal, &config);
    assert_eq!(result.failed_ops, 0);
    assert_eq!(result.successful_ops, 1000);
}

#[test]
fn wal_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<segwal_core::Wal>();
    assert_send_sync::<segwal_core::Segment>();
    fn assert_send<T: Send>() {}
    assert_send::<segwal_core::WalReader>();
}
