//! Segment capacity, rotation and block boundary placement.

use segwal_core::max_encoded_len;
use segwal_testkit::prelude::*;

#[test]
fn records_at_and_around_the_segment_size_are_rejected() {
    let limit = 64 * KB;
    let wal = TestWal::with_segment_size(limit);

    for size in [limit - 1, limit, limit + 1] {
        match wal.write(&vec![0u8; size as usize]) {
            Err(CoreError::RecordTooLarge { size: s, limit: l }) => {
                assert_eq!(s, size);
                assert_eq!(l, limit);
            }
            other => panic!("expected RecordTooLarge for {size} bytes, got {other:?}"),
        }
    }
    assert!(wal.is_empty().unwrap());
}

#[test]
fn largest_accepted_record_fills_one_segment() {
    let limit = 64 * KB;
    let wal = TestWal::with_segment_size(limit);

    let largest = (0..limit as usize)
        .rev()
        .find(|&n| max_encoded_len(n) <= limit)
        .unwrap();
    let position = wal.write(&patterned(largest, 3)).unwrap();

    assert_eq!(position.segment_id, 0);
    assert_eq!(wal.read(&position).unwrap(), patterned(largest, 3));
    assert!(matches!(
        wal.write(&vec![0u8; largest + 1]),
        Err(CoreError::RecordTooLarge { .. })
    ));
}

#[test]
fn segment_files_never_exceed_capacity() {
    let limit = 96 * KB;
    let wal = TestWal::with_segment_size(limit);
    for i in 0..300usize {
        wal.write(&patterned(11 * i % 7000, i as u8)).unwrap();
    }

    for id in wal.segment_ids().unwrap() {
        assert!(file_len(&wal.segment_path(id)) <= limit);
    }
}

#[test]
fn rotation_starts_the_record_at_the_head_of_the_new_segment() {
    let wal = TestWal::with_segment_size(2 * BLOCK_SIZE as u64);
    let first = wal.write(&vec![1u8; BLOCK_SIZE]).unwrap();
    let second = wal.write(&vec![2u8; BLOCK_SIZE]).unwrap();

    assert_eq!(first.segment_id, 0);
    assert_eq!(second.segment_id, 1);
    assert_eq!((second.block_number, second.chunk_offset), (0, 0));
    assert_eq!(wal.segment_ids().unwrap(), vec![0, 1]);
    assert!(wal.segment_path(1).exists());
}

#[test]
fn block_tail_too_short_for_a_header_is_padded() {
    let wal = TestWal::with_segment_size(MB);
    let room = BLOCK_SIZE - HEADER_SIZE;

    // Leaves HEADER_SIZE bytes in block 0: no chunk can start there.
    let first = wal.write(&vec![1u8; room - HEADER_SIZE]).unwrap();
    let second = wal.write(b"next block").unwrap();

    assert_eq!(first.block_number, 0);
    assert_eq!((second.block_number, second.chunk_offset), (1, 0));
    assert_eq!(
        collect_records(&wal).unwrap(),
        vec![vec![1u8; room - HEADER_SIZE], b"next block".to_vec()]
    );

    let wal = wal.reopen();
    let third = wal.write(b"after reopen").unwrap();
    assert_eq!(third.block_number, 1);
    assert_eq!(third.chunk_offset, second.chunk_size);
}

#[test]
fn record_exactly_filling_block_room_is_a_single_chunk() {
    let wal = TestWal::with_segment_size(MB);
    let room = BLOCK_SIZE - HEADER_SIZE;

    let exact = wal.write(&vec![9u8; room]).unwrap();
    let next = wal.write(b"x").unwrap();

    assert_eq!(exact.chunk_size as usize, BLOCK_SIZE);
    assert_eq!((next.block_number, next.chunk_offset), (1, 0));
}

#[test]
fn batch_over_segment_size_is_rejected_and_buffer_cleared() {
    let wal = TestWal::with_segment_size(64 * KB);
    for _ in 0..3 {
        wal.pending_writes(vec![0u8; 30 * 1024]);
    }

    assert!(matches!(
        wal.write_all(),
        Err(CoreError::BatchTooLarge { .. })
    ));
    assert_eq!(wal.pending_len(), 0);
    assert!(wal.write_all().unwrap().is_empty());
    assert!(wal.is_empty().unwrap());
}

#[test]
fn open_new_active_segment_rotates_on_demand() {
    let wal = TestWal::with_segment_size(MB);
    wal.write(b"a").unwrap();
    wal.open_new_active_segment().unwrap();
    wal.open_new_active_segment().unwrap();

    assert_eq!(wal.active_segment_id().unwrap(), 2);
    let position = wal.write(b"b").unwrap();
    assert_eq!(position.segment_id, 2);
    assert_eq!(
        collect_records(&wal).unwrap(),
        vec![b"a".to_vec(), b"b".to_vec()]
    );
}
