//! Failed appends roll the segment back; failed syncs surface as errors.

use segwal_core::Segment;
use segwal_storage::InMemoryBackend;
use segwal_testkit::prelude::*;
use std::sync::Arc;

fn crashable_segment(capacity: u64) -> (Arc<Segment>, Arc<CrashControl>) {
    let backend = CrashableBackend::new(Box::new(InMemoryBackend::new()));
    let control = backend.control();
    let segment = Segment::open(0, Box::new(backend), capacity).unwrap();
    (Arc::new(segment), control)
}

#[test]
fn torn_append_is_rolled_back() {
    let (segment, control) = crashable_segment(MB);
    let kept = segment.write(b"kept").unwrap();
    let size = segment.size();

    control.crash_after(10);
    assert!(segment.write(&patterned(5000, 1)).is_err());
    assert!(control.has_crashed());
    assert_eq!(segment.size(), size);

    control.reset();
    let next = segment.write(b"next").unwrap();
    assert_eq!(next.chunk_offset, kept.chunk_size);

    let records: Vec<Vec<u8>> = segment.new_reader().map(|r| r.unwrap().0).collect();
    assert_eq!(records, vec![b"kept".to_vec(), b"next".to_vec()]);
}

#[test]
fn failed_batch_leaves_no_record_behind() {
    let (segment, control) = crashable_segment(MB);
    segment.write(b"before").unwrap();

    control.crash_after(3 * BLOCK_SIZE / 2);
    let batch: Vec<Vec<u8>> = (0..4u8).map(|i| patterned(BLOCK_SIZE, i)).collect();
    assert!(segment.write_all(&batch).is_err());

    control.reset();
    let records: Vec<Vec<u8>> = segment.new_reader().map(|r| r.unwrap().0).collect();
    assert_eq!(records, vec![b"before".to_vec()]);
}

#[test]
fn failed_rollback_keeps_cursor_unchanged() {
    let (segment, control) = crashable_segment(MB);
    segment.write(b"before").unwrap();
    let size = segment.size();

    control.set_fail_on_truncate(true);
    control.crash_after(4);
    assert!(segment.write(b"lost record").is_err());
    assert_eq!(segment.size(), size);

    control.reset();
    let next = segment.write(b"next").unwrap();
    assert_eq!(u64::from(next.chunk_offset), size);
    assert_eq!(segment.read(next.block_number, next.chunk_offset).unwrap(), b"next");

    let records: Vec<Vec<u8>> = segment.new_reader().map(|r| r.unwrap().0).collect();
    assert_eq!(records, vec![b"before".to_vec(), b"next".to_vec()]);
}

#[test]
fn torn_bytes_block_writes_and_syncs_until_truncated() {
    let (segment, control) = crashable_segment(MB);
    segment.write(b"before").unwrap();
    let size = segment.size();

    control.set_fail_on_truncate(true);
    control.crash_after(4);
    assert!(segment.write(b"lost record").is_err());

    // The torn prefix is still on the backend; nothing may land after it.
    control.crash_after(usize::MAX / 2);
    assert!(segment.write(b"refused").is_err());
    assert!(segment.sync().is_err());
    assert_eq!(segment.size(), size);
    assert_eq!(control.sync_count(), 0);

    control.set_fail_on_truncate(false);
    segment.sync().unwrap();
    let next = segment.write(b"accepted").unwrap();
    assert_eq!(u64::from(next.chunk_offset), size);

    let records: Vec<Vec<u8>> = segment.new_reader().map(|r| r.unwrap().0).collect();
    assert_eq!(records, vec![b"before".to_vec(), b"accepted".to_vec()]);
}

#[test]
fn torn_tail_on_disk_is_dropped_at_open() {
    let wal = TestWal::with_segment_size(MB);
    wal.write(b"acknowledged").unwrap();
    let torn = wal.write(&patterned(3 * BLOCK_SIZE, 4)).unwrap();
    wal.sync().unwrap();
    let wal = wal.crash_and_reopen();

    let path = wal.segment_path(0);
    truncate_file(&path, u64::from(torn.chunk_offset) + BLOCK_SIZE as u64 / 2);

    let wal = wal.crash_and_reopen();
    assert_eq!(file_len(&path), u64::from(torn.chunk_offset));
    let after = wal.write(b"after restart").unwrap();
    assert_eq!(after.chunk_offset, torn.chunk_offset);
    wal.sync().unwrap();

    let wal = wal.crash_and_reopen();
    assert_eq!(
        collect_records(&wal).unwrap(),
        vec![b"acknowledged".to_vec(), b"after restart".to_vec()]
    );
}

#[test]
fn sync_failure_is_reported() {
    let (segment, control) = crashable_segment(MB);
    segment.write(b"data").unwrap();

    control.set_fail_on_sync(true);
    assert!(matches!(segment.sync(), Err(CoreError::Storage(_))));

    control.set_fail_on_sync(false);
    segment.sync().unwrap();
    assert_eq!(control.sync_count(), 1);
}

#[test]
fn segment_full_writes_nothing() {
    let (segment, _control) = crashable_segment(64 * KB);
    segment.write(&vec![0u8; 40 * 1024]).unwrap();
    let size = segment.size();

    assert!(matches!(
        segment.write(&vec![0u8; 40 * 1024]),
        Err(CoreError::SegmentFull { segment_id: 0, .. })
    ));
    assert_eq!(segment.size(), size);
    assert_eq!(segment.remaining(), 64 * KB - size);
}

#[test]
fn segment_reopened_from_file_image_resumes_after_last_byte() {
    let wal = TestWal::with_segment_size(MB);
    wal.write(b"one").unwrap();
    let last = wal.write(&patterned(BLOCK_SIZE, 2)).unwrap();
    wal.sync().unwrap();

    let image = std::fs::read(wal.segment_path(0)).unwrap();
    let segment = Arc::new(Segment::open(0, Box::new(InMemoryBackend::with_data(image)), MB).unwrap());

    let records: Vec<Vec<u8>> = segment.new_reader().map(|r| r.unwrap().0).collect();
    assert_eq!(records, vec![b"one".to_vec(), patterned(BLOCK_SIZE, 2)]);

    let next = segment.write(b"two").unwrap();
    assert_eq!(next.block_number, last.block_number + 1);
    assert_eq!(segment.read(next.block_number, next.chunk_offset).unwrap(), b"two");
}
