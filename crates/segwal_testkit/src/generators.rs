//! Property-based test generators using proptest.
//!
//! Payload sizes are biased towards the places where the chunk layout
//! changes: empty records, records that just fit a block tail, and records
//! spanning several blocks.

use proptest::prelude::*;
use segwal_core::{BLOCK_SIZE, HEADER_SIZE};

/// Strategy for arbitrary small payloads.
pub fn record_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Strategy for payload lengths around the room of an empty block.
pub fn block_boundary_len_strategy() -> impl Strategy<Value = usize> {
    let room = BLOCK_SIZE - HEADER_SIZE;
    prop_oneof![
        Just(0usize),
        Just(room - 1),
        Just(room),
        Just(room + 1),
        (room - HEADER_SIZE)..(room + HEADER_SIZE),
        (2 * room - HEADER_SIZE)..(2 * room + HEADER_SIZE),
    ]
}

/// Strategy for a payload of a length near a block boundary, filled with a
/// recognizable pattern.
pub fn boundary_record_strategy() -> impl Strategy<Value = Vec<u8>> {
    (block_boundary_len_strategy(), any::<u8>()).prop_map(|(len, seed)| patterned(len, seed))
}

/// Strategy for a sequence of records mixing small and block-spanning ones.
pub fn record_sequence_strategy(max_records: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    let record = prop_oneof![
        4 => record_strategy(256),
        2 => record_strategy(BLOCK_SIZE / 2),
        1 => boundary_record_strategy(),
    ];
    prop::collection::vec(record, 1..=max_records)
}

/// Builds a deterministic payload of `len` bytes.
///
/// Distinct seeds give distinct contents, so a record read back from the
/// wrong position does not compare equal by accident.
pub fn patterned(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}
