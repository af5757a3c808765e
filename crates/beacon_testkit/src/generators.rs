//! Property-based test generators using proptest.
//!
//! Provides strategies for generating beacon records that are valid for
//! the log line format.

use beacon_recorder::{AnsiId, BeaconId, BeaconRecord, FrameId, ANSI_ID_MAX, FRAME_ID_MAX};
use proptest::prelude::*;

/// Strategy for printable ASCII text without commas, up to `max` bytes.
pub fn id_text_strategy(max: usize) -> impl Strategy<Value = String> {
    prop::string::string_regex(&format!("[\\x20-\\x2B\\x2D-\\x7E]{{0,{max}}}"))
        .expect("Invalid regex")
}

/// Strategy for identifiers of at most `N` bytes.
pub fn beacon_id_strategy<const N: usize>() -> impl Strategy<Value = BeaconId<N>> {
    id_text_strategy(N).prop_map(|text| BeaconId::new(&text).expect("generated id is valid"))
}

/// Strategy for French frame identifiers.
pub fn frame_id_strategy() -> impl Strategy<Value = FrameId> {
    beacon_id_strategy::<FRAME_ID_MAX>()
}

/// Strategy for ANSI/CTA-2063 serial numbers.
pub fn ansi_id_strategy() -> impl Strategy<Value = AnsiId> {
    beacon_id_strategy::<ANSI_ID_MAX>()
}

/// Strategy for complete beacon records over the full range of every field.
pub fn beacon_record_strategy() -> impl Strategy<Value = BeaconRecord> {
    (
        (frame_id_strategy(), ansi_id_strategy()),
        (any::<i32>(), any::<i32>(), any::<i16>(), any::<i16>()),
        (any::<i32>(), any::<i32>(), any::<u16>(), any::<u16>()),
        (any::<u64>(), any::<u64>()),
    )
        .prop_map(
            |(
                (frame_id, ansi_id),
                (lat, lon, alt, height),
                (lat_start, lon_start, speed, bearing),
                (last_seen, first_seen),
            )| BeaconRecord {
                frame_id,
                ansi_id,
                lat,
                lon,
                alt,
                height,
                lat_start,
                lon_start,
                speed,
                bearing,
                last_seen,
                first_seen,
            },
        )
}

/// Strategy for a sequence of records.
pub fn record_batch_strategy(max_records: usize) -> impl Strategy<Value = Vec<BeaconRecord>> {
    prop::collection::vec(beacon_record_strategy(), 0..max_records)
}

/// A step in a randomized recorder session.
#[derive(Debug, Clone)]
pub enum RecorderOp {
    /// Append a record.
    Append(BeaconRecord),
    /// Append raw bytes.
    Raw(Vec<u8>),
    /// Run the flush path once.
    Flush,
}

/// Strategy for recorder operations, mostly appends.
pub fn recorder_op_strategy() -> impl Strategy<Value = RecorderOp> {
    prop_oneof![
        6 => beacon_record_strategy().prop_map(RecorderOp::Append),
        1 => prop::collection::vec(any::<u8>(), 1..64).prop_map(RecorderOp::Raw),
        3 => Just(RecorderOp::Flush),
    ]
}
