//! Benchmark utilities.

use beacon_recorder::{AnsiId, BeaconRecord, FrameId};
use rand::Rng;

const ID_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn random_id(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| char::from(ID_CHARS[rng.gen_range(0..ID_CHARS.len())]))
        .collect()
}

/// Generate random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a beacon record with realistic field values.
pub fn random_record(rng: &mut impl Rng) -> BeaconRecord {
    let frame = random_id(rng, 30);
    let ansi = random_id(rng, 20);
    BeaconRecord {
        frame_id: FrameId::new(&frame).unwrap_or_default(),
        ansi_id: AnsiId::new(&ansi).unwrap_or_default(),
        lat: rng.gen_range(-90_000_000..=90_000_000),
        lon: rng.gen_range(-180_000_000..=180_000_000),
        alt: rng.gen_range(-100..=5_000),
        height: rng.gen_range(-100..=1_000),
        lat_start: rng.gen_range(-90_000_000..=90_000_000),
        lon_start: rng.gen_range(-180_000_000..=180_000_000),
        speed: rng.gen_range(0..=200),
        bearing: rng.gen_range(0..360),
        last_seen: rng.gen(),
        first_seen: rng.gen(),
    }
}

/// Generate a batch of random records.
pub fn generate_records(count: usize) -> Vec<BeaconRecord> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| random_record(&mut rng)).collect()
}
