//! Stress tests for the recorder.
//!
//! These runs put several producers and a periodic flusher on one recorder
//! and check that the log on the medium is consistent with the stats.

use crate::fixtures::{read_records, scenarios::tagged_record};
use beacon_recorder::{AppendOutcome, PeriodicFlusher, Recorder};
use beacon_storage::LogFs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total appends attempted.
    pub total_ops: usize,
    /// Appends that reached a slot.
    pub appended: usize,
    /// Appends that were dropped.
    pub dropped: usize,
    /// Total duration.
    pub duration: Duration,
    /// Appends per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(appended: usize, dropped: usize, duration: Duration) -> Self {
        let total = appended + dropped;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            appended,
            dropped,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total appends: {}", self.total_ops);
        println!("Appended: {}", self.appended);
        println!("Dropped: {}", self.dropped);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} appends/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Records appended by each producer.
    pub records_per_producer: usize,
    /// Number of producer threads.
    pub producers: usize,
    /// Interval of the background flusher.
    pub flush_interval: Duration,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            records_per_producer: 5_000,
            producers: 4,
            flush_interval: Duration::from_millis(1),
        }
    }
}

fn count(outcomes: impl Iterator<Item = AppendOutcome>) -> (usize, usize) {
    outcomes.fold((0, 0), |(ok, dropped), outcome| match outcome {
        AppendOutcome::Appended { .. } => (ok + 1, dropped),
        AppendOutcome::Dropped | AppendOutcome::Disabled => (ok, dropped + 1),
    })
}

/// Runs one producer on the calling thread while a flusher runs in the
/// background. The session is closed at the end.
pub fn stress_single_producer<F>(recorder: Arc<Recorder<F>>, config: &StressConfig) -> StressTestResult
where
    F: LogFs + 'static,
{
    let flusher = PeriodicFlusher::spawn(Arc::clone(&recorder), config.flush_interval)
        .expect("Failed to spawn flusher");

    let start = Instant::now();
    let (appended, dropped) = count(
        (0..config.records_per_producer)
            .map(|i| recorder.append_record(&tagged_record(0, i as u32))),
    );
    flusher.stop();
    let _ = recorder.close_session().expect("Failed to close session");

    StressTestResult::new(appended, dropped, start.elapsed())
}

/// Runs `config.producers` producer threads against a background flusher.
/// The session is closed at the end.
pub fn stress_concurrent_producers<F>(
    recorder: Arc<Recorder<F>>,
    config: &StressConfig,
) -> StressTestResult
where
    F: LogFs + 'static,
{
    let flusher = PeriodicFlusher::spawn(Arc::clone(&recorder), config.flush_interval)
        .expect("Failed to spawn flusher");

    let start = Instant::now();
    let handles: Vec<_> = (0..config.producers)
        .map(|source| {
            let recorder = Arc::clone(&recorder);
            let records = config.records_per_producer;
            thread::spawn(move || {
                count(
                    (0..records).map(|i| recorder.append_record(&tagged_record(source, i as u32))),
                )
            })
        })
        .collect();

    let (appended, dropped) = handles
        .into_iter()
        .map(|h| h.join().expect("producer panicked"))
        .fold((0, 0), |(a, d), (ok, dropped)| (a + ok, d + dropped));

    flusher.stop();
    let _ = recorder.close_session().expect("Failed to close session");

    StressTestResult::new(appended, dropped, start.elapsed())
}

/// Checks a log written by the stress runs.
///
/// Every line must decode, and each producer's records must appear in the
/// order they were appended. Returns the number of records.
pub fn verify_log(data: &[u8], producers: usize) -> Result<usize, String> {
    let records = read_records(data).map_err(|e| e.to_string())?;
    let mut last_seen = vec![None; producers];

    for record in &records {
        let source: usize = record
            .frame_id
            .as_str()
            .strip_prefix('P')
            .and_then(|n| n.parse().ok())
            .filter(|n| *n < producers)
            .ok_or_else(|| format!("unexpected producer tag {}", record.frame_id))?;

        if let Some(previous) = last_seen[source] {
            if record.last_seen <= previous {
                return Err(format!(
                    "producer {source}: record {} after {previous}",
                    record.last_seen
                ));
            }
        }
        last_seen[source] = Some(record.last_seen);
    }
    Ok(records.len())
}
