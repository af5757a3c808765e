//! Record encoding and clock benchmarks.

use beacon_bench::utils::generate_records;
use beacon_recorder::{BeaconRecord, LogLines, SystemClock32, WideClock, MAX_RECORD_LEN};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

/// Benchmark encoding into the scratch buffer.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("record");
    group.throughput(Throughput::Elements(1));

    let records = generate_records(256);
    let mut buf = [0u8; MAX_RECORD_LEN];
    let mut i = 0;

    group.bench_function("encode_into", |b| {
        b.iter(|| {
            let len = records[i % records.len()].encode_into(black_box(&mut buf)).unwrap();
            i += 1;
            black_box(len);
        });
    });

    let line = records[0].to_line();
    group.bench_function("parse_line", |b| {
        b.iter(|| black_box(BeaconRecord::parse_line(black_box(&line)).unwrap()));
    });

    group.finish();
}

/// Benchmark decoding a whole log.
fn bench_decode_log(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_lines");

    let data: String = generate_records(1000).iter().map(BeaconRecord::to_line).collect();
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("1000_records", |b| {
        b.iter(|| {
            let count = LogLines::new(black_box(data.as_bytes()))
                .filter(Result::is_ok)
                .count();
            black_box(count);
        });
    });

    group.finish();
}

/// Benchmark the 64-bit clock.
fn bench_clock(c: &mut Criterion) {
    let clock = WideClock::new(SystemClock32::new());
    c.bench_function("wide_clock_micros64", |b| {
        b.iter(|| black_box(clock.micros64()));
    });
}

criterion_group!(benches, bench_encode, bench_decode_log, bench_clock);

criterion_main!(benches);
