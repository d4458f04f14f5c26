//! Benchmarks for the codec, the communication log and the gated transport.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use s7_gate::value::{decode, encode};
use s7_gate::{
    Address, Direction, GatedTransport, InMemoryDevice, LogEntry, LogRecorder, PlcValue,
    StatusLogRule, TransportConfig, VarType,
};

fn benchmark_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for count in [1usize, 16, 128].iter() {
        let value = PlcValue::RealArray((0..*count).map(|i| i as f32 * 0.5).collect());
        let bytes = encode(&value).unwrap_or_default();

        group.bench_with_input(BenchmarkId::new("encode_real", count), &value, |b, v| {
            b.iter(|| encode(black_box(v)));
        });
        group.bench_with_input(BenchmarkId::new("decode_real", count), &bytes, |b, data| {
            b.iter(|| decode(VarType::Real, black_box(data), *count));
        });
    }

    group.finish();
}

fn benchmark_log(c: &mut Criterion) {
    let mut group = c.benchmark_group("log");

    group.bench_function("append", |b| {
        let recorder = LogRecorder::new(1 << 16);
        b.iter(|| {
            recorder.append(LogEntry::bytes(
                Direction::Received,
                black_box(vec![0x01, 0x02, 0x03, 0x04]),
                "RS [PLC: bench], DB1.0",
            ));
        });
    });

    group.bench_function("render_1000", |b| {
        let recorder = LogRecorder::new(1000);
        for i in 0..1000u32 {
            recorder.append(LogEntry::bytes(
                Direction::Sent,
                i.to_be_bytes().to_vec(),
                "WO value",
            ));
        }
        b.iter(|| {
            let mut out = Vec::with_capacity(64 * 1024);
            recorder.render(&mut out).unwrap();
            black_box(out);
        });
    });

    group.finish();
}

fn benchmark_transport(c: &mut Criterion) {
    let mut group = c.benchmark_group("transport");

    for rule in [StatusLogRule::LogAll, StatusLogRule::LogOnlyOnChange].iter() {
        let config = TransportConfig::default()
            .with_communication_interval(Duration::ZERO)
            .with_log_capacity(1 << 16);
        let plc = GatedTransport::new(InMemoryDevice::new("bench"), config);
        plc.connect(1).unwrap();

        group.bench_with_input(
            BenchmarkId::new("read_status", format!("{:?}", rule)),
            rule,
            |b, &rule| {
                b.iter(|| {
                    plc.read_status_with(Address::db(1, 0), 4, rule, 1).unwrap();
                    if plc.log().len() > 60_000 {
                        plc.log().clear();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_codec, benchmark_log, benchmark_transport);
criterion_main!(benches);
