use std::{io, time::Duration};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use multi_rx::{
    complex::sample_bytes,
    datagram_sink::{DatagramSink, DatagramSocket},
    AcquisitionSession, ChannelAccumulator, Sample, Status,
};
use rand::prelude::*;

// Typical fc32 packet over a 1500 byte MTU
const PACKET: usize = 363;
const TOTAL: usize = 100_000;

struct Discard;

impl DatagramSocket for Discard {
    fn send_datagram(&mut self, buf: &[u8]) -> io::Result<()> {
        black_box(buf);
        Ok(())
    }
}

fn random_samples(n: usize) -> Vec<Sample> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| Sample::new(rng.gen(), rng.gen())).collect()
}

fn benchmark(c: &mut Criterion) {
    let packet = random_samples(PACKET);

    c.bench_function("accumulate packets", |b| {
        b.iter(|| {
            let mut acc = ChannelAccumulator::with_capacity(TOTAL);
            while acc.len() < TOTAL {
                acc.append(black_box(&packet));
            }
            acc
        })
    });

    c.bench_function("sample bytes", |b| {
        b.iter(|| sample_bytes(black_box(&packet)).len())
    });

    let channels = (0..4)
        .map(|_| {
            let mut acc = ChannelAccumulator::new();
            acc.append(&random_samples(TOTAL));
            acc
        })
        .collect();
    let session = AcquisitionSession::from_parts(channels, TOTAL, Status::Completed);
    let mut sink = DatagramSink::new(Discard, 256).with_pacing(Duration::ZERO);

    c.bench_function("datagram framing", |b| {
        b.iter(|| sink.send_session(black_box(&session)).map(|s| s.bytes_sent))
    });
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
