use std::hint::black_box;

use criterion::{Criterion, Throughput};
use libetm::Config;
use libetm::etm::{Modem, QoS};
use libetm::network::{Platform, Read, Write};

/// Replays a recorded receive stream and discards everything written.
struct ReplaySerial {
    stream: Vec<u8>,
    pos: usize,
}

impl ReplaySerial {
    fn new() -> Self {
        Self {
            stream: Vec::new(),
            pos: 0,
        }
    }

    fn load(&mut self, stream: &[u8]) {
        self.stream.clear();
        self.stream.extend_from_slice(stream);
        self.pos = 0;
    }
}

impl Read for ReplaySerial {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let remaining = &self.stream[self.pos..];
        let len = buf.len().min(remaining.len());
        buf[..len].copy_from_slice(&remaining[..len]);
        self.pos += len;
        Ok(len)
    }
}

impl Write for ReplaySerial {
    type Error = ();

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(black_box(buf).len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

struct FixedClock;

impl Platform for FixedClock {
    fn millis(&self) -> u64 {
        0
    }
}

type BenchModem<'a> = Modem<'a, ReplaySerial, FixedClock>;

fn setup<'a>() -> BenchModem<'a> {
    Modem::new(ReplaySerial::new(), FixedClock, Config::default())
}

pub fn bench_poll_urcs(c: &mut Criterion) {
    let mut stream = Vec::new();
    for _ in 0..50 {
        stream.extend_from_slice(b"+ETMSTATE: 6\r\nOK\r\n+EMQPUBOPEN:0,0\r\n+CSQ: 20,99\r\n");
    }

    let mut group = c.benchmark_group("poll");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("poll_urcs", |b| {
        let mut modem = setup();
        b.iter(|| {
            modem.transport_mut().load(&stream);
            modem.poll().expect("Failed to poll");
        })
    });
    group.finish();
}

pub fn bench_message_delivery(c: &mut Criterion) {
    let payload = [0xA5u8; 200];
    let mut stream = Vec::new();
    for _ in 0..20 {
        stream.extend_from_slice(b"+EMQ:0,200\r\n");
        stream.extend_from_slice(&payload);
    }

    let mut on_message = |body: &[u8]| {
        black_box(body);
    };
    let mut modem = setup();
    modem
        .subscribe("bench/in", Some(&mut on_message))
        .expect("Failed to subscribe");
    modem.transport_mut().load(b"OK\r\n+EMQSUBOPEN:0,0\r\n");
    modem.poll().expect("Failed to poll");

    let mut group = c.benchmark_group("message_delivery");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("message_delivery", |b| {
        b.iter(|| {
            modem.transport_mut().load(&stream);
            modem.poll().expect("Failed to poll");
        })
    });
    group.finish();
}

pub fn bench_publish(c: &mut Criterion) {
    let payload = [0x5Au8; 256];
    let mut modem = setup();
    modem.register("bench/out").expect("Failed to register");
    modem.transport_mut().load(b"OK\r\n+EMQPUBOPEN:0,0\r\n");
    modem.poll().expect("Failed to poll");

    let mut group = c.benchmark_group("publish");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("publish_hex", |b| {
        b.iter(|| {
            modem
                .publish(0, QoS::AtLeastOnce, &payload)
                .expect("Failed to publish");
        })
    });
    group.finish();
}
