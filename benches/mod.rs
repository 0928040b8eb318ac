use criterion::{criterion_group, criterion_main};

mod etm;

criterion_group!(
    benches,
    etm::client::bench_poll_urcs,
    etm::client::bench_message_delivery,
    etm::client::bench_publish
);
criterion_main!(benches);
