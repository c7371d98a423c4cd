//! Throughput Benchmark for FlashWire
//!
//! This benchmark measures header coding and end-to-end frame delivery
//! over a loopback connection.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use flashwire::connection::{Callbacks, Connection, ConnectionConfig, ConnectionStats};
use flashwire::protocol::{Header, ResponseContext, HEADER_LEN};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// Benchmark header decode/encode
fn bench_header(c: &mut Criterion) {
    let mut group = c.benchmark_group("header");
    group.throughput(Throughput::Elements(1));

    let raw = Header::new(1024, 7, 0xdead_beef).to_bytes();
    group.bench_function("decode", |b| {
        b.iter(|| black_box(Header::decode(black_box(&raw))));
    });

    group.bench_function("encode", |b| {
        let mut buf = BytesMut::with_capacity(HEADER_LEN);
        let header = Header::new(1024, 7, 0xdead_beef);
        b.iter(|| {
            buf.clear();
            header.encode(&mut buf);
            black_box(&buf);
        });
    });

    group.finish();
}

/// Benchmark building framed responses
fn bench_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("response");

    for size in [64usize, 4 * 1024, 64 * 1024] {
        let body = vec![b'x'; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("framed_{}", size), |b| {
            b.iter(|| black_box(ResponseContext::framed(1, 2, black_box(&body))));
        });
    }

    group.finish();
}

/// Benchmark frames pushed through a live connection
fn bench_loopback(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (mut client, mut delivered) = rt.block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (stream, peer) = listener.accept().await.unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let callbacks = Callbacks::new().on_read(move |_, frame| {
            let _ = tx.send(frame.len());
        });
        let conn = Connection::new(
            stream,
            peer,
            ConnectionConfig::default(),
            callbacks,
            Arc::new(ConnectionStats::new()),
        );
        conn.start();
        (client, rx)
    });

    let mut group = c.benchmark_group("loopback");

    for size in [64usize, 4 * 1024, 64 * 1024] {
        let mut frame = BytesMut::with_capacity(HEADER_LEN + size);
        Header::new(size as u32, 1, 1).encode(&mut frame);
        frame.extend_from_slice(&vec![b'x'; size]);

        group.throughput(Throughput::Bytes((HEADER_LEN + size) as u64));
        group.bench_function(format!("frame_{}", size), |b| {
            b.iter(|| {
                rt.block_on(async {
                    client.write_all(&frame).await.unwrap();
                    black_box(delivered.recv().await.unwrap());
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_header, bench_response, bench_loopback);
criterion_main!(benches);
