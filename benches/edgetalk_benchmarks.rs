// Benchmark suite for the buffer and codec layers' hot paths: frame
// assembly/parsing and scalar encode/decode.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use edgetalk::buffer::{ReadMessageBuffer, WriteMessageBuffer};
use edgetalk::codec::scalars;
use edgetalk::codec::value::Value;
use edgetalk::buffer::WriteBuffer;

fn build_data_frame(payload_len: usize) -> Vec<u8> {
    let mut buf = WriteMessageBuffer::new();
    buf.begin_message(b'D').unwrap();
    buf.write_bytes(&vec![0u8; payload_len]).unwrap();
    buf.end_message().unwrap();
    buf.unwrap().unwrap().to_vec()
}

fn bench_frame_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_round_trip");
    for size in [16usize, 256, 4096] {
        let frame = build_data_frame(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| {
                let mut read = ReadMessageBuffer::new();
                read.feed(black_box(frame.clone()));
                assert!(read.take_message());
                black_box(read.consume_message());
            })
        });
    }
    group.finish();
}

fn bench_frame_split_across_chunks(c: &mut Criterion) {
    let frame = build_data_frame(4096);
    c.bench_function("frame_assembly_chunked", |b| {
        b.iter(|| {
            let mut read = ReadMessageBuffer::new();
            for chunk in frame.chunks(64) {
                read.feed(chunk.to_vec());
            }
            assert!(read.take_message());
            black_box(read.consume_message());
        })
    });
}

fn bench_scalar_int32_round_trip(c: &mut Criterion) {
    c.bench_function("scalar_int32_encode", |b| {
        b.iter(|| {
            let mut buf = WriteBuffer::new();
            scalars::encode(scalars::INT32, &mut buf, black_box(&Value::Int32(-123456))).unwrap();
            black_box(buf.unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_frame_round_trip,
    bench_frame_split_across_chunks,
    bench_scalar_int32_round_trip
);
criterion_main!(benches);
