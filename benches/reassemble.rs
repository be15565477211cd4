use bytes::Bytes;
use criterion::{criterion_group, criterion_main, Criterion};
use rastercast_core::frame::RasterSpec;
use rastercast_core::protocol::{chunk_frame, ChunkReassembler};

fn bench_frame_transport(c: &mut Criterion) {
    let spec = RasterSpec::default();
    let payload = Bytes::from(vec![128u8; spec.byte_len()]);
    let chunk_size = 16 * 1024;

    c.bench_function("chunk_1440x720_frame", |b| {
        b.iter(|| chunk_frame(1, &payload, chunk_size))
    });

    let pairs = chunk_frame(1, &payload, chunk_size);
    c.bench_function("reassemble_1440x720_frame", |b| {
        b.iter(|| {
            let mut reassembler = ChunkReassembler::new(spec.byte_len());
            let mut published = None;
            for (header, chunk) in &pairs {
                let _ = reassembler.push(Bytes::copy_from_slice(&header.encode()));
                if let Some(frame) = reassembler.push(chunk.clone()) {
                    published = Some(frame);
                }
            }
            published.expect("frame should reassemble")
        })
    });
}

criterion_group!(benches, bench_frame_transport);
criterion_main!(benches);
