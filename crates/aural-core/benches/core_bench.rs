//! Criterion benchmarks for aural-core buffers and resampler kernels
//!
//! Run with: cargo bench -p aural-core
#![allow(missing_docs)]

use aural_core::{
    DataBuffer, HistoryRing, Kernel, ResampleBackend, SectionCoefficients, SectionState, resample,
};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 256, 1024, 4096];

fn generate_test_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
        })
        .collect()
}

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("Resample");

    let kernels = [
        ("nearest", Kernel::Nearest, 1.02),
        ("linear", Kernel::Linear, 0.5),
        ("cubic", Kernel::Cubic, 0.2),
        ("skip", Kernel::Skip, 2.5),
    ];

    for &block_size in BLOCK_SIZES {
        for (name, kernel, factor) in kernels {
            let src_len = (block_size as f32 * factor) as usize + 4;
            let input = generate_test_signal(src_len);
            let mut out = vec![0.0f32; block_size];

            for (backend_name, backend) in [
                ("scalar", ResampleBackend::Scalar),
                ("chunked", ResampleBackend::Chunked),
            ] {
                group.bench_with_input(
                    BenchmarkId::new(format!("{name}/{backend_name}"), block_size),
                    &block_size,
                    |b, _| {
                        b.iter(|| {
                            black_box(resample(
                                kernel,
                                backend,
                                &mut out,
                                black_box(&input),
                                0,
                                0.0,
                                factor,
                            ))
                        });
                    },
                );
            }
        }
    }

    group.finish();
}

fn bench_data_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("DataBuffer");

    for &block_size in BLOCK_SIZES {
        let bytes = vec![0x5au8; block_size * 4];
        let mut out = vec![0u8; block_size * 4];
        group.bench_with_input(
            BenchmarkId::new("add_move", block_size),
            &block_size,
            |b, _| {
                let mut buf = DataBuffer::create(2, block_size * 16, 4).unwrap();
                b.iter(|| {
                    black_box(buf.add(0, black_box(&bytes)));
                    black_box(buf.move_to(0, &mut out));
                });
            },
        );
    }

    group.finish();
}

fn bench_history_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("HistoryRing");

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);
        group.bench_with_input(
            BenchmarkId::new("load_commit", block_size),
            &block_size,
            |b, _| {
                let mut ring = HistoryRing::new(3360, block_size);
                b.iter(|| {
                    ring.load(black_box(&input));
                    black_box(ring.read_window(-1000, block_size));
                    ring.commit(block_size);
                });
            },
        );
    }

    group.finish();
}

fn bench_section(c: &mut Criterion) {
    let coeffs = SectionCoefficients::lowpass(1000.0, 0.707, SAMPLE_RATE);
    let input = generate_test_signal(1024);

    c.bench_function("Section/process_1024", |b| {
        let mut state = SectionState::default();
        b.iter(|| {
            for &sample in &input {
                black_box(state.process(&coeffs, black_box(sample)));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_resample,
    bench_data_buffer,
    bench_history_ring,
    bench_section
);
criterion_main!(benches);
