//! Zstd Benchmarks
//!
//! Compares tessera-zstd against the reference zstd C library.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessera_core::{CompressionLevel, Compressor, Decompressor};
use tessera_zstd::{ZstdCompressor, ZstdDecompressor};

// ============================================================================
// Test Data Generators
// ============================================================================

fn generate_text_data(size: usize) -> Vec<u8> {
    let words: &[&[u8]] = &[
        b"the ", b"quick ", b"brown ", b"fox ", b"jumps ", b"over ", b"lazy ", b"dog ", b"and ",
        b"runs ", b"away. ", b"\n",
    ];
    let mut rng = StdRng::seed_from_u64(1);
    let mut result = Vec::with_capacity(size + 8);
    while result.len() < size {
        result.extend_from_slice(words[rng.gen_range(0..words.len())]);
    }
    result.truncate(size);
    result
}

fn generate_binary_data(size: usize) -> Vec<u8> {
    // Little-endian counters with noisy low bytes
    let mut rng = StdRng::seed_from_u64(2);
    let mut result = Vec::with_capacity(size + 4);
    let mut value = 0u32;
    while result.len() < size {
        value = value.wrapping_add(rng.gen_range(0..64));
        result.extend_from_slice(&value.to_le_bytes());
    }
    result.truncate(size);
    result
}

fn generate_random_data(size: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(3);
    let mut result = vec![0u8; size];
    rng.fill(result.as_mut_slice());
    result
}

// ============================================================================
// Compression Benchmarks
// ============================================================================

fn bench_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("zstd_compression");

    let sizes = [1024, 16384, 65536, 262144];

    for size in sizes {
        let datasets = [
            ("text", generate_text_data(size)),
            ("binary", generate_binary_data(size)),
            ("random", generate_random_data(size)),
        ];

        group.throughput(Throughput::Bytes(size as u64));

        for (name, data) in &datasets {
            group.bench_with_input(BenchmarkId::new(format!("tessera/{name}"), size), data, |b, data| {
                let compressor = ZstdCompressor::new();
                b.iter(|| compressor.compress(black_box(data)).unwrap())
            });

            group.bench_with_input(BenchmarkId::new(format!("zstd_ref/{name}"), size), data, |b, data| {
                b.iter(|| zstd::encode_all(black_box(data.as_slice()), 3).unwrap())
            });
        }
    }

    group.finish();
}

fn bench_decompression(c: &mut Criterion) {
    let mut group = c.benchmark_group("zstd_decompression");

    let sizes = [1024, 16384, 65536, 262144];

    for size in sizes {
        let text_data = generate_text_data(size);
        let binary_data = generate_binary_data(size);

        let compressor = ZstdCompressor::new();
        let tessera_text = compressor.compress(&text_data).unwrap();
        let tessera_binary = compressor.compress(&binary_data).unwrap();

        let zstd_text = zstd::encode_all(text_data.as_slice(), 3).unwrap();

        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("tessera/text", size), &tessera_text, |b, data| {
            let decompressor = ZstdDecompressor::new();
            b.iter(|| decompressor.decompress(black_box(data)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("tessera/binary", size), &tessera_binary, |b, data| {
            let decompressor = ZstdDecompressor::new();
            b.iter(|| decompressor.decompress(black_box(data)).unwrap())
        });

        // Frames from the reference encoder
        group.bench_with_input(BenchmarkId::new("tessera/zstd_frames", size), &zstd_text, |b, data| {
            let decompressor = ZstdDecompressor::new();
            b.iter(|| decompressor.decompress(black_box(data)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("zstd_ref/text", size), &zstd_text, |b, data| {
            b.iter(|| zstd::decode_all(black_box(data.as_slice())).unwrap())
        });
    }

    group.finish();
}

// ============================================================================
// Compression Level Benchmarks
// ============================================================================

fn bench_compression_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("zstd_levels");

    let data = generate_text_data(65536);
    group.throughput(Throughput::Bytes(data.len() as u64));

    let levels = [
        ("negative", CompressionLevel::Custom(-5), -5),
        ("fast", CompressionLevel::Fast, 1),
        ("default", CompressionLevel::Default, 3),
        ("best", CompressionLevel::Best, 9),
        ("ultra", CompressionLevel::Ultra, 19),
    ];

    for (name, level, zstd_level) in levels {
        group.bench_function(BenchmarkId::new("tessera", name), |b| {
            let compressor = ZstdCompressor::with_level(level);
            b.iter(|| compressor.compress(black_box(&data)).unwrap())
        });

        group.bench_function(BenchmarkId::new("zstd_ref", name), |b| {
            b.iter(|| zstd::encode_all(black_box(data.as_slice()), zstd_level).unwrap())
        });
    }

    group.finish();
}

// ============================================================================
// Roundtrip Benchmarks
// ============================================================================

fn bench_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("zstd_roundtrip");

    for size in [4096, 65536, 262144] {
        let data = generate_binary_data(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("tessera", size), &data, |b, data| {
            let compressor = ZstdCompressor::new();
            let decompressor = ZstdDecompressor::new();
            b.iter(|| {
                let compressed = compressor.compress(black_box(data)).unwrap();
                decompressor.decompress(&compressed).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("zstd_ref", size), &data, |b, data| {
            b.iter(|| {
                let compressed = zstd::encode_all(black_box(data.as_slice()), 3).unwrap();
                zstd::decode_all(compressed.as_slice()).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compression,
    bench_decompression,
    bench_compression_levels,
    bench_roundtrip,
);

criterion_main!(benches);
