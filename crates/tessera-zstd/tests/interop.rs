//! Interoperability with the reference zstd library.
//!
//! Frames written here must decode with libzstd, and frames written by
//! libzstd must decode here.

use std::io::Write;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessera_core::{CompressionLevel, Compressor, Decompressor};
use tessera_zstd::{get_decompressed_size, ZstdCompressor, ZstdDecompressor};

fn text(rng: &mut StdRng, size: usize) -> Vec<u8> {
    let words: &[&[u8]] = &[
        b"compressed ", b"frames ", b"decode ", b"with ", b"either ", b"library ", b"and ", b"match ",
        b"bit ", b"for ", b"bit.\n",
    ];
    let mut data = Vec::with_capacity(size + 16);
    while data.len() < size {
        data.extend_from_slice(words[rng.gen_range(0..words.len())]);
    }
    data.truncate(size);
    data
}

/// Text with long-distance repeats, so large windows matter.
fn far_repeats(rng: &mut StdRng, size: usize) -> Vec<u8> {
    let chunk = text(rng, 300_000);
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        let start = rng.gen_range(0..chunk.len() - 5000);
        data.extend_from_slice(&chunk[start..start + rng.gen_range(100..5000)]);
        data.push(rng.gen());
    }
    data.truncate(size);
    data
}

fn random(rng: &mut StdRng, size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    rng.fill(data.as_mut_slice());
    data
}

fn corpus() -> Vec<(&'static str, Vec<u8>)> {
    let mut rng = StdRng::seed_from_u64(0x1A7E);
    let mut mixed = text(&mut rng, 150_000);
    mixed.extend(vec![7u8; 200_000]);
    mixed.extend(random(&mut rng, 40_000));
    mixed.extend(text(&mut rng, 10));
    vec![
        ("empty", Vec::new()),
        ("byte", vec![42]),
        ("short", b"abcabcabcabc".to_vec()),
        ("text", text(&mut rng, 100_000)),
        ("far", far_repeats(&mut rng, 1_500_000)),
        ("random", random(&mut rng, 70_000)),
        ("mixed", mixed),
    ]
}

#[test]
fn test_reference_decodes_our_frames() {
    for (name, data) in corpus() {
        for level in [-5, 1, 3, 9, 19] {
            let compressed = ZstdCompressor::with_level(CompressionLevel::Custom(level))
                .compress(&data)
                .unwrap();
            let decoded = zstd::decode_all(compressed.as_slice())
                .unwrap_or_else(|err| panic!("{name} at level {level}: {err}"));
            assert!(decoded == data, "{name} at level {level} decoded differently");
        }
    }
}

#[test]
fn test_we_decode_reference_stream_frames() {
    let decompressor = ZstdDecompressor::new();
    for (name, data) in corpus() {
        for level in [1, 3, 19] {
            let compressed = zstd::encode_all(data.as_slice(), level).unwrap();
            let decoded = decompressor
                .decompress(&compressed)
                .unwrap_or_else(|err| panic!("{name} at level {level}: {err}"));
            assert!(decoded == data, "{name} at level {level} decoded differently");
        }
    }
}

#[test]
fn test_we_decode_reference_bulk_frames() {
    let decompressor = ZstdDecompressor::new();
    for (name, data) in corpus() {
        for level in [-3, 3, 12] {
            let compressed = zstd::bulk::compress(&data, level).unwrap();
            assert_eq!(get_decompressed_size(&compressed).unwrap(), Some(data.len() as u64), "{name}");

            // The declared size lets a caller size the buffer exactly
            let mut output = vec![0u8; data.len()];
            let written = tessera_zstd::decompress(&compressed, &mut output).unwrap();
            assert_eq!(written, data.len());
            assert!(output == data, "{name} at level {level} decoded differently");

            assert!(decompressor.decompress(&compressed).unwrap() == data);
        }
    }
}

#[test]
fn test_reference_checksums() {
    let mut rng = StdRng::seed_from_u64(5);
    let data = text(&mut rng, 250_000);

    let mut encoder = zstd::stream::Encoder::new(Vec::new(), 5).unwrap();
    encoder.include_checksum(true).unwrap();
    encoder.write_all(&data).unwrap();
    let mut compressed = encoder.finish().unwrap();

    let decompressor = ZstdDecompressor::new();
    assert_eq!(decompressor.decompress(&compressed).unwrap(), data);

    let last = compressed.len() - 1;
    compressed[last] ^= 0x80;
    let err = decompressor.decompress(&compressed).unwrap_err();
    assert!(matches!(err, tessera_core::Error::ChecksumMismatch { .. }), "{err}");
}

#[test]
fn test_mixed_concatenation() {
    let mut rng = StdRng::seed_from_u64(9);
    let first = text(&mut rng, 40_000);
    let second = far_repeats(&mut rng, 200_000);

    let mut frames = ZstdCompressor::new().compress(&first).unwrap();
    frames.extend(zstd::encode_all(second.as_slice(), 3).unwrap());
    frames.extend(ZstdCompressor::with_level(CompressionLevel::Fast).compress(&second).unwrap());

    let mut expected = first;
    expected.extend_from_slice(&second);
    expected.extend_from_slice(&second);

    assert!(ZstdDecompressor::new().decompress(&frames).unwrap() == expected);
    assert!(zstd::decode_all(frames.as_slice()).unwrap() == expected);
}

#[test]
fn test_ratio_close_to_reference() {
    let mut rng = StdRng::seed_from_u64(21);
    let data = far_repeats(&mut rng, 500_000);
    for level in [1, 3, 9] {
        let ours = ZstdCompressor::with_level(CompressionLevel::Custom(level))
            .compress(&data)
            .unwrap()
            .len();
        let reference = zstd::bulk::compress(&data, level).unwrap().len();
        // Within a generous factor of libzstd at the same level
        assert!(ours < reference * 2, "level {level}: {ours} vs {reference}");
    }
}
