//! Benchmarks for the UTF-8 validator in `src/utf8.rs`.
//!
//! Unlike a generic "throughput by content type" sweep, these target the
//! one thing the block-wise checker actually branches on — whether a block
//! takes the all-ASCII fast path or runs the three-table lookup — and
//! compare both against the byte-by-byte reference validator the lookup
//! tables are differential-tested against.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tapejson::simd::scalar::Scalar;
use tapejson::utf8::{validate_scalar, Utf8Checker};

fn check_blockwise(input: &[u8]) -> bool {
    let mut checker = Utf8Checker::new();
    let mut pos = 0;
    while pos < input.len() {
        let take = core::cmp::min(64, input.len() - pos);
        let mut block = [0u8; 64];
        block[..take].copy_from_slice(&input[pos..pos + take]);
        checker.check_block::<Scalar>(&block);
        pos += take;
    }
    checker.finish()
}

/// Fills every 64-byte block entirely with ASCII, so `check_block` takes
/// the no-high-bit fast path on every block.
fn generate_pure_ascii(size: usize) -> Vec<u8> {
    b"the quick brown fox jumps over the lazy dog "
        .iter()
        .cycle()
        .take(size)
        .copied()
        .collect()
}

/// One non-ASCII character per 64-byte block, everything else ASCII, so
/// every block runs the full lookup despite being almost entirely
/// fast-path material. Built from whole repeating units so no multi-byte
/// character is ever truncated at the target size.
fn generate_one_multibyte_char_per_block(size: usize) -> Vec<u8> {
    let mut unit = Vec::new();
    unit.extend_from_slice(b"the quick brown fox jumps over the lazy d");
    unit.extend_from_slice("é".as_bytes());
    unit.push(b'\n');

    let mut out = Vec::with_capacity(size);
    while out.len() + unit.len() <= size {
        out.extend_from_slice(&unit);
    }
    out
}

/// Nothing but multibyte characters: the lookup path's worst case, and the
/// case where the byte-by-byte reference does the most per-byte work.
fn generate_dense_multibyte(size: usize) -> Vec<u8> {
    let unit = "日本語テキストのベンチマーク🎉".as_bytes();
    let whole_units = size / unit.len() * unit.len();
    unit.iter().cycle().take(whole_units).copied().collect()
}

fn bench_fast_path_vs_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("utf8_fast_path_vs_lookup");
    let size = 256 * 1024;

    let cases: &[(&str, Vec<u8>)] = &[
        ("pure_ascii", generate_pure_ascii(size)),
        ("sparse_multibyte", generate_one_multibyte_char_per_block(size)),
        ("dense_multibyte", generate_dense_multibyte(size)),
    ];

    for (name, data) in cases {
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("blockwise", name), data, |b, data| {
            b.iter(|| black_box(check_blockwise(black_box(data))));
        });
        group.bench_with_input(BenchmarkId::new("scalar_reference", name), data, |b, data| {
            b.iter(|| validate_scalar(black_box(data)).unwrap());
        });
    }

    group.finish();
}

fn bench_realistic_json_string_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("utf8_json_string_values");

    let documents: &[(&str, fn() -> Vec<u8>)] = &[
        ("ascii_keys_and_values", || {
            (0..2000)
                .map(|i| format!(r#"{{"id":{i},"name":"item {i}"}},"#))
                .collect::<String>()
                .into_bytes()
        }),
        ("accented_names", || {
            (0..2000)
                .map(|i| format!(r#"{{"id":{i},"name":"café résumé naïve {i}"}},"#))
                .collect::<String>()
                .into_bytes()
        }),
        ("cjk_names", || {
            (0..2000)
                .map(|i| format!(r#"{{"id":{i},"name":"日本語 中文 한국어 {i}"}},"#))
                .collect::<String>()
                .into_bytes()
        }),
        ("emoji_names", || {
            (0..2000)
                .map(|i| format!(r#"{{"id":{i},"name":"🎉🚀 item {i} 💻"}},"#))
                .collect::<String>()
                .into_bytes()
        }),
    ];

    for &(name, generator) in documents {
        let data = generator();
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &data, |b, data| {
            b.iter(|| black_box(check_blockwise(black_box(data))));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_fast_path_vs_lookup,
    bench_realistic_json_string_values,
);
criterion_main!(benches);
