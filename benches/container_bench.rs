use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jsgff::codec::{Codec, DeflateCodec};
use jsgff::meta::{parse, stringify};
use jsgff::{ContentFlags, Document, EncodeOptions, FormatDefinition, Map, Value};

fn headers() -> Map {
    (0..64)
        .map(|i| {
            let value = match i % 4 {
                0 => Value::from(format!("value number {i}")),
                1 => Value::from(i as f64 * 1.5),
                2 => Value::Array(vec![Value::from(true), Value::Null, Value::from(i)]),
                _ => Value::from(Map::from([("w", Value::from(640)), ("h", Value::from(480))])),
            };
            (format!("key{i}"), value)
        })
        .collect()
}

fn bench_metadata(c: &mut Criterion) {
    let map = headers();
    let text = stringify(&map);

    c.bench_function("stringify_64_keys", |b| b.iter(|| stringify(black_box(&map))));
    c.bench_function("parse_64_keys", |b| b.iter(|| parse(black_box(&text))));
}

fn bench_deflate(c: &mut Criterion) {
    let data = b"night over paris ".repeat(64 * 1024);
    let codec = DeflateCodec::default();

    c.bench_function("deflate_1mb", |b| b.iter(|| codec.compress(black_box(&data))));
}

fn bench_container(c: &mut Criterion) {
    let format = FormatDefinition::new("bench");
    let mut doc = Document::with_headers(headers(), Map::new());
    for i in 0..16 {
        let data: Vec<u8> = (0..64 * 1024).map(|n| ((n * 7 + i) % 251) as u8).collect();
        doc.add_content("data", data, headers(), ContentFlags::COMPRESSED);
    }

    let sequential = EncodeOptions { parallel: false, ..EncodeOptions::default() };
    let parallel = EncodeOptions { parallel: true, ..EncodeOptions::default() };
    let bytes = format.encode(&doc).unwrap();

    c.bench_function("encode_16x64k_sequential", |b| {
        b.iter(|| format.encode_with(black_box(&doc), &sequential).unwrap())
    });
    c.bench_function("encode_16x64k_parallel", |b| {
        b.iter(|| format.encode_with(black_box(&doc), &parallel).unwrap())
    });
    c.bench_function("decode_16x64k", |b| b.iter(|| format.decode(black_box(&bytes)).unwrap()));
}

criterion_group!(benches, bench_metadata, bench_deflate, bench_container);
criterion_main!(benches);
