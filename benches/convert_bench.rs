use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use iplist2mmdb::{Converter, GeoRecord, MmdbWriter, Network, WriterOptions};
use std::hint::black_box;
use std::io::Cursor;

// Synthetic list alternating between the two built-in sections
fn source_list(ranges: usize) -> String {
    let mut out = String::with_capacity(ranges * 20);
    for i in 0..ranges {
        if i % 500 == 0 {
            out.push_str(if (i / 500) % 2 == 0 { "[CN]\n" } else { "[CF]\n" });
        }
        out.push_str(&format!("{}.{}.{}.0/24\n", 1 + i / 65536, (i / 256) % 256, i % 256));
    }
    out
}

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");
    let converter = Converter::default();

    for ranges in [1_000usize, 10_000, 50_000] {
        let source = source_list(ranges);
        group.throughput(Throughput::Elements(ranges as u64));

        group.bench_with_input(BenchmarkId::new("parse_only", ranges), &source, |b, src| {
            b.iter(|| {
                let mut sink: Vec<(Network, GeoRecord)> = Vec::with_capacity(ranges);
                let stats = converter
                    .convert(Cursor::new(black_box(src.as_str())), &mut sink)
                    .unwrap();
                black_box(stats);
            });
        });

        group.bench_with_input(BenchmarkId::new("build_mmdb", ranges), &source, |b, src| {
            b.iter(|| {
                let mut writer = MmdbWriter::new(WriterOptions::default()).unwrap();
                converter
                    .convert(Cursor::new(black_box(src.as_str())), &mut writer)
                    .unwrap();
                black_box(writer.to_bytes().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_convert);
criterion_main!(benches);
