use criterion::{Criterion, criterion_group, criterion_main};
use std::fmt::Write;
use std::hint::black_box;
use zonesync::catalog::catalog_hash;
use zonesync::zone::{ZoneParser, render};

/// A zone with `hosts` A/AAAA/TXT triples under one apex
fn large_zone(hosts: usize) -> String {
    let mut text = String::from(
        "$TTL 3600\n$ORIGIN bench.test.\n\
         @ IN SOA ns1 hostmaster 2024030900 10800 3600 604800 3600\n\
         @ IN NS ns1\n@ IN MX 10 mail\n",
    );
    for i in 0..hosts {
        let _ = writeln!(text, "host{} IN A 10.{}.{}.{}", i, (i >> 16) & 255, (i >> 8) & 255, i & 255);
        let _ = writeln!(text, "host{} IN AAAA 2001:db8::{:x}", i, i);
        let _ = writeln!(text, "host{} IN TXT \"id={}\"", i, i);
    }
    text
}

fn bench_zone_codec(c: &mut Criterion) {
    let text = large_zone(2000);
    let document = ZoneParser::new().parse(&text).unwrap();

    c.bench_function("parse 6k record zone", |b| {
        b.iter(|| ZoneParser::new().parse(black_box(&text)).unwrap());
    });

    c.bench_function("render 6k record zone", |b| {
        b.iter(|| render(black_box(&document)));
    });

    c.bench_function("content hash 6k record zone", |b| {
        b.iter(|| black_box(&document).content_hash());
    });

    c.bench_function("catalog member hash", |b| {
        b.iter(|| catalog_hash(black_box("example.com.")).unwrap());
    });
}

criterion_group!(benches, bench_zone_codec);
criterion_main!(benches);
