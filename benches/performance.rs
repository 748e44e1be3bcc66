//! Performance benchmarks for the devscan scanner

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use devscan::{
    config::ScanConfig,
    intelligence::{classify, Evidence},
    network::HttpProbe,
    scanner::{ScanEngine, ScanRequest},
    utils::profiles::parse_port_list,
    IpRange,
};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use tokio::runtime::Runtime;

/// Benchmark range parsing and expansion
fn bench_range_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_expansion");

    group.bench_function("parse_last_octet", |b| {
        b.iter(|| IpRange::parse(black_box("192.168.1.1-254")).unwrap())
    });

    group.bench_function("parse_cidr_16", |b| {
        b.iter(|| IpRange::parse(black_box("10.20.0.0/16")).unwrap())
    });

    for size in [256u32, 65_536] {
        let range = IpRange::new(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::from(0x0A00_0000 + size - 1)).unwrap();
        group.bench_with_input(BenchmarkId::new("iterate", size), &range, |b, range| {
            b.iter(|| range.iter().fold(0u32, |acc, addr| acc ^ u32::from(addr)))
        });
    }

    group.bench_function("parse_port_list", |b| {
        b.iter(|| parse_port_list(black_box("21,22,23,80,443,554,1935,8000-8100,8443")).unwrap())
    });

    group.finish();
}

/// Benchmark the classification rule table
fn bench_classifier(c: &mut Criterion) {
    let mut group = c.benchmark_group("classifier");
    let address = Ipv4Addr::new(192, 168, 1, 64);

    let camera_ports: BTreeSet<u16> = [80, 554, 8000].into_iter().collect();
    let http = HttpProbe::new(Some("DNVRS-Webs / Hikvision"), Some("text/html"));
    group.bench_function("camera_with_http", |b| {
        b.iter(|| classify(black_box(&Evidence::new(address, &camera_ports, Some(&http)))))
    });

    let server_ports: BTreeSet<u16> = [22, 443, 3389].into_iter().collect();
    group.bench_function("server_ports_only", |b| {
        b.iter(|| classify(black_box(&Evidence::new(address, &server_ports, None))))
    });

    group.finish();
}

/// Benchmark a loopback scan against closed ports
fn bench_loopback_scan(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("loopback_scan");
    group.sample_size(10);

    for chunk_size in [1usize, 20, 100] {
        let config = ScanConfig::default()
            .with_chunking(chunk_size, 0)
            .with_probe_timeout(100)
            .with_http_fingerprint(false);
        let engine = ScanEngine::new(config).unwrap();
        let request = ScanRequest::new(IpRange::parse("127.0.0.1-8").unwrap(), 40000u16..40016).unwrap();

        group.bench_with_input(BenchmarkId::new("chunk_size", chunk_size), &request, |b, request| {
            b.iter(|| rt.block_on(engine.scan(request)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_range_expansion, bench_classifier, bench_loopback_scan);

criterion_main!(benches);
