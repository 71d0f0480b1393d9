//! Scanner performance benchmarks for shelf-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shelf_core::{hash_path, hash_path_full, ScanConfig, TreeScanner};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn bench_path_hashing(c: &mut Criterion) {
    let path = PathBuf::from("/srv/library/comics/Akira/Akira v01/001.jpg");

    c.bench_function("hash_path", |b| b.iter(|| hash_path(black_box(&path))));
    c.bench_function("hash_path_full", |b| {
        b.iter(|| hash_path_full(black_box(&path)))
    });
}

/// `width` top-level folders, each with one comic folder and a few plain files
fn build_library(root: &Path, width: usize) {
    for i in 0..width {
        let series = root.join(format!("series-{i}"));
        let comic = series.join("vol-01");
        fs::create_dir_all(&comic).unwrap();
        for page in 0..8 {
            fs::write(comic.join(format!("{page:03}.jpg")), b"page").unwrap();
        }
        for n in 0..4 {
            fs::write(series.join(format!("notes-{n}.txt")), b"notes").unwrap();
        }
    }
}

fn bench_scan(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("scan");

    for width in [16usize, 128] {
        let tmp = TempDir::new().unwrap();
        build_library(tmp.path(), width);

        for concurrency in [1usize, 8] {
            let scanner = TreeScanner::new(ScanConfig {
                concurrency,
                ..ScanConfig::default()
            })
            .unwrap();

            group.bench_with_input(
                BenchmarkId::new(format!("width_{width}"), concurrency),
                &concurrency,
                |b, _| {
                    b.iter(|| {
                        let outcome = runtime.block_on(scanner.scan(tmp.path())).unwrap();
                        black_box(outcome.files.len())
                    })
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_path_hashing, bench_scan);
criterion_main!(benches);
