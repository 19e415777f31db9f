//! R*-tree 性能基准测试
//!
//! 覆盖插入、区域查询、k-NN、删除和 skyline。
//! 当前测试规模：100,000 条点记录；skyline 是平方复杂度，单独用小数据集

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use geo::Point;
use geostar::{RTree, RecordHandle, Rectangle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BENCHMARK_SIZE: usize = 100_000;
const SKYLINE_SIZE: usize = 2_000;

/// 性能测试配置
struct BenchConfig {
    size: usize,
    max_entries: usize,
    seed: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            size: BENCHMARK_SIZE,
            max_entries: 16,
            seed: 42,
        }
    }
}

/// 生成测试数据：经纬度范围内的随机点
fn generate_test_data(count: usize, seed: u64) -> Vec<(Rectangle, RecordHandle)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let x = rng.gen_range(-180.0..180.0);
            let y = rng.gen_range(-90.0..90.0);
            let handle = RecordHandle::new(1 + (i / 2048) as u32, (i % 2048) as u32);
            (Rectangle::from_point(x, y), handle)
        })
        .collect()
}

/// 生成查询矩形
fn generate_query_rects(count: usize, coverage_percent: f64, seed: u64) -> Vec<Rectangle> {
    let mut rng = StdRng::seed_from_u64(seed + 1000);

    // 根据覆盖率计算查询矩形的大小
    let scale = (coverage_percent / 100.0).sqrt();
    let (width, height) = (360.0 * scale, 180.0 * scale);

    (0..count)
        .map(|_| {
            let x = rng.gen_range(-180.0..(180.0 - width));
            let y = rng.gen_range(-90.0..(90.0 - height));
            Rectangle::new(x, y, x + width, y + height)
        })
        .collect()
}

fn build_tree(data: &[(Rectangle, RecordHandle)], max_entries: usize) -> RTree {
    let mut rtree = RTree::new(max_entries);
    for (rect, handle) in data {
        let _ = rtree.insert(*rect, *handle);
    }
    rtree
}

/// 插入性能测试
fn bench_insert(c: &mut Criterion) {
    let config = BenchConfig::default();
    let test_data = generate_test_data(config.size, config.seed);

    c.bench_function("insert", |b| {
        b.iter(|| build_tree(&test_data, config.max_entries));
    });
}

/// 区域查询性能测试
fn bench_range(c: &mut Criterion) {
    let config = BenchConfig::default();
    let test_data = generate_test_data(config.size, config.seed);
    let rtree = build_tree(&test_data, config.max_entries);

    for (name, coverage) in [("range_0.1%", 0.1), ("range_1%", 1.0), ("range_5%", 5.0)] {
        let queries = generate_query_rects(1_000, coverage, config.seed);

        c.bench_function(name, |b| {
            b.iter(|| {
                queries
                    .iter()
                    .filter_map(|query| rtree.range_query(query).ok())
                    .map(|results| results.len())
                    .sum::<usize>()
            });
        });
    }
}

/// k-NN 性能测试
fn bench_knn(c: &mut Criterion) {
    let config = BenchConfig::default();
    let test_data = generate_test_data(config.size, config.seed);
    let rtree = build_tree(&test_data, config.max_entries);

    let mut rng = StdRng::seed_from_u64(config.seed + 2000);
    let points: Vec<Point<f64>> = (0..1_000)
        .map(|_| Point::new(rng.gen_range(-180.0..180.0), rng.gen_range(-90.0..90.0)))
        .collect();

    for k in [1, 10, 100] {
        c.bench_function(&format!("knn_{}", k), |b| {
            b.iter(|| {
                points
                    .iter()
                    .filter_map(|point| rtree.k_nearest(*point, k).ok())
                    .map(|results| results.len())
                    .sum::<usize>()
            });
        });
    }
}

/// 删除性能测试
fn bench_delete_half(c: &mut Criterion) {
    let config = BenchConfig::default();
    let test_data = generate_test_data(config.size, config.seed);

    c.bench_function("delete_half", |b| {
        b.iter_batched(
            || build_tree(&test_data, config.max_entries),
            |mut rtree| {
                for (rect, _) in &test_data[..config.size / 2] {
                    let _ = rtree.delete(rect);
                }
                rtree
            },
            BatchSize::LargeInput,
        );
    });
}

/// skyline 性能测试
fn bench_skyline(c: &mut Criterion) {
    let config = BenchConfig::default();
    let test_data = generate_test_data(SKYLINE_SIZE, config.seed);
    let rtree = build_tree(&test_data, config.max_entries);

    c.bench_function("skyline", |b| {
        b.iter(|| rtree.skyline().len());
    });
}

criterion_group!(
    benches,
    bench_insert,
    bench_range,
    bench_knn,
    bench_delete_half,
    bench_skyline
);
criterion_main!(benches);
