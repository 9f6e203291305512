// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Filter estimation benchmark
//!
//! Run with: cargo bench --bench filter_estimation
//!
//! Measures predicate trees of growing size against a 100-bucket histogram:
//! a single range, an IN list of 20 values and a cross-column disjunction.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cardest::core::{BuiltinCatalog, CmpType, DataType, Point};
use cardest::statistics::{
    Bucket, EstimationContext, Histogram, Predicate, Statistics, StatisticsConfig,
};

const BUCKETS: i64 = 100;

fn setup_statistics() -> Statistics {
    let histogram = |width: i64| {
        Histogram::new(
            (0..BUCKETS)
                .map(|i| {
                    Bucket::new(
                        Point::new(i * width),
                        Point::new((i + 1) * width),
                        true,
                        false,
                        1.0 / BUCKETS as f64,
                        width as f64,
                    )
                })
                .collect(),
        )
    };
    Statistics::new(10_000_000.0)
        .with_column(1, DataType::Integer, histogram(100))
        .with_column(2, DataType::Integer, histogram(10))
        .with_column(3, DataType::Integer, histogram(1000))
}

fn bench_filters(c: &mut Criterion) {
    let catalog = BuiltinCatalog::new();
    let config = StatisticsConfig::default();
    let ctx = EstimationContext::new(&catalog, &config);
    let stats = setup_statistics();

    let range = Predicate::and(vec![
        Predicate::point(1, CmpType::GEq, 1_234i64),
        Predicate::point(1, CmpType::Lt, 5_678i64),
    ]);
    c.bench_function("filter_range", |b| {
        b.iter(|| black_box(stats.filter(black_box(&range), &ctx)))
    });

    let in_list = Predicate::or((0..20).map(|i| Predicate::point(2, CmpType::Eq, i * 37i64)).collect());
    c.bench_function("filter_in_list_20", |b| {
        b.iter(|| black_box(stats.filter(black_box(&in_list), &ctx)))
    });

    let mixed = Predicate::or(vec![
        Predicate::and(vec![
            Predicate::point(1, CmpType::Lt, 2_000i64),
            Predicate::point(3, CmpType::Gt, 50_000i64),
        ]),
        Predicate::and(vec![
            Predicate::point(1, CmpType::GEq, 8_000i64),
            Predicate::like(2),
        ]),
        Predicate::unsupported(None, 10.0),
    ]);
    c.bench_function("filter_cross_column_disjunction", |b| {
        b.iter(|| black_box(stats.filter(black_box(&mixed), &ctx)))
    });
}

criterion_group!(benches, bench_filters);
criterion_main!(benches);
