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

//! Union-All Derivation Tests

use cardest::core::{BuiltinCatalog, DataType, Point};
use cardest::statistics::{
    Bucket, EstimationContext, Histogram, Statistics, StatisticsConfig, UnionAllColumns,
};

fn range(lo: i64, hi: i64, freq: f64, ndv: f64) -> Histogram {
    Histogram::new(vec![Bucket::new(Point::new(lo), Point::new(hi), true, false, freq, ndv)])
}

/// Test the union of two empty inputs
#[test]
fn test_union_all_of_empty_inputs() {
    let cat = BuiltinCatalog::new();
    let config = StatisticsConfig::default();
    let ctx = EstimationContext::new(&cat, &config);

    let columns = [(1, DataType::Integer), (2, DataType::Boolean)];
    let left = Statistics::empty(&columns, &ctx);
    let right = Statistics::empty(&columns, &ctx);

    let out = left.union_all(&right, &UnionAllColumns::identity(vec![1, 2]), &ctx);
    assert!(out.is_empty());
    assert_eq!(out.rows(), config.minimum_row_floor);
    for column in [1, 2] {
        assert!(out.histogram(column).is_some(), "column {} missing", column);
    }
    assert_eq!(out.column_type(2), Some(DataType::Boolean));
}

/// Test overlapping ranges are merged with row weights
#[test]
fn test_union_all_overlapping_ranges() {
    let cat = BuiltinCatalog::new();
    let config = StatisticsConfig::default();
    let ctx = EstimationContext::new(&cat, &config);

    let left = Statistics::new(100.0).with_column(1, DataType::Integer, range(0, 10, 1.0, 10.0));
    let right = Statistics::new(300.0).with_column(1, DataType::Integer, range(0, 10, 1.0, 10.0));
    let out = left.union_all(&right, &UnionAllColumns::identity(vec![1]), &ctx);

    assert_eq!(out.rows(), 400.0);
    let hist = out.histogram(1).unwrap();
    assert_eq!(hist.bucket_count(), 1);
    assert!(hist.is_normalized());
    assert!(hist.is_valid(&cat));
}

/// Test partially overlapping ranges keep ordered, non-overlapping buckets
#[test]
fn test_union_all_partial_overlap() {
    let cat = BuiltinCatalog::new();
    let config = StatisticsConfig::default();
    let ctx = EstimationContext::new(&cat, &config);

    let left = Statistics::new(100.0).with_column(1, DataType::Integer, range(0, 20, 1.0, 20.0));
    let right = Statistics::new(100.0).with_column(3, DataType::Integer, range(10, 30, 1.0, 20.0));
    let columns = UnionAllColumns::new(vec![7], vec![1], vec![3]);
    let out = left.union_all(&right, &columns, &ctx);

    let hist = out.histogram(7).unwrap();
    assert!(hist.bucket_count() >= 2, "got\n{}", hist);
    assert!(hist.is_valid(&cat));
    assert!(hist.is_normalized());
    assert_eq!(out.columns(), vec![7]);
    assert_eq!(out.width(7), Some(8.0));
}

/// Test NULLs are weighted by the rows of their side
#[test]
fn test_union_all_null_fraction() {
    let cat = BuiltinCatalog::new();
    let config = StatisticsConfig::default();
    let ctx = EstimationContext::new(&cat, &config);

    let nulls = Histogram::with_residuals(Vec::new(), true, 1.0, 0.0, 0.0);
    let left = Statistics::new(100.0).with_column(1, DataType::Integer, range(0, 10, 1.0, 10.0));
    let right = Statistics::new(100.0).with_column(1, DataType::Integer, nulls);
    let out = left.union_all(&right, &UnionAllColumns::identity(vec![1]), &ctx);

    let hist = out.histogram(1).unwrap();
    assert!((hist.null_freq() - 0.5).abs() < 1e-9);
    assert!((hist.buckets()[0].frequency() - 0.5).abs() < 1e-9);
}
