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

//! Join and Group-By Derivation Tests
//!
//! Multi-operator pipelines as an optimizer would estimate them

use cardest::core::{BuiltinCatalog, CmpType, DataType, Point};
use cardest::statistics::{
    Bucket, EstimationContext, Histogram, JoinPredicate, Predicate, Statistics, StatisticsConfig,
};

fn uniform(lo: i64, hi: i64, buckets: i64, ndv: f64) -> Histogram {
    let step = (hi - lo) / buckets;
    Histogram::new(
        (0..buckets)
            .map(|i| {
                Bucket::new(
                    Point::new(lo + i * step),
                    Point::new(lo + (i + 1) * step),
                    true,
                    false,
                    1.0 / buckets as f64,
                    ndv / buckets as f64,
                )
            })
            .collect(),
    )
}

/// orders(order_id #1, customer_id #2, amount #3)
fn orders() -> Statistics {
    Statistics::new(1_000_000.0)
        .with_column(1, DataType::Integer, uniform(0, 1_000_000, 10, 1_000_000.0))
        .with_column(2, DataType::Integer, uniform(0, 10_000, 10, 10_000.0))
        .with_column(3, DataType::Float, Histogram::undefined())
        .with_upper_bound(2, 10_000.0)
}

/// customers(customer_id #10, region #11)
fn customers() -> Statistics {
    Statistics::new(10_000.0)
        .with_column(10, DataType::Integer, uniform(0, 10_000, 10, 10_000.0))
        .with_column(11, DataType::Integer, uniform(0, 20, 4, 20.0))
}

/// Test a foreign-key join keeps the fact table's row count
#[test]
fn test_foreign_key_join() {
    let cat = BuiltinCatalog::new();
    let config = StatisticsConfig::default();
    let ctx = EstimationContext::new(&cat, &config);

    let joined = orders().inner_join(&customers(), &[JoinPredicate::eq(2, 10)], &ctx);
    assert!((joined.rows() - 1_000_000.0).abs() < 1e-3, "rows {}", joined.rows());
    assert_eq!(joined.columns(), vec![1, 2, 3, 10, 11]);
    assert!(joined.upper_bound(2).unwrap() <= 10_000.0);
}

/// Test a filter on the dimension table reduces the join output
#[test]
fn test_filter_then_join() {
    let cat = BuiltinCatalog::new();
    let config = StatisticsConfig::default();
    let ctx = EstimationContext::new(&cat, &config);

    let west = customers().filter(&Predicate::point(11, CmpType::Lt, 5i64), &ctx);
    assert!((west.rows() - 2500.0).abs() < 1e-6);

    let joined = orders().inner_join(&west, &[JoinPredicate::eq(2, 10)], &ctx);
    assert!(joined.rows() < 1_000_000.0);
    assert!(joined.rows() > 1.0);
}

/// Test grouping a join result by a low-cardinality column
#[test]
fn test_join_then_group_by() {
    let cat = BuiltinCatalog::new();
    let config = StatisticsConfig::default();
    let ctx = EstimationContext::new(&cat, &config);

    let joined = orders().inner_join(&customers(), &[JoinPredicate::eq(2, 10)], &ctx);
    let per_region = joined.group_by(&[11], &[(20, DataType::Float)], &ctx);
    assert!((per_region.rows() - 20.0).abs() < 1e-6, "rows {}", per_region.rows());
    assert_eq!(per_region.columns(), vec![11, 20]);
    assert_eq!(per_region.predicate_count(), joined.predicate_count());
}

/// Test semi and anti-semi joins partition the outer rows
#[test]
fn test_semi_and_anti_semi_join() {
    let cat = BuiltinCatalog::new();
    let config = StatisticsConfig::default();
    let ctx = EstimationContext::new(&cat, &config);

    let active = Statistics::new(500.0).with_column(30, DataType::Integer, uniform(0, 5000, 5, 500.0));
    let preds = [JoinPredicate::eq(10, 30)];

    let with_orders = customers().left_semi_join(&active, &preds, &ctx);
    let without_orders = customers().left_anti_semi_join(&active, &preds, &ctx);

    assert!(with_orders.rows() <= 10_000.0);
    assert!(without_orders.rows() <= 10_000.0);
    assert_eq!(with_orders.columns(), vec![10, 11]);
    assert_eq!(without_orders.columns(), vec![10, 11]);
    // Customers above 5000 cannot match
    let unmatched = without_orders.histogram(10).unwrap();
    assert!(unmatched.buckets().iter().all(|b| !b.upper().less_than(&Point::new(5000i64), &cat)));
}

/// Test a left outer join pads unmatched rows with NULLs
#[test]
fn test_left_outer_join() {
    let cat = BuiltinCatalog::new();
    let config = StatisticsConfig::default();
    let ctx = EstimationContext::new(&cat, &config);

    let active = Statistics::new(500.0).with_column(30, DataType::Integer, uniform(0, 5000, 5, 500.0));
    let out = customers().left_outer_join(&active, &[JoinPredicate::eq(10, 30)], &ctx);
    assert!(out.rows() >= 10_000.0);
    assert!(out.histogram(30).unwrap().null_freq() > 0.0);
    assert!(!out.is_empty());
}

/// Test limit and projection after a group-by
#[test]
fn test_limit_and_project() {
    let cat = BuiltinCatalog::new();
    let config = StatisticsConfig::default();
    let ctx = EstimationContext::new(&cat, &config);

    let grouped = orders().group_by(&[2], &[(40, DataType::Float)], &ctx);
    let top = grouped.limit(10.0, &ctx);
    assert_eq!(top.rows(), 10.0);
    assert_eq!(top.upper_bound(2), Some(10.0));

    let projected = top.project(&[40], &[], &ctx);
    assert_eq!(projected.columns(), vec![40]);
    assert_eq!(projected.rows(), 10.0);
}

/// Test join damping trusts the most selective predicate
#[test]
fn test_composite_key_join_damping() {
    let cat = BuiltinCatalog::new();
    let config = StatisticsConfig::default();
    let ctx = EstimationContext::new(&cat, &config);

    let left = orders();
    let right = customers();
    let single = left.inner_join(&right, &[JoinPredicate::eq(2, 10)], &ctx);
    let double = left.inner_join(&right, &[JoinPredicate::eq(2, 10), JoinPredicate::eq(1, 11)], &ctx);
    assert!(double.rows() <= single.rows());

    let independent = StatisticsConfig::independent();
    let ctx = EstimationContext::new(&cat, &independent);
    let strict = left.inner_join(&right, &[JoinPredicate::eq(2, 10), JoinPredicate::eq(1, 11)], &ctx);
    assert!(strict.rows() <= double.rows());
}
