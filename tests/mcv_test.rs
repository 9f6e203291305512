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

//! MCV Merge Tests
//!
//! Most-common-value lists spliced into equi-depth histograms

use cardest::core::{BuiltinCatalog, Error, Point};
use cardest::statistics::{merge_mcv_histogram, transform_mcv, Bucket, Histogram};

fn rest_of_values() -> Histogram {
    Histogram::new(vec![Bucket::new(
        Point::new(0i64),
        Point::new(100i64),
        true,
        false,
        0.6,
        100.0,
    )])
}

/// Test MCVs become sorted singleton buckets
#[test]
fn test_transform_sorts_values() {
    let cat = BuiltinCatalog::new();
    let mcv = transform_mcv(
        &[Point::new(50i64), Point::new(10i64), Point::new(30i64)],
        &[0.1, 0.2, 0.05],
        &cat,
    )
    .unwrap();

    assert_eq!(mcv.bucket_count(), 3);
    let lowers: Vec<String> = mcv.buckets().iter().map(|b| b.lower().to_string()).collect();
    assert_eq!(lowers, vec!["10", "30", "50"]);
    assert!(mcv.buckets().iter().all(|b| b.is_singleton(&cat) && b.distinct() == 1.0));
    assert!((mcv.frequency() - 0.35).abs() < 1e-9);
}

/// Test malformed MCV lists are rejected
#[test]
fn test_transform_rejects_bad_input() {
    let cat = BuiltinCatalog::new();
    let err = transform_mcv(&[Point::new(1i64)], &[0.1, 0.2], &cat).unwrap_err();
    assert!(matches!(err, Error::McvLengthMismatch { values: 1, frequencies: 2 }));

    assert!(transform_mcv(&[Point::new(1i64)], &[1.5], &cat).is_err());
    assert!(transform_mcv(&[Point::new(1i64), Point::new(2i64)], &[0.7, 0.7], &cat).is_err());
}

/// Test MCVs inside a bucket split it and keep the total mass
#[test]
fn test_merge_splits_containing_bucket() {
    let cat = BuiltinCatalog::new();
    let mcv = transform_mcv(&[Point::new(10i64), Point::new(50i64)], &[0.2, 0.2], &cat).unwrap();
    let merged = merge_mcv_histogram(&mcv, &rest_of_values(), &cat);

    // [0,10) [10,10] (10,50) [50,50] (50,100)
    assert_eq!(merged.bucket_count(), 5, "got\n{}", merged);
    assert!(merged.is_valid(&cat));
    assert!((merged.frequency() - 1.0).abs() < 1e-9);

    let singletons = merged.buckets().iter().filter(|b| b.is_singleton(&cat)).count();
    assert_eq!(singletons, 2);
    // Distinct values of the bucket minus the two MCVs, plus the MCVs themselves
    assert!((merged.distinct() - 100.0).abs() < 1e-9);
}

/// Test MCVs outside every bucket pass through
#[test]
fn test_merge_keeps_outlying_mcvs() {
    let cat = BuiltinCatalog::new();
    let mcv = transform_mcv(&[Point::new(-5i64), Point::new(500i64)], &[0.1, 0.1], &cat).unwrap();
    let merged = merge_mcv_histogram(&mcv, &rest_of_values(), &cat);
    assert_eq!(merged.bucket_count(), 3);
    assert!(merged.buckets()[0].lower().equals(&Point::new(-5i64), &cat));
    assert!(merged.buckets()[2].lower().equals(&Point::new(500i64), &cat));
}

/// Test text MCVs cannot be merged into an integer histogram
#[test]
fn test_merge_incomparable_keeps_heavier_side() {
    let cat = BuiltinCatalog::new();
    let heavy = transform_mcv(&[Point::new("a"), Point::new("b")], &[0.4, 0.3], &cat).unwrap();
    let merged = merge_mcv_histogram(&heavy, &rest_of_values(), &cat);
    assert_eq!(merged.bucket_count(), 2);

    let light = transform_mcv(&[Point::new("a")], &[0.1], &cat).unwrap();
    let merged = merge_mcv_histogram(&light, &rest_of_values(), &cat);
    assert_eq!(merged.bucket_count(), 1);
    assert!(merged.buckets()[0].lower().equals(&Point::new(0i64), &cat));
}
