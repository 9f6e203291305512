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

//! Property Tests
//!
//! Invariants that hold for any histogram and predicate

use cardest::core::{BuiltinCatalog, CmpType, DataType, Point};
use cardest::statistics::{
    Bucket, EstimationContext, Histogram, Predicate, Statistics, StatisticsConfig,
};
use proptest::prelude::*;

/// Contiguous buckets starting at `start` with the given widths and weights
fn histogram_from(start: i64, parts: &[(i64, f64)]) -> Histogram {
    let total: f64 = parts.iter().map(|(_, w)| w).sum();
    let mut lower = start;
    let buckets = parts
        .iter()
        .map(|&(width, weight)| {
            let bucket = Bucket::new(
                Point::new(lower),
                Point::new(lower + width),
                true,
                false,
                weight / total,
                width as f64,
            );
            lower += width;
            bucket
        })
        .collect();
    Histogram::new(buckets)
}

fn arb_histogram() -> impl Strategy<Value = Histogram> {
    (
        -1000i64..1000,
        prop::collection::vec((1i64..50, 0.01f64..1.0), 1..8),
    )
        .prop_map(|(start, parts)| histogram_from(start, &parts))
}

fn arb_cmp() -> impl Strategy<Value = CmpType> {
    prop_oneof![
        Just(CmpType::Eq),
        Just(CmpType::NEq),
        Just(CmpType::Lt),
        Just(CmpType::LEq),
        Just(CmpType::Gt),
        Just(CmpType::GEq),
    ]
}

fn stats_with(hist: Histogram, other: Histogram, rows: f64) -> Statistics {
    Statistics::new(rows)
        .with_column(1, DataType::Integer, hist)
        .with_column(2, DataType::Integer, other)
}

proptest! {
    #![proptest_config(ProptestConfig {
        max_global_rejects: 16384,
        ..ProptestConfig::default()
    })]

    #[test]
    fn filter_never_adds_rows(
        hist in arb_histogram(),
        cmp in arb_cmp(),
        value in -1200i64..1200,
        rows in 1.0f64..1e7,
    ) {
        let cat = BuiltinCatalog::new();
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&cat, &config);
        let stats = stats_with(hist.clone(), hist, rows);

        let out = stats.filter(&Predicate::point(1, cmp, value), &ctx);
        prop_assert!(out.rows() <= rows + 1e-6);
        prop_assert!(out.rows() >= 1.0);

        let filtered = out.histogram(1).unwrap();
        prop_assert!(filtered.frequency() <= 1.0 + 1e-6);
        prop_assert!(filtered.is_valid(&cat));
    }

    #[test]
    fn conjunction_never_exceeds_its_parts(
        h1 in arb_histogram(),
        h2 in arb_histogram(),
        v1 in -1200i64..1200,
        v2 in -1200i64..1200,
        cmp1 in arb_cmp(),
        cmp2 in arb_cmp(),
    ) {
        let cat = BuiltinCatalog::new();
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&cat, &config);
        let stats = stats_with(h1, h2, 100_000.0);

        let p1 = Predicate::point(1, cmp1, v1);
        let p2 = Predicate::point(2, cmp2, v2);
        let alone = stats.filter(&p1, &ctx).rows();
        let both = stats.filter(&Predicate::and(vec![p1, p2]), &ctx).rows();
        prop_assert!(both <= alone + 1e-6, "both {} alone {}", both, alone);
    }

    #[test]
    fn refiltering_is_stable(hist in arb_histogram(), value in -1200i64..1200) {
        let cat = BuiltinCatalog::new();
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&cat, &config);
        let stats = stats_with(hist.clone(), hist, 10_000.0);

        for cmp in [CmpType::Eq, CmpType::Lt] {
            let pred = Predicate::point(1, cmp, value);
            let once = stats.filter(&pred, &ctx);
            let twice = once.filter(&pred, &ctx);
            prop_assert!((once.rows() - twice.rows()).abs() <= 1e-6 * once.rows().max(1.0));
        }
    }

    #[test]
    fn intersection_is_symmetric(
        a0 in -100i64..100,
        wa in 1i64..50,
        b0 in -150i64..150,
        wb in 1i64..50,
    ) {
        let cat = BuiltinCatalog::new();
        let a = Bucket::new(Point::new(a0), Point::new(a0 + wa), true, false, 0.5, wa as f64);
        let b = Bucket::new(Point::new(b0), Point::new(b0 + wb), true, false, 0.3, wb as f64);
        prop_assume!(a.intersects(&b, &cat));

        let (ab, fa, fb) = a.intersect(&b, &cat);
        let (ba, gb, ga) = b.intersect(&a, &cat);
        prop_assert!(ab.lower().equals(ba.lower(), &cat));
        prop_assert!(ab.upper().equals(ba.upper(), &cat));
        prop_assert_eq!(ab.is_lower_closed(), ba.is_lower_closed());
        prop_assert_eq!(ab.is_upper_closed(), ba.is_upper_closed());
        prop_assert!((ab.frequency() - ba.frequency()).abs() < 1e-12);
        prop_assert!((fa - ga).abs() < 1e-12);
        prop_assert!((fb - gb).abs() < 1e-12);
    }

    #[test]
    fn difference_accounts_for_all_mass(
        a0 in -100i64..100,
        wa in 1i64..50,
        b0 in -150i64..150,
        wb in 1i64..50,
    ) {
        let cat = BuiltinCatalog::new();
        let a = Bucket::new(Point::new(a0), Point::new(a0 + wa), true, false, 0.5, wa as f64);
        let b = Bucket::new(Point::new(b0), Point::new(b0 + wb), true, false, 0.3, wb as f64);

        let (lower, upper) = a.difference(&b, &cat);
        let remaining: f64 = lower.iter().chain(upper.iter()).map(Bucket::frequency).sum();
        let removed = if a.intersects(&b, &cat) { a.intersect(&b, &cat).1 } else { 0.0 };
        prop_assert!((remaining + removed - a.frequency()).abs() < 1e-9,
            "remaining {} removed {}", remaining, removed);

        // Distinct values split the same way as the frequency
        let remaining_ndv: f64 = lower.iter().chain(upper.iter()).map(Bucket::distinct).sum();
        let removed_ndv = removed / a.frequency() * a.distinct();
        prop_assert!((remaining_ndv + removed_ndv - a.distinct()).abs() < 1e-9,
            "remaining ndv {} removed ndv {}", remaining_ndv, removed_ndv);
    }

    #[test]
    fn unions_keep_frequency_within_one(
        h1 in arb_histogram(),
        h2 in arb_histogram(),
        rows1 in 1.0f64..1e6,
        rows2 in 1.0f64..1e6,
        v1 in -1200i64..1200,
        v2 in -1200i64..1200,
        cmp1 in arb_cmp(),
        cmp2 in arb_cmp(),
    ) {
        let cat = BuiltinCatalog::new();
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&cat, &config);

        let all = h1.make_union_all_normalized(rows1, &h2, rows2, &ctx);
        prop_assert!(all.frequency() <= 1.0 + 1e-6, "union-all frequency {}", all.frequency());

        let (either, _) = h1.make_union_normalized(rows1, &h2, rows2, &ctx);
        prop_assert!(either.frequency() <= 1.0 + 1e-6, "union frequency {}", either.frequency());

        let stats = stats_with(h1.clone(), h2, rows1);
        let pred = Predicate::or(vec![
            Predicate::point(1, cmp1, v1),
            Predicate::point(1, cmp2, v2),
        ]);
        let out = stats.filter(&pred, &ctx);
        prop_assert!(out.rows() <= rows1 + 1e-6);
        let filtered = out.histogram(1).unwrap();
        prop_assert!(filtered.frequency() <= 1.0 + 1e-6, "disjunction frequency {}", filtered.frequency());
    }

    #[test]
    fn disjunction_scale_factor_never_grows(
        factors in prop::collection::vec(1.0f64..1000.0, 1..6),
        extra in 1.0f64..1000.0,
    ) {
        let config = StatisticsConfig::default();
        let combiner = cardest::statistics::ScaleFactorCombiner::new(&config);
        let before = combiner.disjunction(&factors, 1e9);
        let mut more = factors.clone();
        more.push(extra);
        let after = combiner.disjunction(&more, 1e9);
        prop_assert!(after <= before + 1e-9);

        let conj = combiner.conjunction(&factors);
        let product: f64 = factors.iter().product();
        prop_assert!(conj <= product * (1.0 + 1e-9));
    }
}
