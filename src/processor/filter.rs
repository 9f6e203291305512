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

//! Filter derivation
//!
//! Walks a predicate tree over the input histograms. Predicates on the same
//! column compose by filtering the already filtered histogram, so their
//! combined effect is exact under the uniform bucket assumption. Predicates
//! on different columns each contribute a scale factor, and those are
//! combined with damping.
//!
//! ## Disjunctions
//!
//! Every alternative is evaluated against the histograms that entered the
//! disjunction. Alternatives on the same column are OR-merged as they are
//! seen, growing a cumulative row count. Alternatives spanning several
//! columns are merged map by map.
//!
//! A column referenced by only some alternatives keeps its input histogram:
//! in `(x = 1) OR (x = 2 AND y = 2)` the rows of the first alternative say
//! nothing about `y`, so narrowing `y` would be unsound.

use rustc_hash::FxHashSet;

use crate::core::ColumnId;
use crate::statistics::config::EPSILON;
use crate::statistics::context::EstimationContext;
use crate::statistics::histogram::Histogram;
use crate::statistics::predicate::Predicate;
use crate::statistics::scale_factor::{ScaleFactorCombiner, ScaleFactors};
use crate::statistics::stats::{cap_histogram_ndvs, derive_upper_bounds, HistogramMap, Statistics};

/// Statistics of the rows of `input` that satisfy `predicate`
pub fn derive_filter(input: &Statistics, predicate: &Predicate, ctx: &EstimationContext) -> Statistics {
    FilterProcessor::new(ctx).derive(input, predicate)
}

/// Applies predicate trees to histogram maps
pub struct FilterProcessor<'a> {
    ctx: EstimationContext<'a>,
    combiner: ScaleFactorCombiner<'a>,
}

impl<'a> FilterProcessor<'a> {
    pub fn new(ctx: &EstimationContext<'a>) -> Self {
        Self {
            ctx: *ctx,
            combiner: ScaleFactorCombiner::new(ctx.config),
        }
    }

    /// Derive the output statistics of a filter
    ///
    /// # Panics
    ///
    /// Panics if a predicate names a column that has no histogram in `input`.
    pub fn derive(&self, input: &Statistics, predicate: &Predicate) -> Statistics {
        let min_rows = self.ctx.min_rows();
        let input_rows = min_rows.max(input.rows());

        let mut num_predicates = 1;
        let (mut histograms, scale_factor) = if input.is_empty() {
            let placeholders = input
                .histograms()
                .keys()
                .map(|&column| (column, Histogram::new(Vec::new())))
                .collect();
            (placeholders, 1.0)
        } else if predicate.is_disjunction() {
            self.disjunction(input.histograms(), input_rows, predicate)
        } else {
            let children = flatten_conjunction(predicate);
            num_predicates = children.len();
            self.conjunction(input.histograms(), input_rows, children)
        };

        let rows = if input.is_empty() {
            input_rows
        } else {
            min_rows.max(input_rows / scale_factor)
        };

        if self.ctx.config.cap_ndvs_after_filter {
            cap_histogram_ndvs(&mut histograms, rows);
        }

        tracing::debug!(
            input_rows,
            rows,
            scale_factor,
            predicates = num_predicates,
            "filter statistics derived"
        );

        Statistics {
            histograms,
            widths: input.widths.clone(),
            column_types: input.column_types.clone(),
            rows,
            is_empty: input.is_empty(),
            predicate_count: input.predicate_count() + num_predicates,
            upper_bounds: derive_upper_bounds(
                &input.upper_bounds,
                rows,
                self.ctx.config.cardinality_upper_bound_method,
            ),
        }
    }

    // =========================================================================
    // Conjunctions
    // =========================================================================

    /// Apply a conjunction, returning the new histograms and its scale factor
    fn conjunction(
        &self,
        input: &HistogramMap,
        input_rows: f64,
        mut children: Vec<&Predicate>,
    ) -> (HistogramMap, f64) {
        sort_by_column(&mut children);

        let mut result = input.clone();
        let mut scale_factors = ScaleFactors::new();
        let mut last_column: Option<ColumnId> = None;
        let mut last_scale_factor = 1.0;

        for child in children {
            if let Predicate::Unsupported {
                column: None,
                scale_factor,
            } = child
            {
                scale_factors.push(scale_factor.max(1.0));
                continue;
            }

            let column = child.column();
            if column.is_none() || column != last_column {
                scale_factors.push(last_scale_factor);
                last_scale_factor = 1.0;
            }

            match child {
                Predicate::Disjunction { .. } => {
                    // A single-column disjunction sees the rows left after the
                    // predicates already applied to its column
                    let disj_input_rows = match column {
                        Some(_) => self.ctx.min_rows().max(input_rows / last_scale_factor),
                        None => input_rows,
                    };
                    let (mut disj_result, disj_scale_factor) =
                        self.disjunction(&result, disj_input_rows, child);

                    match column {
                        Some(column) => {
                            if let Some(histogram) = disj_result.remove(&column) {
                                result.insert(column, histogram);
                            }
                            last_scale_factor *= disj_scale_factor;
                        }
                        None => {
                            last_scale_factor = disj_scale_factor;
                            result = disj_result;
                        }
                    }
                }
                Predicate::Conjunction { .. } => {
                    unreachable!("nested conjunctions are flattened before filtering")
                }
                leaf => {
                    let column = leaf_column(leaf);
                    let current = histogram_of(&result, column);
                    let (filtered, local_scale_factor) = self.filter_leaf(current, leaf);
                    last_scale_factor *= local_scale_factor;
                    if histogram_of(input, column).is_empty() {
                        // Nothing is known about the column, so the filter
                        // cannot be measured against it
                        last_scale_factor = self.ctx.default_scale_factor();
                    }
                    result.insert(column, filtered);
                }
            }
            last_column = column;
        }
        scale_factors.push(last_scale_factor);

        let scale_factor = self.combiner.conjunction(&scale_factors);
        tracing::trace!(
            factors = ?scale_factors.as_slice(),
            scale_factor,
            "conjunction scale factor"
        );
        (result, scale_factor)
    }

    // =========================================================================
    // Disjunctions
    // =========================================================================

    /// Apply a disjunction, returning the new histograms and its scale factor
    fn disjunction(&self, input: &HistogramMap, input_rows: f64, predicate: &Predicate) -> (HistogramMap, f64) {
        let min_rows = self.ctx.min_rows();
        let non_updatable = non_updatable_columns(predicate);

        let mut result = HistogramMap::default();
        let mut scale_factors = ScaleFactors::new();
        let mut prev_histogram: Option<Histogram> = None;
        let mut prev_column: Option<ColumnId> = None;
        let mut prev_scale_factor = input_rows;
        let mut cumulative_rows = min_rows;

        for child in predicate.sorted_children() {
            if let Predicate::Unsupported {
                column: None,
                scale_factor,
            } = child
            {
                scale_factors.push(scale_factor.max(1.0));
                continue;
            }

            let column = child.column();
            if column.is_none() || column != prev_column {
                scale_factors.push(prev_scale_factor);
                self.fold_column_result(
                    &non_updatable,
                    input_rows,
                    cumulative_rows,
                    prev_histogram.take(),
                    prev_column,
                    &mut result,
                );
            }

            // Every alternative starts from the histograms entering the disjunction
            let (child_histogram, child_map, child_scale_factor) = match child {
                Predicate::Conjunction { .. } | Predicate::Disjunction { .. } => {
                    let (mut child_map, child_scale_factor) =
                        self.conj_or_disj(input, input_rows, child);
                    let histogram = column.and_then(|c| child_map.remove(&c));
                    (histogram, Some(child_map), child_scale_factor)
                }
                leaf => {
                    let column = leaf_column(leaf);
                    let input_histogram = histogram_of(input, column);
                    let (filtered, mut scale_factor) = self.filter_leaf(input_histogram, leaf);
                    if input_histogram.is_empty() {
                        scale_factor = self.ctx.default_scale_factor();
                    }
                    (Some(filtered), None, scale_factor)
                }
            };

            let child_rows = input_rows / child_scale_factor;
            match (column, child_histogram) {
                (Some(_), Some(histogram)) => {
                    let merged = match prev_histogram.take() {
                        None => {
                            cumulative_rows = child_rows;
                            histogram
                        }
                        Some(prev) => {
                            let (merged, output_rows) =
                                prev.make_union_normalized(cumulative_rows, &histogram, child_rows, &self.ctx);
                            cumulative_rows = output_rows;
                            merged
                        }
                    };
                    prev_histogram = Some(merged);
                    prev_scale_factor = input_rows / min_rows.max(cumulative_rows);
                }
                _ => {
                    let child_map = child_map.unwrap_or_default();
                    let current_rows = input_rows / self.combiner.disjunction(&scale_factors, input_rows);
                    result = merge_after_disjunct(&non_updatable, &result, &child_map, current_rows, child_rows, &self.ctx);
                    prev_histogram = None;
                    prev_scale_factor = child_scale_factor;
                }
            }
            prev_column = column;
        }

        self.fold_column_result(
            &non_updatable,
            input_rows,
            cumulative_rows,
            prev_histogram.take(),
            prev_column,
            &mut result,
        );
        scale_factors.push(min_rows.max(prev_scale_factor));

        let scale_factor = self.combiner.disjunction(&scale_factors, input_rows);
        tracing::trace!(
            factors = ?scale_factors.as_slice(),
            scale_factor,
            "disjunction scale factor"
        );

        // Columns no alternative touched pass through
        for (column, histogram) in input {
            result.entry(*column).or_insert_with(|| histogram.clone());
        }
        (result, scale_factor)
    }

    fn conj_or_disj(&self, input: &HistogramMap, input_rows: f64, predicate: &Predicate) -> (HistogramMap, f64) {
        if predicate.is_disjunction() {
            self.disjunction(input, input_rows, predicate)
        } else {
            self.conjunction(input, input_rows, flatten_conjunction(predicate))
        }
    }

    /// Store the OR-merged histogram of the column the walk just left
    fn fold_column_result(
        &self,
        non_updatable: &FxHashSet<ColumnId>,
        input_rows: f64,
        cumulative_rows: f64,
        histogram: Option<Histogram>,
        column: Option<ColumnId>,
        result: &mut HistogramMap,
    ) {
        let (Some(mut histogram), Some(column)) = (histogram, column) else {
            return;
        };
        if non_updatable.contains(&column) {
            return;
        }
        if let Some(existing) = result.get(&column) {
            let (merged, _) = histogram.make_union_normalized(input_rows, existing, cumulative_rows, &self.ctx);
            histogram = merged;
        }
        result.insert(column, histogram);
    }

    // =========================================================================
    // Leaves
    // =========================================================================

    fn filter_leaf(&self, histogram: &Histogram, leaf: &Predicate) -> (Histogram, f64) {
        match leaf {
            Predicate::Point { cmp, point, .. } => histogram.make_filter_normalized(*cmp, point, &self.ctx),
            Predicate::Like { .. } => histogram.make_pattern_filter(&self.ctx),
            Predicate::Unsupported { scale_factor, .. } => histogram.make_unsupported_filter(*scale_factor),
            Predicate::Conjunction { .. } | Predicate::Disjunction { .. } => {
                unreachable!("boolean predicates are not leaves")
            }
        }
    }
}

/// Children of a conjunction with nested conjunctions inlined
///
/// A predicate that is not a conjunction is a conjunction of itself.
fn flatten_conjunction(predicate: &Predicate) -> Vec<&Predicate> {
    fn walk<'p>(predicate: &'p Predicate, out: &mut Vec<&'p Predicate>) {
        match predicate {
            Predicate::Conjunction { children, .. } => {
                for child in children {
                    walk(child, out);
                }
            }
            other => out.push(other),
        }
    }
    let mut out = Vec::new();
    walk(predicate, &mut out);
    out
}

fn sort_by_column(children: &mut [&Predicate]) {
    children.sort_by_key(|child| {
        let column = child.column();
        (column.is_none(), column)
    });
}

fn leaf_column(leaf: &Predicate) -> ColumnId {
    match leaf.column() {
        Some(column) => column,
        None => panic!("predicate {} restricts no column", leaf),
    }
}

fn histogram_of(histograms: &HistogramMap, column: ColumnId) -> &Histogram {
    match histograms.get(&column) {
        Some(histogram) => histogram,
        None => panic!("predicate references column #{} which has no statistics", column),
    }
}

/// Columns whose histograms a disjunction must leave alone
///
/// A single-column disjunction may reshape its column. Otherwise a column is
/// left alone when some alternative does not reference it.
fn non_updatable_columns(predicate: &Predicate) -> FxHashSet<ColumnId> {
    let mut non_updatable = FxHashSet::default();
    if predicate.column().is_some() {
        return non_updatable;
    }

    let used = predicate.used_columns();
    for child in predicate.children() {
        let child_used = child.used_columns();
        if child_used.len() < used.len() {
            non_updatable.extend(used.iter().filter(|c| !child_used.contains(c)));
        }
    }
    non_updatable
}

/// Merge the histograms of one cross-column alternative into the
/// disjunction result so far
fn merge_after_disjunct(
    non_updatable: &FxHashSet<ColumnId>,
    current: &HistogramMap,
    child: &HistogramMap,
    current_rows: f64,
    child_rows: f64,
    ctx: &EstimationContext,
) -> HistogramMap {
    // An alternative that keeps no rows contributes nothing to merge
    let child_is_empty = child_rows <= EPSILON;
    let mut merged = HistogramMap::default();

    for (column, histogram) in child {
        if non_updatable.contains(column) {
            continue;
        }
        let histogram = if child_is_empty {
            Histogram::undefined()
        } else {
            histogram.clone()
        };
        merged.insert(*column, histogram);
    }

    for (column, histogram) in current {
        if non_updatable.contains(column) {
            continue;
        }
        let combined = match child.get(column) {
            Some(child_histogram) if !child_is_empty => {
                histogram
                    .make_union_normalized(current_rows, child_histogram, child_rows, ctx)
                    .0
            }
            _ => histogram.clone(),
        };
        merged.insert(*column, combined);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuiltinCatalog, CmpType, DataType, Point};
    use crate::statistics::bucket::Bucket;
    use crate::statistics::config::{CardinalityUpperBoundMethod, StatisticsConfig};

    const CAT: BuiltinCatalog = BuiltinCatalog;

    fn uniform(lo: i64, hi: i64, buckets: i64, ndv_per_bucket: f64) -> Histogram {
        let step = (hi - lo) / buckets;
        let freq = 1.0 / buckets as f64;
        Histogram::new(
            (0..buckets)
                .map(|i| {
                    Bucket::new(
                        Point::new(lo + i * step),
                        Point::new(lo + (i + 1) * step),
                        true,
                        false,
                        freq,
                        ndv_per_bucket,
                    )
                })
                .collect(),
        )
    }

    fn two_columns(rows: f64) -> Statistics {
        Statistics::new(rows)
            .with_column(1, DataType::Integer, uniform(0, 100, 10, 10.0))
            .with_column(2, DataType::Integer, uniform(0, 1000, 10, 100.0))
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_single_point_filter() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let stats = two_columns(10_000.0);

        let out = derive_filter(&stats, &Predicate::point(1, CmpType::Lt, 50i64), &ctx);
        assert!(approx(out.rows(), 5000.0));
        assert_eq!(out.predicate_count(), 1);
        assert!(out.histogram(1).unwrap().is_normalized());
        // Column 2 untouched
        assert_eq!(out.histogram(2).unwrap().bucket_count(), 10);
    }

    #[test]
    fn test_upper_bound_method() {
        let stats = two_columns(1000.0).with_upper_bound(1, 50.0);
        let pred = Predicate::point(1, CmpType::Lt, 50i64);

        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let out = derive_filter(&stats, &pred, &ctx);
        assert!(approx(out.rows(), 500.0));
        assert_eq!(out.upper_bound(1), Some(50.0));

        let config = StatisticsConfig::default()
            .with_cardinality_upper_bound_method(CardinalityUpperBoundMethod::Output);
        let ctx = EstimationContext::new(&CAT, &config);
        let out = derive_filter(&stats, &pred, &ctx);
        assert!(approx(out.upper_bound(1).unwrap(), 500.0));
    }

    #[test]
    fn test_same_column_predicates_refilter() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let stats = two_columns(10_000.0);

        // 20 <= c1 < 50 keeps 30% of the rows exactly
        let pred = Predicate::and(vec![
            Predicate::point(1, CmpType::GEq, 20i64),
            Predicate::point(1, CmpType::Lt, 50i64),
        ]);
        let out = derive_filter(&stats, &pred, &ctx);
        assert!(approx(out.rows(), 3000.0));
        assert_eq!(out.predicate_count(), 2);
    }

    #[test]
    fn test_different_columns_are_damped() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let stats = two_columns(10_000.0);

        let pred = Predicate::and(vec![
            Predicate::point(1, CmpType::Lt, 50i64),
            Predicate::point(2, CmpType::Lt, 100i64),
        ]);
        let out = derive_filter(&stats, &pred, &ctx);
        // sf 10 and 2 combine to 10 * 2^0.75
        let expected = 10_000.0 / (10.0 * 2f64.powf(0.75));
        assert!(approx(out.rows(), expected));

        let independent = StatisticsConfig::independent();
        let ctx = EstimationContext::new(&CAT, &independent);
        let out = derive_filter(&stats, &pred, &ctx);
        assert!(approx(out.rows(), 500.0));
    }

    #[test]
    fn test_unsupported_without_column() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let stats = two_columns(1000.0);
        let out = derive_filter(&stats, &Predicate::unsupported(None, 4.0), &ctx);
        assert!(approx(out.rows(), 250.0));
    }

    #[test]
    fn test_like_uses_default_selectivity() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let stats = two_columns(1000.0);
        let out = derive_filter(&stats, &Predicate::like(2), &ctx);
        assert!(approx(out.rows(), 400.0));
        assert_eq!(out.histogram(2).unwrap().bucket_count(), 10);
    }

    #[test]
    fn test_single_column_disjunction() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let stats = two_columns(10_000.0);

        // c1 < 10 OR c1 >= 90: two disjoint tenths
        let pred = Predicate::or(vec![
            Predicate::point(1, CmpType::Lt, 10i64),
            Predicate::point(1, CmpType::GEq, 90i64),
        ]);
        let out = derive_filter(&stats, &pred, &ctx);
        let hist = out.histogram(1).unwrap();
        assert_eq!(hist.bucket_count(), 2);
        // Both tenths survive; the other factor only adds a sliver
        assert!((out.rows() - 2000.0).abs() < 1.0);
    }

    #[test]
    fn test_cross_column_disjunction_keeps_partial_columns() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let stats = two_columns(10_000.0);

        // c2 is only referenced by one alternative
        let pred = Predicate::or(vec![
            Predicate::point(1, CmpType::Lt, 10i64),
            Predicate::and(vec![
                Predicate::point(1, CmpType::GEq, 90i64),
                Predicate::point(2, CmpType::Lt, 100i64),
            ]),
        ]);
        let out = derive_filter(&stats, &pred, &ctx);
        assert_eq!(out.histogram(2).unwrap().bucket_count(), 10);
        assert!(out.rows() < 10_000.0);
        assert!(out.rows() >= 1000.0 - 1e-6);
    }

    #[test]
    fn test_disjunction_nested_in_conjunction() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let stats = two_columns(10_000.0);

        let pred = Predicate::and(vec![
            Predicate::point(2, CmpType::Lt, 500i64),
            Predicate::or(vec![
                Predicate::point(1, CmpType::Eq, 5i64),
                Predicate::point(1, CmpType::Eq, 55i64),
            ]),
        ]);
        let out = derive_filter(&stats, &pred, &ctx);
        assert!(out.rows() < 5000.0);
        assert_eq!(out.histogram(1).unwrap().bucket_count(), 2);
    }

    #[test]
    fn test_empty_input_gets_placeholders() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let stats = two_columns(0.0).with_empty(true);
        let out = derive_filter(&stats, &Predicate::point(1, CmpType::Eq, 5i64), &ctx);
        assert!(out.is_empty());
        assert_eq!(out.rows(), 1.0);
        assert!(out.histogram(1).unwrap().is_empty());
        assert!(out.histogram(2).unwrap().is_empty());
    }

    #[test]
    fn test_cap_ndvs_after_filter() {
        let config = StatisticsConfig::default().with_cap_ndvs_after_filter(true);
        let ctx = EstimationContext::new(&CAT, &config);
        let stats = two_columns(100.0);
        let out = derive_filter(&stats, &Predicate::point(1, CmpType::Lt, 10i64), &ctx);
        assert!(approx(out.rows(), 10.0));
        assert!(out.histogram(2).unwrap().distinct() <= 10.0 + 1e-9);
    }

    #[test]
    #[should_panic(expected = "no statistics")]
    fn test_unknown_column_panics() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let stats = two_columns(100.0);
        derive_filter(&stats, &Predicate::point(9, CmpType::Eq, 1i64), &ctx);
    }

    #[test]
    fn test_non_updatable_columns() {
        let pred = Predicate::or(vec![
            Predicate::point(1, CmpType::Eq, 1i64),
            Predicate::and(vec![
                Predicate::point(1, CmpType::Eq, 2i64),
                Predicate::point(2, CmpType::Eq, 2i64),
            ]),
        ]);
        let columns = non_updatable_columns(&pred);
        assert!(columns.contains(&2));
        assert!(!columns.contains(&1));

        let both = Predicate::or(vec![
            Predicate::and(vec![
                Predicate::point(1, CmpType::Eq, 1i64),
                Predicate::point(2, CmpType::Eq, 1i64),
            ]),
            Predicate::and(vec![
                Predicate::point(1, CmpType::Eq, 2i64),
                Predicate::point(2, CmpType::Eq, 2i64),
            ]),
        ]);
        assert!(non_updatable_columns(&both).is_empty());
    }
}
