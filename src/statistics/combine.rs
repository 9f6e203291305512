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

//! Binary histogram operations
//!
//! Union-all, disjunctive union, joins, anti-semi joins and grouping. Every
//! operation takes the row counts of its inputs so that frequencies from
//! relations of different sizes can be weighed against each other.

use std::cmp::Ordering;

use super::bucket::Bucket;
use super::config::{EPSILON, MIN_DISTINCT};
use super::context::EstimationContext;
use super::histogram::Histogram;
use crate::core::{CmpType, TypeCatalog};

impl Histogram {
    // =========================================================================
    // Unions
    // =========================================================================

    /// Histogram of the concatenation of two relations, normalized
    pub fn make_union_all_normalized(
        &self,
        rows: f64,
        other: &Histogram,
        rows_other: f64,
        ctx: &EstimationContext,
    ) -> Histogram {
        let total = (rows + rows_other).max(EPSILON);
        let buckets = self
            .merge_bucket_lists(rows, other, rows_other, true, ctx.catalog)
            .into_iter()
            .map(|(bucket, bucket_rows)| bucket.with_frequency((bucket_rows / total).min(1.0)))
            .collect();

        let null_freq = (self.null_freq() * rows + other.null_freq() * rows_other) / total;
        let freq_remain = (self.freq_remain() * rows + other.freq_remain() * rows_other) / total;
        let distinct_remain = self.distinct_remain().max(other.distinct_remain());

        let mut result =
            Histogram::with_residuals(buckets, true, null_freq, distinct_remain, freq_remain);
        result.normalize();
        result
    }

    /// Histogram of the rows matching either of two alternatives
    ///
    /// Both inputs describe subsets of the same relation, so overlapping
    /// ranges keep the larger of the two row counts rather than their sum.
    /// Returns the normalized histogram and the estimated output rows.
    pub fn make_union_normalized(
        &self,
        rows: f64,
        other: &Histogram,
        rows_other: f64,
        ctx: &EstimationContext,
    ) -> (Histogram, f64) {
        let pieces = self.merge_bucket_lists(rows, other, rows_other, false, ctx.catalog);

        let null_rows = (self.null_freq() * rows).max(other.null_freq() * rows_other);
        let freq_remain_rows = (self.freq_remain() * rows).max(other.freq_remain() * rows_other);
        let bucket_rows: f64 = pieces.iter().map(|(_, r)| r).sum();
        let output_rows = ctx.min_rows().max(bucket_rows + null_rows + freq_remain_rows);

        let buckets = pieces
            .into_iter()
            .map(|(bucket, r)| bucket.with_frequency((r / output_rows).min(1.0)))
            .collect();
        let result = Histogram::with_residuals(
            buckets,
            true,
            null_rows / output_rows,
            self.distinct_remain().max(other.distinct_remain()),
            freq_remain_rows / output_rows,
        );

        tracing::trace!(
            rows,
            rows_other,
            output_rows,
            buckets = result.bucket_count(),
            "union of disjunction alternatives"
        );
        (result, output_rows)
    }

    /// Walk both bucket lists in order, merging overlapping buckets
    ///
    /// Returns every output bucket with the number of rows it stands for.
    /// Merged buckets count rows against `rows + rows_other` for union-all
    /// and against the larger input otherwise.
    fn merge_bucket_lists(
        &self,
        rows: f64,
        other: &Histogram,
        rows_other: f64,
        union_all: bool,
        cat: &dyn TypeCatalog,
    ) -> Vec<(Bucket, f64)> {
        let merged_rows = if union_all {
            rows + rows_other
        } else {
            rows.max(rows_other)
        };
        let mut out = Vec::with_capacity(self.bucket_count() + other.bucket_count());

        let mut iter1 = self.buckets().iter().cloned();
        let mut iter2 = other.buckets().iter().cloned();
        let mut cur1 = iter1.next();
        let mut cur2 = iter2.next();

        loop {
            match (cur1.take(), cur2.take()) {
                (Some(b1), Some(b2)) => {
                    if b1.is_before(&b2, cat) {
                        let r = b1.frequency() * rows;
                        out.push((b1, r));
                        cur1 = iter1.next();
                        cur2 = Some(b2);
                    } else if b2.is_before(&b1, cat) {
                        let r = b2.frequency() * rows_other;
                        out.push((b2, r));
                        cur1 = Some(b1);
                        cur2 = iter2.next();
                    } else {
                        let merge = b1.merge(&b2, rows, rows_other, union_all, cat);
                        let r = merge.merged.frequency() * merged_rows;
                        out.push((merge.merged, r));
                        cur1 = merge.residual_self.or_else(|| iter1.next());
                        cur2 = merge.residual_other.or_else(|| iter2.next());
                    }
                }
                (rest1, rest2) => {
                    for bucket in rest1.into_iter().chain(iter1.by_ref()) {
                        let r = bucket.frequency() * rows;
                        out.push((bucket, r));
                    }
                    for bucket in rest2.into_iter().chain(iter2.by_ref()) {
                        let r = bucket.frequency() * rows_other;
                        out.push((bucket, r));
                    }
                    break;
                }
            }
        }
        out
    }

    // =========================================================================
    // Joins
    // =========================================================================

    /// Whether a join with this comparison reshapes the histograms
    pub fn is_op_supported_for_join(cmp: CmpType) -> bool {
        cmp.is_equality()
    }

    /// Join histogram of `self ⋈ other` and the scale factor of the join
    ///
    /// Only equality and IS NOT DISTINCT FROM produce a histogram. Every
    /// other comparison returns an undefined histogram with an estimated
    /// scale factor.
    pub fn make_join_normalized(
        &self,
        cmp: CmpType,
        rows: f64,
        other: &Histogram,
        rows_other: f64,
        ctx: &EstimationContext,
    ) -> (Histogram, f64) {
        if !Self::is_op_supported_for_join(cmp) {
            let scale_factor = if cmp.is_inequality() {
                self.inequality_join_scale_factor(rows, other, rows_other, ctx)
            } else {
                ctx.config.default_join_scale_factor
            };
            return (Histogram::undefined(), scale_factor);
        }

        if !self.is_well_defined() || !other.is_well_defined() {
            return (Histogram::undefined(), rows.min(rows_other).max(1.0));
        }

        let mut joined = self.make_join(cmp, other, ctx.catalog);
        joined.normalize();

        // Equi-join selectivity is one over the larger distinct count
        let cartesian = rows * rows_other;
        let mut scale_factor = self
            .distinct()
            .max(MIN_DISTINCT)
            .max(other.distinct().max(MIN_DISTINCT));
        if joined.is_empty() {
            scale_factor = cartesian;
        }

        if cmp == CmpType::INDF {
            // NULLs on both sides match each other
            let expected_eq = cartesian / scale_factor;
            let null_pairs = rows * self.null_freq() * rows_other * other.null_freq();
            let expected = expected_eq + null_pairs;
            if expected > 0.0 {
                scale_factor = cartesian / expected;
            }
        }

        let scale_factor = scale_factor.min(cartesian).max(1.0);
        (joined, scale_factor)
    }

    /// Scale factor of `<>` derived from the equality join on the same columns
    fn inequality_join_scale_factor(
        &self,
        rows: f64,
        other: &Histogram,
        rows_other: f64,
        ctx: &EstimationContext,
    ) -> f64 {
        let (_, eq_scale_factor) = self.make_join_normalized(CmpType::Eq, rows, other, rows_other, ctx);
        let selectivity = 1.0 - 1.0 / eq_scale_factor.max(1.0);
        if selectivity > EPSILON {
            1.0 / selectivity
        } else {
            rows * rows_other
        }
    }

    /// Join histogram before normalization
    fn make_join(&self, cmp: CmpType, other: &Histogram, cat: &dyn TypeCatalog) -> Histogram {
        debug_assert!(cmp.is_equality());
        let joined = self.join_equality(other, cat);
        if cmp != CmpType::INDF {
            return joined;
        }

        let max_distinct = self.distinct().max(other.distinct());
        let null_freq = if max_distinct > 0.0 {
            self.null_freq() * other.null_freq() / max_distinct
        } else {
            0.0
        };
        let (distinct_remain, freq_remain) = (joined.distinct_remain(), joined.freq_remain());
        joined.with_residual_mass(null_freq, distinct_remain, freq_remain)
    }

    fn join_equality(&self, other: &Histogram, cat: &dyn TypeCatalog) -> Histogram {
        let buckets1 = self.buckets();
        let buckets2 = other.buckets();
        let mut joined = Vec::new();
        let mut join_freq1 = 0.0;
        let mut join_freq2 = 0.0;

        let (mut i1, mut i2) = (0, 0);
        while i1 < buckets1.len() && i2 < buckets2.len() {
            let b1 = &buckets1[i1];
            let b2 = &buckets2[i2];
            if b1.intersects(b2, cat) {
                let (bucket, freq1, freq2) = b1.intersect(b2, cat);
                joined.push(bucket);
                join_freq1 += freq1;
                join_freq2 += freq2;
                match Bucket::compare_upper_bounds(b1, b2, cat) {
                    Ordering::Equal => {
                        i1 += 1;
                        i2 += 1;
                    }
                    Ordering::Less => i1 += 1,
                    Ordering::Greater => i2 += 1,
                }
            } else if b1.is_before(b2, cat) {
                i1 += 1;
            } else {
                i2 += 1;
            }
        }

        let (distinct_remain, freq_remain) =
            join_remaining_mass(self, other, &joined, join_freq1, join_freq2);
        Histogram::new(joined).with_residual_mass(0.0, distinct_remain, freq_remain)
    }

    /// Histogram of the rows of `self` with no match in `other`, and its
    /// scale factor
    pub fn make_lasj_normalized(
        &self,
        cmp: CmpType,
        rows: f64,
        other: &Histogram,
        ctx: &EstimationContext,
    ) -> (Histogram, f64) {
        if !self.is_well_defined() || !other.is_well_defined() {
            return (Histogram::undefined(), 1.0);
        }

        let mut result = self.make_lasj(cmp, other, ctx.catalog);
        let mut scale_factor = result.normalize();
        if !Self::is_op_supported_for_join(cmp) {
            scale_factor = ctx.default_scale_factor();
        }
        (result, scale_factor.min(rows).max(1.0))
    }

    fn make_lasj(&self, cmp: CmpType, other: &Histogram, cat: &dyn TypeCatalog) -> Histogram {
        if !Self::is_op_supported_for_join(cmp) {
            return self.clone();
        }

        let others = other.buckets();
        let mut result = Vec::with_capacity(self.bucket_count());
        let mut own = self.buckets().iter();
        let mut candidate: Option<Bucket> = None;
        let mut i2 = 0;

        loop {
            let current = match candidate.take().or_else(|| own.next().cloned()) {
                Some(bucket) => bucket,
                None => break,
            };
            while i2 < others.len() && others[i2].is_before(&current, cat) {
                i2 += 1;
            }
            if i2 == others.len() || current.is_before(&others[i2], cat) {
                result.push(current);
                continue;
            }

            let (lower, upper) = current.difference(&others[i2], cat);
            result.extend(lower);
            if upper.is_some() {
                // `others[i2]` ends inside the current bucket
                candidate = upper;
                i2 += 1;
            }
        }

        // NULLs only find a partner under IS NOT DISTINCT FROM
        let null_freq = if cmp == CmpType::INDF && other.null_freq() > EPSILON {
            0.0
        } else {
            self.null_freq()
        };
        Histogram::new(result).with_residual_mass(null_freq, self.distinct_remain(), self.freq_remain())
    }

    // =========================================================================
    // Grouping
    // =========================================================================

    /// Histogram of the distinct values of the column and their count
    ///
    /// Each group is one row, so every bucket's frequency becomes its share
    /// of the distinct values.
    pub fn make_group_by_normalized(&self, ctx: &EstimationContext) -> (Histogram, f64) {
        let distinct = self.distinct();
        if !self.is_well_defined() || distinct <= 0.0 {
            return (Histogram::undefined(), ctx.default_scale_factor() * MIN_DISTINCT);
        }

        let cat = ctx.catalog;
        let buckets = self
            .buckets()
            .iter()
            .map(|bucket| {
                Bucket::new(
                    bucket.lower().clone(),
                    bucket.upper().clone(),
                    true,
                    bucket.is_singleton(cat),
                    bucket.distinct() / distinct,
                    bucket.distinct(),
                )
            })
            .collect();

        let null_freq = if self.null_freq() > EPSILON {
            (1.0 / distinct).min(1.0)
        } else {
            0.0
        };
        let freq_remain = if self.distinct_remain() > EPSILON {
            (self.distinct_remain() / distinct).min(1.0)
        } else {
            0.0
        };

        let result = Histogram::with_residuals(
            buckets,
            true,
            null_freq,
            self.distinct_remain(),
            freq_remain,
        );
        let groups = result.distinct();
        (result, groups)
    }
}

/// Remaining distinct count and frequency of an equi-join outside the
/// joined buckets
///
/// Values in either side's remaining part may still find partners in the
/// other side's remaining part or in the buckets that did not join.
fn join_remaining_mass(
    hist1: &Histogram,
    hist2: &Histogram,
    joined: &[Bucket],
    join_freq1: f64,
    join_freq2: f64,
) -> (f64, f64) {
    let has_remain1 = hist1.distinct_remain() > EPSILON;
    let has_remain2 = hist2.distinct_remain() > EPSILON;
    if !has_remain1 && !has_remain2 {
        return (0.0, 0.0);
    }
    let usable1 = has_remain1 || hist1.bucket_count() > 0;
    let usable2 = has_remain2 || hist2.bucket_count() > 0;
    if !(usable1 && usable2) {
        return (0.0, 0.0);
    }

    let join_ndv: f64 = joined.iter().map(Bucket::distinct).sum();
    let join_freq: f64 = joined.iter().map(Bucket::frequency).sum();
    if 1.0 - join_freq <= EPSILON {
        return (0.0, 0.0);
    }

    let non_null1 = hist1.non_null_distinct();
    let non_null2 = hist2.non_null_distinct();
    let distinct_remain = (non_null1.min(non_null2) - join_ndv).max(0.0);

    let non_join_freq1 = (hist1.bucket_frequency() - join_freq1).max(0.0);
    let non_join_freq2 = (hist2.bucket_frequency() - join_freq2).max(0.0);
    let non_join_ndv1 = hist1.bucket_distinct() - join_ndv;
    let non_join_ndv2 = hist2.bucket_distinct() - join_ndv;

    let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };
    let freq_remain = ratio(
        hist1.freq_remain() * hist2.freq_remain(),
        hist1.distinct_remain().max(hist2.distinct_remain()),
    ) + ratio(
        hist1.freq_remain() * non_join_freq2,
        non_null1.max(non_join_ndv2),
    ) + ratio(
        hist2.freq_remain() * non_join_freq1,
        non_null2.max(non_join_ndv1),
    );

    (distinct_remain, freq_remain.min(1.0))
}
