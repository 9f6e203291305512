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

//! Join derivation
//!
//! Every join predicate produces a scale factor against the cartesian
//! product of its inputs. Equality predicates also intersect the bucket
//! lists of their columns, so the output histograms only cover values found
//! on both sides. The per-predicate factors are combined with the join
//! damping, which by default trusts the most selective predicate and all but
//! ignores the others.
//!
//! ## Output rows
//!
//! | Join            | Rows                          |
//! |-----------------|-------------------------------|
//! | inner           | `max(min_rows, r1 * r2 / sf)` |
//! | left semi       | `max(1, min(r1, r1 * r2 / sf))` |
//! | left anti-semi  | `max(1, r1 / sf)`             |
//!
//! A left outer join is the union of its inner join and its anti-semi join,
//! with the inner side of the unmatched rows padded with NULLs.

use std::fmt;

use rustc_hash::FxHashSet;

use crate::core::ColumnId;
use crate::statistics::config::CardinalityUpperBoundMethod;
use crate::statistics::context::EstimationContext;
use crate::statistics::histogram::Histogram;
use crate::statistics::scale_factor::{ScaleFactorCombiner, ScaleFactors};
use crate::statistics::stats::{derive_upper_bounds, HistogramMap, JoinPredicate, Statistics};

use super::group_by::derive_group_by;

/// Join flavors with their own row-count rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftSemi,
    LeftAntiSemi,
}

impl JoinKind {
    /// Whether only the outer side's columns reach the output
    pub fn is_semi(self) -> bool {
        matches!(self, JoinKind::LeftSemi | JoinKind::LeftAntiSemi)
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "INNER"),
            JoinKind::LeftSemi => write!(f, "LEFT SEMI"),
            JoinKind::LeftAntiSemi => write!(f, "LEFT ANTI SEMI"),
        }
    }
}

/// Statistics of `outer ⋈ inner`
pub fn derive_inner_join(
    outer: &Statistics,
    inner: &Statistics,
    predicates: &[JoinPredicate],
    ctx: &EstimationContext,
) -> Statistics {
    JoinProcessor::new(ctx).derive(outer, inner, predicates, JoinKind::Inner)
}

/// Statistics of the outer rows with at least one match
///
/// The inner side is first grouped by its join columns: a semi join only
/// cares whether a value exists, not how often.
pub fn derive_left_semi_join(
    outer: &Statistics,
    inner: &Statistics,
    predicates: &[JoinPredicate],
    ctx: &EstimationContext,
) -> Statistics {
    let mut inner_columns: Vec<ColumnId> = predicates.iter().map(|p| p.right).collect();
    inner_columns.sort_unstable();
    inner_columns.dedup();
    let grouped = derive_group_by(inner, &inner_columns, &[], ctx);
    JoinProcessor::new(ctx).derive(outer, &grouped, predicates, JoinKind::LeftSemi)
}

/// Statistics of the outer rows without a match
pub fn derive_left_anti_semi_join(
    outer: &Statistics,
    inner: &Statistics,
    predicates: &[JoinPredicate],
    ctx: &EstimationContext,
) -> Statistics {
    JoinProcessor::new(ctx).derive(outer, inner, predicates, JoinKind::LeftAntiSemi)
}

/// Statistics of a left outer join
pub fn derive_left_outer_join(
    outer: &Statistics,
    inner: &Statistics,
    predicates: &[JoinPredicate],
    ctx: &EstimationContext,
) -> Statistics {
    let processor = JoinProcessor::new(ctx);
    let inner_join = processor.derive(outer, inner, predicates, JoinKind::Inner);
    let anti_join = processor.derive(outer, inner, predicates, JoinKind::LeftAntiSemi);

    let matched_rows = inner_join.rows();
    let unmatched_rows = if anti_join.is_empty() { 0.0 } else { anti_join.rows() };

    let mut histograms = HistogramMap::default();
    for (&column, outer_histogram) in outer.histograms() {
        let matched = inner_join.histogram(column).unwrap_or(outer_histogram);
        let histogram = match anti_join.histogram(column) {
            Some(unmatched) if unmatched.is_well_defined() && !unmatched.is_empty() => {
                unmatched.make_union_all_normalized(unmatched_rows, matched, matched_rows, ctx)
            }
            _ => matched.clone(),
        };
        histograms.insert(column, histogram);
    }

    // Unmatched outer rows see NULL in every inner column
    let nulls = Histogram::with_residuals(Vec::new(), true, 1.0, 0.0, 0.0);
    for (&column, inner_histogram) in inner.histograms() {
        let matched = inner_join.histogram(column).unwrap_or(inner_histogram);
        let histogram = if matched.is_well_defined() && unmatched_rows > 0.0 {
            matched.make_union_all_normalized(matched_rows, &nulls, unmatched_rows, ctx)
        } else {
            matched.clone()
        };
        histograms.insert(column, histogram);
    }

    let rows = outer.rows().max(matched_rows + unmatched_rows);
    tracing::debug!(
        matched_rows,
        unmatched_rows,
        rows,
        "left outer join statistics derived"
    );

    let mut upper_bounds = derive_upper_bounds(&outer.upper_bounds, rows, CardinalityUpperBoundMethod::Min);
    upper_bounds.extend(derive_upper_bounds(&inner.upper_bounds, rows, CardinalityUpperBoundMethod::Min));

    Statistics {
        histograms,
        widths: inner_join.widths.clone(),
        column_types: inner_join.column_types.clone(),
        rows,
        is_empty: outer.is_empty(),
        predicate_count: inner_join.predicate_count(),
        upper_bounds,
    }
}

/// Derives join statistics for one join kind
pub struct JoinProcessor<'a> {
    ctx: EstimationContext<'a>,
    combiner: ScaleFactorCombiner<'a>,
}

impl<'a> JoinProcessor<'a> {
    pub fn new(ctx: &EstimationContext<'a>) -> Self {
        Self {
            ctx: *ctx,
            combiner: ScaleFactorCombiner::new(ctx.config),
        }
    }

    /// Derive the output statistics of a join
    ///
    /// # Panics
    ///
    /// Panics if a join predicate names a column missing from its side.
    pub fn derive(
        &self,
        outer: &Statistics,
        inner: &Statistics,
        predicates: &[JoinPredicate],
        kind: JoinKind,
    ) -> Statistics {
        let semi = kind.is_semi();
        let outer_rows = outer.rows();
        let inner_rows = inner.rows();

        let mut join_columns: FxHashSet<ColumnId> = FxHashSet::default();
        for predicate in predicates {
            join_columns.insert(predicate.left);
            if !semi {
                join_columns.insert(predicate.right);
            }
        }

        let mut histograms = HistogramMap::default();
        copy_histograms(outer.histograms(), &join_columns, &mut histograms);
        if !semi {
            copy_histograms(inner.histograms(), &join_columns, &mut histograms);
        }

        let mut scale_factors = ScaleFactors::new();
        let mut empty_output = false;

        for predicate in predicates {
            let outer_histogram = join_histogram(outer, predicate.left, "outer");
            let inner_histogram = join_histogram(inner, predicate.right, "inner");

            let (outcome, scale_factor) = if kind == JoinKind::LeftAntiSemi {
                self.anti_join_predicate(outer, inner, outer_histogram, inner_histogram, predicate)
            } else {
                self.join_predicate(outer, inner, outer_histogram, inner_histogram, predicate)
            };

            tracing::trace!(
                kind = %kind,
                left = predicate.left,
                right = predicate.right,
                cmp = %predicate.cmp,
                scale_factor,
                "join predicate"
            );
            scale_factors.push(scale_factor);

            let collapsed = matches!(&outcome, JoinOutcome::Joined(joined) if joined.is_empty())
                && !outer_histogram.is_empty()
                && !inner_histogram.is_empty();
            let empty_input = match kind {
                JoinKind::LeftAntiSemi => outer.is_empty(),
                _ => outer.is_empty() || inner.is_empty(),
            };
            empty_output = empty_output || empty_input || collapsed;

            let (left, right) = outcome.split(outer_histogram, inner_histogram);
            histograms.insert(predicate.left, left);
            if !semi {
                // A column joined twice keeps its first histogram
                histograms.entry(predicate.right).or_insert(right);
            }
        }

        let scale_factor = self.combiner.join(&scale_factors);
        let cartesian = outer_rows * inner_rows;
        let rows = if empty_output {
            self.ctx.min_rows()
        } else {
            match kind {
                JoinKind::Inner => self.ctx.min_rows().max(cartesian / scale_factor),
                JoinKind::LeftSemi => outer_rows.min(cartesian / scale_factor).max(1.0),
                JoinKind::LeftAntiSemi => (outer_rows / scale_factor).max(1.0),
            }
        };

        tracing::debug!(
            kind = %kind,
            outer_rows,
            inner_rows,
            rows,
            scale_factor,
            empty = empty_output,
            "join statistics derived"
        );

        let mut widths = outer.widths.clone();
        let mut column_types = outer.column_types.clone();
        let mut upper_bounds = derive_upper_bounds(&outer.upper_bounds, rows, CardinalityUpperBoundMethod::Min);
        let mut predicate_count = outer.predicate_count();
        if !semi {
            widths.extend(inner.widths.iter().map(|(c, w)| (*c, *w)));
            column_types.extend(inner.column_types.iter().map(|(c, t)| (*c, *t)));
            upper_bounds.extend(derive_upper_bounds(&inner.upper_bounds, rows, CardinalityUpperBoundMethod::Min));
            predicate_count += inner.predicate_count();
        }

        Statistics {
            histograms,
            widths,
            column_types,
            rows,
            is_empty: empty_output,
            predicate_count,
            upper_bounds,
        }
    }

    /// Histograms and scale factor of one inner or semi join predicate
    fn join_predicate(
        &self,
        outer: &Statistics,
        inner: &Statistics,
        outer_histogram: &Histogram,
        inner_histogram: &Histogram,
        predicate: &JoinPredicate,
    ) -> (JoinOutcome, f64) {
        let (outer_rows, inner_rows) = (outer.rows(), inner.rows());

        if outer.is_empty() || inner.is_empty() {
            return (JoinOutcome::Empty, (outer_rows * inner_rows).max(1.0));
        }

        if !outer_histogram.is_well_defined()
            || !inner_histogram.is_well_defined()
            || outer_histogram.is_empty()
            || inner_histogram.is_empty()
        {
            tracing::trace!(
                left = predicate.left,
                right = predicate.right,
                "join histogram missing, assuming a key join"
            );
            return (JoinOutcome::Unchanged, outer_rows.min(inner_rows).max(1.0));
        }

        let (joined, scale_factor) = outer_histogram.make_join_normalized(
            predicate.cmp,
            outer_rows,
            inner_histogram,
            inner_rows,
            &self.ctx,
        );
        if Histogram::is_op_supported_for_join(predicate.cmp) {
            (JoinOutcome::Joined(joined), scale_factor)
        } else {
            (JoinOutcome::Unchanged, scale_factor)
        }
    }

    /// Histogram and scale factor of one anti-semi join predicate
    fn anti_join_predicate(
        &self,
        outer: &Statistics,
        inner: &Statistics,
        outer_histogram: &Histogram,
        inner_histogram: &Histogram,
        predicate: &JoinPredicate,
    ) -> (JoinOutcome, f64) {
        if outer.is_empty() {
            return (JoinOutcome::Unchanged, 1.0);
        }
        if inner.is_empty() {
            // Nothing to match against, every outer row survives
            return (JoinOutcome::Unchanged, 1.0);
        }

        if outer_histogram.is_well_defined() && inner_histogram.is_well_defined() {
            let (unmatched, mut scale_factor) =
                outer_histogram.make_lasj_normalized(predicate.cmp, outer.rows(), inner_histogram, &self.ctx);
            if unmatched.is_empty() {
                scale_factor = outer.rows().max(1.0);
            }
            return (JoinOutcome::AntiJoined(unmatched), scale_factor);
        }

        (JoinOutcome::Unchanged, self.ctx.config.default_join_scale_factor)
    }
}

/// What one join predicate does to its columns
enum JoinOutcome {
    /// Both inputs were empty: placeholder histograms
    Empty,
    /// The histograms pass through
    Unchanged,
    /// Both columns share the joined histogram
    Joined(Histogram),
    /// Outer column histogram of the unmatched rows
    AntiJoined(Histogram),
}

impl JoinOutcome {
    /// Output histograms of the outer and inner join columns
    fn split(self, outer: &Histogram, inner: &Histogram) -> (Histogram, Histogram) {
        match self {
            JoinOutcome::Empty => (Histogram::new(Vec::new()), Histogram::new(Vec::new())),
            JoinOutcome::Unchanged => (outer.clone(), inner.clone()),
            JoinOutcome::Joined(joined) => (joined.clone(), joined),
            JoinOutcome::AntiJoined(unmatched) => (unmatched, inner.clone()),
        }
    }
}

fn copy_histograms(from: &HistogramMap, excluded: &FxHashSet<ColumnId>, to: &mut HistogramMap) {
    for (column, histogram) in from {
        if !excluded.contains(column) {
            to.insert(*column, histogram.clone());
        }
    }
}

fn join_histogram<'s>(stats: &'s Statistics, column: ColumnId, side: &str) -> &'s Histogram {
    match stats.histogram(column) {
        Some(histogram) => histogram,
        None => panic!("join column #{} has no statistics on the {} side", column, side),
    }
}
