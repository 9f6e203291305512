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

//! Relation statistics
//!
//! `Statistics` describes one relation: its estimated row count and, per
//! column, a histogram, an average width and an upper bound on the number
//! of distinct values. Derivations never modify their input; every
//! operator returns a fresh `Statistics`.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::config::{CardinalityUpperBoundMethod, StatisticsConfig};
use super::context::EstimationContext;
use super::histogram::Histogram;
use super::predicate::Predicate;
use crate::core::{CmpType, ColumnId, DataType, Point};
use crate::processor;

/// Column id to histogram map
pub type HistogramMap = FxHashMap<ColumnId, Histogram>;

/// `left <cmp> right` between a column of each join input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPredicate {
    pub left: ColumnId,
    pub right: ColumnId,
    pub cmp: CmpType,
}

impl JoinPredicate {
    pub fn new(left: ColumnId, cmp: CmpType, right: ColumnId) -> Self {
        Self { left, right, cmp }
    }

    /// Equality join `left = right`
    pub fn eq(left: ColumnId, right: ColumnId) -> Self {
        Self::new(left, CmpType::Eq, right)
    }
}

/// Column produced by a projection that is not read from the input
#[derive(Debug, Clone)]
pub struct ComputedColumn {
    pub column: ColumnId,
    pub data_type: DataType,
    /// Set when the expression is a constant
    pub constant: Option<Point>,
}

impl ComputedColumn {
    pub fn new(column: ColumnId, data_type: DataType) -> Self {
        Self {
            column,
            data_type,
            constant: None,
        }
    }

    pub fn constant(column: ColumnId, value: Point) -> Self {
        Self {
            column,
            data_type: value.data_type(),
            constant: Some(value),
        }
    }
}

/// Column mapping of a union-all
///
/// Output column `output[i]` is fed by `left[i]` and `right[i]`.
#[derive(Debug, Clone, Default)]
pub struct UnionAllColumns {
    pub output: Vec<ColumnId>,
    pub left: Vec<ColumnId>,
    pub right: Vec<ColumnId>,
}

impl UnionAllColumns {
    pub fn new(output: Vec<ColumnId>, left: Vec<ColumnId>, right: Vec<ColumnId>) -> Self {
        assert!(
            output.len() == left.len() && output.len() == right.len(),
            "union-all column lists differ in length"
        );
        Self {
            output,
            left,
            right,
        }
    }

    /// Output and inputs share their column ids
    pub fn identity(columns: Vec<ColumnId>) -> Self {
        Self::new(columns.clone(), columns.clone(), columns)
    }
}

/// Estimated statistics of one relation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub(crate) histograms: HistogramMap,
    pub(crate) widths: FxHashMap<ColumnId, f64>,
    pub(crate) column_types: FxHashMap<ColumnId, DataType>,
    pub(crate) rows: f64,
    pub(crate) is_empty: bool,
    pub(crate) predicate_count: usize,
    pub(crate) upper_bounds: FxHashMap<ColumnId, f64>,
}

impl Statistics {
    /// Statistics of a relation with `rows` rows and no columns yet
    pub fn new(rows: f64) -> Self {
        Self {
            histograms: FxHashMap::default(),
            widths: FxHashMap::default(),
            column_types: FxHashMap::default(),
            rows,
            is_empty: false,
            predicate_count: 0,
            upper_bounds: FxHashMap::default(),
        }
    }

    /// Statistics of a relation known to hold no rows
    pub fn empty(columns: &[(ColumnId, DataType)], ctx: &EstimationContext) -> Self {
        let mut stats = Self::new(ctx.min_rows());
        stats.is_empty = true;
        for &(column, data_type) in columns {
            stats = stats.with_column(column, data_type, Histogram::default_for(data_type, true));
        }
        stats
    }

    /// Builder method to add a column
    ///
    /// The width defaults to the type's fixed width when it has one.
    pub fn with_column(mut self, column: ColumnId, data_type: DataType, histogram: Histogram) -> Self {
        self.histograms.insert(column, histogram);
        self.column_types.insert(column, data_type);
        if let Some(width) = data_type.fixed_width() {
            self.widths.entry(column).or_insert(width);
        }
        self
    }

    /// Builder method to set a column's average width in bytes
    pub fn with_width(mut self, column: ColumnId, width: f64) -> Self {
        self.widths.insert(column, width);
        self
    }

    /// Builder method to set a column's distinct-value upper bound
    pub fn with_upper_bound(mut self, column: ColumnId, bound: f64) -> Self {
        self.upper_bounds.insert(column, bound);
        self
    }

    /// Builder method to mark the relation empty
    pub fn with_empty(mut self, is_empty: bool) -> Self {
        self.is_empty = is_empty;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn rows(&self) -> f64 {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Number of filter predicates applied on the way to this relation
    pub fn predicate_count(&self) -> usize {
        self.predicate_count
    }

    pub fn histogram(&self, column: ColumnId) -> Option<&Histogram> {
        self.histograms.get(&column)
    }

    pub fn histograms(&self) -> &HistogramMap {
        &self.histograms
    }

    pub fn width(&self, column: ColumnId) -> Option<f64> {
        self.widths.get(&column).copied()
    }

    pub fn column_type(&self, column: ColumnId) -> Option<DataType> {
        self.column_types.get(&column).copied()
    }

    /// Columns with a histogram, in ascending order
    pub fn columns(&self) -> Vec<ColumnId> {
        let mut columns: Vec<ColumnId> = self.histograms.keys().copied().collect();
        columns.sort_unstable();
        columns
    }

    pub fn upper_bound(&self, column: ColumnId) -> Option<f64> {
        self.upper_bounds.get(&column).copied()
    }

    /// Upper bound on the distinct values of a column
    pub fn upper_bound_ndvs(&self, column: ColumnId, config: &StatisticsConfig) -> f64 {
        self.upper_bound(column)
            .unwrap_or(config.default_distinct_values)
    }

    /// Average width of a row made of the given columns
    pub fn row_width(&self, columns: &[ColumnId], config: &StatisticsConfig) -> f64 {
        columns
            .iter()
            .map(|c| self.width(*c).unwrap_or(config.default_column_width))
            .sum()
    }

    /// Estimated number of distinct values of a column
    ///
    /// Columns without a well-defined histogram use the configured default,
    /// and the estimate never exceeds the row count.
    pub fn distinct(&self, column: ColumnId, config: &StatisticsConfig) -> f64 {
        let ndv = match self.histograms.get(&column) {
            Some(hist) if hist.is_well_defined() && !hist.is_empty() => hist.distinct(),
            _ => config.default_distinct_values,
        };
        ndv.min(self.rows).max(1.0)
    }

    // =========================================================================
    // Derivations
    // =========================================================================

    /// Statistics of the rows that satisfy a predicate
    pub fn filter(&self, predicate: &Predicate, ctx: &EstimationContext) -> Statistics {
        processor::filter::derive_filter(self, predicate, ctx)
    }

    /// Inner join with `other` on a conjunction of join predicates
    pub fn inner_join(&self, other: &Statistics, predicates: &[JoinPredicate], ctx: &EstimationContext) -> Statistics {
        processor::join::derive_inner_join(self, other, predicates, ctx)
    }

    /// Rows of `self` with at least one match in `other`
    pub fn left_semi_join(&self, other: &Statistics, predicates: &[JoinPredicate], ctx: &EstimationContext) -> Statistics {
        processor::join::derive_left_semi_join(self, other, predicates, ctx)
    }

    /// Rows of `self` without a match in `other`
    pub fn left_anti_semi_join(
        &self,
        other: &Statistics,
        predicates: &[JoinPredicate],
        ctx: &EstimationContext,
    ) -> Statistics {
        processor::join::derive_left_anti_semi_join(self, other, predicates, ctx)
    }

    /// Inner join plus the unmatched rows of `self`, padded with NULLs
    pub fn left_outer_join(&self, other: &Statistics, predicates: &[JoinPredicate], ctx: &EstimationContext) -> Statistics {
        processor::join::derive_left_outer_join(self, other, predicates, ctx)
    }

    /// One row per group of the grouping columns
    pub fn group_by(
        &self,
        grouping: &[ColumnId],
        aggregates: &[(ColumnId, DataType)],
        ctx: &EstimationContext,
    ) -> Statistics {
        processor::group_by::derive_group_by(self, grouping, aggregates, ctx)
    }

    /// Concatenation of `self` and `other`
    pub fn union_all(&self, other: &Statistics, columns: &UnionAllColumns, ctx: &EstimationContext) -> Statistics {
        processor::union_all::derive_union_all(self, other, columns, ctx)
    }

    /// At most `count` rows of the input
    pub fn limit(&self, count: f64, ctx: &EstimationContext) -> Statistics {
        let mut stats = self.clone();
        stats.rows = count.min(self.rows).max(ctx.min_rows());
        if self.is_empty {
            stats.histograms = self
                .histograms
                .keys()
                .map(|&column| (column, Histogram::new(Vec::new())))
                .collect();
        }
        stats.upper_bounds = derive_upper_bounds(
            &self.upper_bounds,
            stats.rows,
            CardinalityUpperBoundMethod::Min,
        );
        stats
    }

    /// Input rows multiplied by `factor`, never below the row floor
    pub fn scale(&self, factor: f64, ctx: &EstimationContext) -> Statistics {
        let mut stats = self.clone();
        stats.rows = (self.rows * factor).max(ctx.min_rows());
        stats.upper_bounds = derive_upper_bounds(
            &self.upper_bounds,
            stats.rows,
            CardinalityUpperBoundMethod::Min,
        );
        stats
    }

    /// Keep `columns` and add histograms for computed columns
    ///
    /// A constant becomes a single-value histogram. Other computed columns
    /// get the default histogram of their type.
    pub fn project(&self, columns: &[ColumnId], computed: &[ComputedColumn], ctx: &EstimationContext) -> Statistics {
        let mut stats = Statistics::new(self.rows);
        stats.is_empty = self.is_empty;
        stats.predicate_count = self.predicate_count;

        for &column in columns {
            let histogram = self
                .histograms
                .get(&column)
                .cloned()
                .unwrap_or_else(Histogram::undefined);
            let data_type = self.column_type(column).unwrap_or_default();
            stats = stats.with_column(column, data_type, histogram);
            if let Some(width) = self.width(column) {
                stats.widths.insert(column, width);
            }
        }

        for computed_column in computed {
            let histogram = match &computed_column.constant {
                Some(point) if point.is_null() => {
                    Histogram::with_residuals(Vec::new(), true, 1.0, 0.0, 0.0)
                }
                Some(point) => Histogram::new(vec![super::bucket::Bucket::singleton(point.clone())]),
                None => Histogram::default_for(computed_column.data_type, self.is_empty),
            };
            stats = stats.with_column(computed_column.column, computed_column.data_type, histogram);
            stats
                .widths
                .entry(computed_column.column)
                .or_insert(ctx.config.default_column_width);
        }

        stats.upper_bounds = derive_upper_bounds(
            &self.upper_bounds,
            stats.rows,
            ctx.config.cardinality_upper_bound_method,
        );
        stats.upper_bounds.retain(|column, _| stats.histograms.contains_key(column));
        for column in columns.iter().copied().chain(computed.iter().map(|c| c.column)) {
            stats.upper_bounds.entry(column).or_insert(stats.rows);
        }
        stats
    }

    /// Copy with every histogram's distinct counts capped at `rows`
    pub fn cap_ndvs(&self, rows: f64) -> Statistics {
        let mut stats = self.clone();
        cap_histogram_ndvs(&mut stats.histograms, rows);
        stats
    }
}

/// Cap the distinct counts of every histogram in the map at `rows`
pub(crate) fn cap_histogram_ndvs(histograms: &mut HistogramMap, rows: f64) {
    for histogram in histograms.values_mut() {
        *histogram = histogram.cap_ndvs(rows);
    }
}

/// Upper bounds of the output columns given the input bounds
pub(crate) fn derive_upper_bounds(
    input: &FxHashMap<ColumnId, f64>,
    output_rows: f64,
    method: CardinalityUpperBoundMethod,
) -> FxHashMap<ColumnId, f64> {
    input
        .iter()
        .map(|(&column, &bound)| {
            let derived = match method {
                CardinalityUpperBoundMethod::Min => bound.min(output_rows),
                CardinalityUpperBoundMethod::Output => output_rows,
            };
            (column, derived)
        })
        .collect()
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Statistics: rows {:.2}, predicates {}{}",
            self.rows,
            self.predicate_count,
            if self.is_empty { ", empty" } else { "" }
        )?;
        for column in self.columns() {
            if let Some(histogram) = self.histograms.get(&column) {
                writeln!(f, "column #{}:", column)?;
                writeln!(f, "{}", histogram)?;
            }
        }
        Ok(())
    }
}
