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

//! Group-by derivation
//!
//! The output has one row per group. Each grouping column's histogram is
//! rebuilt so a bucket's frequency is its share of the distinct values, and
//! the group count combines the distinct counts of the grouping columns with
//! damping. Aggregate outputs carry no distribution information.

use rustc_hash::FxHashMap;

use crate::core::{ColumnId, DataType};
use crate::statistics::context::EstimationContext;
use crate::statistics::histogram::Histogram;
use crate::statistics::scale_factor::{ScaleFactorCombiner, ScaleFactors};
use crate::statistics::stats::{HistogramMap, Statistics};

/// Statistics of `input` grouped by `grouping`, with `aggregates` as the
/// computed output columns
pub fn derive_group_by(
    input: &Statistics,
    grouping: &[ColumnId],
    aggregates: &[(ColumnId, DataType)],
    ctx: &EstimationContext,
) -> Statistics {
    let min_rows = ctx.min_rows();
    let mut histograms = HistogramMap::default();
    let mut widths = FxHashMap::default();
    let mut column_types = FxHashMap::default();

    for &column in grouping {
        let data_type = input.column_type(column).unwrap_or_default();
        column_types.insert(column, data_type);
        if let Some(width) = input.width(column) {
            widths.insert(column, width);
        }
    }
    for &(column, data_type) in aggregates {
        column_types.insert(column, data_type);
        widths.insert(
            column,
            data_type.fixed_width().unwrap_or(ctx.config.default_column_width),
        );
        histograms.insert(column, Histogram::default_for(data_type, input.is_empty()));
    }

    let rows = if input.is_empty() {
        for &column in grouping {
            histograms.insert(column, Histogram::default_for(column_types[&column], true));
        }
        min_rows
    } else {
        let mut ndvs = ScaleFactors::new();
        for &column in grouping {
            let (histogram, groups) = match input.histogram(column) {
                Some(histogram) => histogram.make_group_by_normalized(ctx),
                None => {
                    tracing::trace!(column, "grouping column has no histogram");
                    let groups = input.upper_bound_ndvs(column, ctx.config).min(input.rows());
                    (Histogram::default_for(column_types[&column], false), groups)
                }
            };
            ndvs.push(groups);
            histograms.insert(column, histogram);
        }

        let groups = ScaleFactorCombiner::new(ctx.config).group_by_distinct(&ndvs);
        groups.max(min_rows).min(input.rows().max(min_rows))
    };

    tracing::debug!(
        input_rows = input.rows(),
        rows,
        grouping = grouping.len(),
        aggregates = aggregates.len(),
        "group-by statistics derived"
    );

    let mut upper_bounds = FxHashMap::default();
    for &column in grouping {
        let bound = input.upper_bound(column).unwrap_or(rows).min(rows);
        upper_bounds.insert(column, bound);
    }
    for &(column, _) in aggregates {
        upper_bounds.insert(column, rows);
    }

    Statistics {
        histograms,
        widths,
        column_types,
        rows,
        is_empty: input.is_empty(),
        predicate_count: input.predicate_count(),
        upper_bounds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuiltinCatalog, Point};
    use crate::statistics::bucket::Bucket;
    use crate::statistics::config::StatisticsConfig;

    const CAT: BuiltinCatalog = BuiltinCatalog;

    fn range(lo: i64, hi: i64, ndv: f64) -> Histogram {
        Histogram::new(vec![Bucket::new(
            Point::new(lo),
            Point::new(hi),
            true,
            false,
            1.0,
            ndv,
        )])
    }

    fn sales() -> Statistics {
        Statistics::new(100_000.0)
            .with_column(1, DataType::Integer, range(0, 50, 50.0))
            .with_column(2, DataType::Integer, range(0, 20, 20.0))
            .with_column(3, DataType::Float, range(0, 1000, 1000.0))
    }

    #[test]
    fn test_single_grouping_column() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let out = derive_group_by(&sales(), &[1], &[(10, DataType::Float)], &ctx);
        assert_eq!(out.rows(), 50.0);
        assert_eq!(out.columns(), vec![1, 10]);
        assert!(!out.histogram(10).unwrap().is_well_defined());
        assert_eq!(out.width(10), Some(8.0));
        // The rebuilt histogram describes groups, not rows
        let hist = out.histogram(1).unwrap();
        assert!((hist.buckets()[0].frequency() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_multiple_grouping_columns_are_damped() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let out = derive_group_by(&sales(), &[1, 2], &[], &ctx);
        // 50 * (20 * 0.75)
        assert!((out.rows() - 750.0).abs() < 1e-9);
    }

    #[test]
    fn test_groups_bounded_by_input_rows() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let small = Statistics::new(10.0).with_column(3, DataType::Float, range(0, 1000, 1000.0));
        let out = derive_group_by(&small, &[3], &[], &ctx);
        assert_eq!(out.rows(), 10.0);
        assert_eq!(out.upper_bound(3), Some(10.0));
    }

    #[test]
    fn test_undefined_histogram_uses_default_groups() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let stats = Statistics::new(1000.0).with_column(1, DataType::Integer, Histogram::undefined());
        let out = derive_group_by(&stats, &[1], &[], &ctx);
        assert!((out.rows() - 2.5).abs() < 1e-9);
        assert!(!out.histogram(1).unwrap().is_well_defined());
    }

    #[test]
    fn test_empty_input() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let empty = sales().with_empty(true);
        let out = derive_group_by(&empty, &[1], &[(10, DataType::Boolean)], &ctx);
        assert!(out.is_empty());
        assert_eq!(out.rows(), 1.0);
        // No three-value default for a boolean of an empty relation
        assert!(!out.histogram(10).unwrap().is_well_defined());
    }

    #[test]
    fn test_global_aggregate_is_one_row() {
        let config = StatisticsConfig::default();
        let ctx = EstimationContext::new(&CAT, &config);
        let out = derive_group_by(&sales(), &[], &[(10, DataType::Integer)], &ctx);
        assert_eq!(out.rows(), 1.0);
    }
}
