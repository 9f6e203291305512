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

//! Union-all derivation

use rustc_hash::FxHashMap;

use crate::core::{ColumnId, DataType};
use crate::statistics::config::CardinalityUpperBoundMethod;
use crate::statistics::context::EstimationContext;
use crate::statistics::histogram::Histogram;
use crate::statistics::stats::{derive_upper_bounds, HistogramMap, Statistics, UnionAllColumns};

/// Statistics of the concatenation of `left` and `right`
///
/// Output column `columns.output[i]` takes its type and width from
/// `columns.left[i]`. Its histogram is the row-weighted union of both input
/// histograms, or the type's default when neither side knows anything.
///
/// # Panics
///
/// Panics if an input column of a non-empty union has no histogram.
pub fn derive_union_all(
    left: &Statistics,
    right: &Statistics,
    columns: &UnionAllColumns,
    ctx: &EstimationContext,
) -> Statistics {
    let is_empty = left.is_empty() && right.is_empty();
    let mut histograms = HistogramMap::default();
    let mut widths = FxHashMap::default();
    let mut column_types = FxHashMap::default();

    let triples = columns
        .output
        .iter()
        .zip(&columns.left)
        .zip(&columns.right)
        .map(|((&output, &l), &r)| (output, l, r));

    for (output, left_column, right_column) in triples {
        let data_type = left.column_type(left_column).unwrap_or(DataType::Null);
        column_types.insert(output, data_type);
        widths.insert(
            output,
            left.width(left_column)
                .unwrap_or(ctx.config.default_column_width),
        );

        let histogram = if is_empty {
            Histogram::default_for(data_type, true)
        } else {
            let left_histogram = input_histogram(left, left_column, "left");
            let right_histogram = input_histogram(right, right_column, "right");
            if left_histogram.is_well_defined() || right_histogram.is_well_defined() {
                left_histogram.make_union_all_normalized(left.rows(), right_histogram, right.rows(), ctx)
            } else {
                Histogram::default_for(data_type, false)
            }
        };
        histograms.insert(output, histogram);
    }

    let rows = if is_empty {
        ctx.min_rows()
    } else {
        left.rows() + right.rows()
    };

    tracing::debug!(
        left_rows = left.rows(),
        right_rows = right.rows(),
        rows,
        columns = columns.output.len(),
        empty = is_empty,
        "union-all statistics derived"
    );

    // Output bounds only depend on the output row count
    let bounds: FxHashMap<ColumnId, f64> = columns
        .output
        .iter()
        .zip(&columns.left)
        .map(|(&output, &l)| (output, left.upper_bound(l).unwrap_or(rows)))
        .collect();

    Statistics {
        histograms,
        widths,
        column_types,
        rows,
        is_empty,
        predicate_count: 0,
        upper_bounds: derive_upper_bounds(&bounds, rows, CardinalityUpperBoundMethod::Output),
    }
}

fn input_histogram<'s>(stats: &'s Statistics, column: ColumnId, side: &str) -> &'s Histogram {
    match stats.histogram(column) {
        Some(histogram) => histogram,
        None => panic!("union-all column #{} has no statistics on the {} side", column, side),
    }
}
