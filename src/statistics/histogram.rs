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

//! Column histograms
//!
//! A histogram is an ordered run of non-overlapping buckets plus the mass
//! that lives outside them: the NULL fraction and a "remaining" part with
//! its own frequency and distinct count for values that were never
//! bucketed. Frequencies are fractions of the relation's rows, so a
//! complete histogram sums to 1.
//!
//! Filters live here. Joins, unions and grouping live in `combine.rs`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::bucket::Bucket;
use super::config::EPSILON;
use super::context::EstimationContext;
use crate::core::{CmpType, DataType, Error, Point, Result, TypeCatalog};

/// Distribution summary of one column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    buckets: Vec<Bucket>,
    /// False when nothing is known about the column
    well_defined: bool,
    null_freq: f64,
    distinct_remain: f64,
    freq_remain: f64,
    /// Set once the distinct counts were capped by a row count
    ndv_scaled: bool,
    col_stats_missing: bool,
}

impl Histogram {
    /// Well-defined histogram without residual mass
    pub fn new(buckets: Vec<Bucket>) -> Self {
        Self::with_residuals(buckets, true, 0.0, 0.0, 0.0)
    }

    /// Histogram with explicit residual mass
    pub fn with_residuals(
        buckets: Vec<Bucket>,
        well_defined: bool,
        null_freq: f64,
        distinct_remain: f64,
        freq_remain: f64,
    ) -> Self {
        Self {
            buckets,
            well_defined,
            null_freq,
            distinct_remain,
            freq_remain,
            ndv_scaled: false,
            col_stats_missing: false,
        }
    }

    /// Histogram that carries no information
    pub fn undefined() -> Self {
        Self::with_residuals(Vec::new(), false, 0.0, 0.0, 0.0)
    }

    /// Build a histogram from loaded statistics, checking every invariant
    pub fn try_from_buckets(
        buckets: Vec<Bucket>,
        null_freq: f64,
        distinct_remain: f64,
        freq_remain: f64,
        cat: &dyn TypeCatalog,
    ) -> Result<Self> {
        for (name, value) in [
            ("null frequency", null_freq),
            ("remaining distinct", distinct_remain),
            ("remaining frequency", freq_remain),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(Error::NegativeResidual { name, value });
            }
        }

        for (index, pair) in buckets.windows(2).enumerate() {
            if !pair[0].is_before(&pair[1], cat) {
                return Err(Error::BucketsOverlap {
                    index,
                    next: index + 1,
                });
            }
        }

        let hist = Self::new(buckets).with_residual_mass(null_freq, distinct_remain, freq_remain);
        let total = hist.frequency();
        if total > 1.0 + EPSILON {
            return Err(Error::FrequencyOverflow(total));
        }
        Ok(hist)
    }

    /// Default histogram for a column with no collected statistics
    ///
    /// A boolean column of a non-empty relation has at most three values
    /// (true, false and NULL), which is worth more than no information.
    pub fn default_for(data_type: DataType, is_empty: bool) -> Self {
        if data_type == DataType::Boolean && !is_empty {
            let mut hist = Self::with_residuals(Vec::new(), true, 0.0, 3.0, 1.0);
            hist.col_stats_missing = true;
            return hist;
        }
        Self::undefined()
    }

    pub(crate) fn with_residual_mass(mut self, null_freq: f64, distinct_remain: f64, freq_remain: f64) -> Self {
        self.null_freq = null_freq;
        self.distinct_remain = distinct_remain;
        self.freq_remain = freq_remain;
        self
    }

    /// Mark that no statistics were collected for the column
    pub fn with_col_stats_missing(mut self, missing: bool) -> Self {
        self.col_stats_missing = missing;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_well_defined(&self) -> bool {
        self.well_defined
    }

    pub fn null_freq(&self) -> f64 {
        self.null_freq
    }

    pub fn distinct_remain(&self) -> f64 {
        self.distinct_remain
    }

    pub fn freq_remain(&self) -> f64 {
        self.freq_remain
    }

    pub fn is_ndv_scaled(&self) -> bool {
        self.ndv_scaled
    }

    pub fn is_col_stats_missing(&self) -> bool {
        self.col_stats_missing
    }

    /// Total frequency: buckets, NULLs and the remaining mass
    pub fn frequency(&self) -> f64 {
        let mut freq: f64 = self.buckets.iter().map(Bucket::frequency).sum();
        if self.null_freq > EPSILON {
            freq += self.null_freq;
        }
        freq + self.freq_remain
    }

    /// Total number of distinct values, counting NULL as one value
    pub fn distinct(&self) -> f64 {
        let mut ndv: f64 = self.buckets.iter().map(Bucket::distinct).sum();
        if self.null_freq > EPSILON {
            ndv += 1.0;
        }
        ndv + self.distinct_remain
    }

    /// Distinct values without NULL
    pub(crate) fn non_null_distinct(&self) -> f64 {
        let ndv = self.distinct();
        if self.null_freq > EPSILON {
            ndv - 1.0
        } else {
            ndv
        }
    }

    pub(crate) fn bucket_frequency(&self) -> f64 {
        self.buckets.iter().map(Bucket::frequency).sum()
    }

    pub(crate) fn bucket_distinct(&self) -> f64 {
        self.buckets.iter().map(Bucket::distinct).sum()
    }

    /// No buckets and no residual mass
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty() && self.null_freq < EPSILON && self.distinct_remain < EPSILON
    }

    pub fn is_normalized(&self) -> bool {
        (self.frequency() - 1.0).abs() < EPSILON
    }

    /// Whether total frequency stays within 1 and buckets are in order
    pub fn is_valid(&self, cat: &dyn TypeCatalog) -> bool {
        if self.frequency() > 1.0 + EPSILON {
            return false;
        }
        self.buckets
            .windows(2)
            .all(|pair| !pair[1].lower().less_than(pair[0].upper(), cat))
    }

    // =========================================================================
    // Normalization and NDV capping
    // =========================================================================

    /// Rescale so the total frequency is 1, returning the scale factor
    ///
    /// A histogram that kept no mass returns `f64::MAX`, which pushes the
    /// caller's row count to its floor.
    pub(crate) fn normalize(&mut self) -> f64 {
        if self.is_empty() {
            return f64::MAX;
        }
        let total = self.frequency();
        if total <= 0.0 {
            return f64::MAX;
        }

        let scale_factor = (1.0 / total).max(1.0);
        for bucket in &mut self.buckets {
            *bucket = bucket.with_frequency(bucket.frequency() * scale_factor);
        }
        self.null_freq *= scale_factor;
        self.freq_remain = if self.distinct_remain < EPSILON {
            0.0
        } else {
            (self.freq_remain * scale_factor).min(1.0)
        };
        scale_factor
    }

    /// Copy with every distinct count bounded by `rows`
    ///
    /// Each bucket and the remaining part are clamped to `rows` first. If the
    /// total still exceeds `rows`, all counts shrink proportionally so the
    /// total matches it.
    pub fn cap_ndvs(&self, rows: f64) -> Histogram {
        let mut capped = self.clone();
        let mut changed = false;
        for bucket in &mut capped.buckets {
            if bucket.distinct() > rows {
                *bucket = bucket.with_stats(bucket.frequency(), rows);
                changed = true;
            }
        }
        if capped.distinct_remain > rows {
            capped.distinct_remain = rows;
            changed = true;
        }

        let total = capped.bucket_distinct() + capped.distinct_remain;
        if total > rows && total > 0.0 {
            let ratio = rows / total;
            for bucket in &mut capped.buckets {
                *bucket = bucket.with_stats(bucket.frequency(), bucket.distinct() * ratio);
            }
            capped.distinct_remain *= ratio;
            changed = true;
        }

        if changed {
            capped.ndv_scaled = true;
        }
        capped
    }

    // =========================================================================
    // Filters
    // =========================================================================

    /// Whether a filter with this comparison can reshape the buckets
    pub fn is_op_supported_for_filter(cmp: CmpType) -> bool {
        cmp.is_filter_supported()
    }

    /// Histogram of the rows satisfying `column <cmp> point`, not normalized
    pub fn make_filter(&self, cmp: CmpType, point: &Point, ctx: &EstimationContext) -> Histogram {
        debug_assert!(Self::is_op_supported_for_filter(cmp));
        let cat = ctx.catalog;

        match cmp {
            CmpType::Eq => self.filter_equal(point, false, cat),
            CmpType::INDF => self.filter_equal(point, true, cat),
            CmpType::NEq => Self::new(self.buckets_not_equal(point, cat))
                .with_residual_mass(0.0, self.distinct_remain, self.freq_remain),
            CmpType::IDF => {
                let null_freq = if point.is_null() { 0.0 } else { self.null_freq };
                Self::new(self.buckets_not_equal(point, cat)).with_residual_mass(
                    null_freq,
                    self.distinct_remain,
                    self.freq_remain,
                )
            }
            CmpType::Lt | CmpType::LEq => {
                let buckets = self.buckets_less_than(point, cmp == CmpType::LEq, cat);
                self.with_range_residuals(buckets, ctx)
            }
            CmpType::Gt | CmpType::GEq => {
                let buckets = self.buckets_greater_than(point, cmp == CmpType::GEq, cat);
                self.with_range_residuals(buckets, ctx)
            }
            CmpType::Other => self.clone(),
        }
    }

    /// Filter, then normalize
    ///
    /// Returns the normalized histogram and the scale factor of the filter,
    /// which is never below 1.
    pub fn make_filter_normalized(
        &self,
        cmp: CmpType,
        point: &Point,
        ctx: &EstimationContext,
    ) -> (Histogram, f64) {
        if !self.well_defined {
            return (Self::undefined(), ctx.default_scale_factor());
        }

        if cmp.is_range() && point.is_null() {
            // NULL never satisfies a range comparison
            return (Self::new(Vec::new()), f64::MAX);
        }

        if let Some(first) = self.buckets.first() {
            if !point.is_null() && !first.lower().is_comparable(point, ctx.catalog) {
                tracing::trace!(
                    point = %point,
                    cmp = %cmp,
                    "filter point not comparable with histogram, using default selectivity"
                );
                return (self.clone(), ctx.default_scale_factor());
            }
        }

        let mut filtered = self.make_filter(cmp, point, ctx);
        let scale_factor = filtered.normalize();
        (filtered, scale_factor)
    }

    /// Pattern match: buckets are kept, selectivity is the default one
    pub fn make_pattern_filter(&self, ctx: &EstimationContext) -> (Histogram, f64) {
        (self.clone(), ctx.default_scale_factor())
    }

    /// Predicate the estimator cannot interpret, with a caller-given scale factor
    pub fn make_unsupported_filter(&self, scale_factor: f64) -> (Histogram, f64) {
        (self.clone(), scale_factor.max(1.0))
    }

    fn filter_equal(&self, point: &Point, null_matches: bool, cat: &dyn TypeCatalog) -> Histogram {
        if point.is_null() {
            let null_freq = if null_matches { self.null_freq } else { 0.0 };
            return Self::new(Vec::new()).with_residual_mass(null_freq, 0.0, 0.0);
        }

        if let Some(bucket) = self.buckets.iter().find(|b| b.contains(point, cat)) {
            let bucket = if bucket.is_singleton(cat) {
                bucket.clone()
            } else {
                bucket.make_singleton(point, cat)
            };
            return Self::new(vec![bucket]);
        }

        if self.distinct_remain > EPSILON {
            // The value may be one of the unbucketed ones
            let freq_remain = (self.freq_remain / self.distinct_remain).min(1.0);
            return Self::new(Vec::new()).with_residual_mass(0.0, 1.0, freq_remain);
        }
        Self::new(Vec::new())
    }

    fn buckets_not_equal(&self, point: &Point, cat: &dyn TypeCatalog) -> Vec<Bucket> {
        let mut result = Vec::with_capacity(self.buckets.len() + 1);
        for bucket in &self.buckets {
            if !point.is_null() && bucket.contains(point, cat) {
                result.extend(bucket.scale_upper(point, false, cat));
                result.extend(bucket.greater_than(point, cat));
            } else {
                result.push(bucket.clone());
            }
        }
        result
    }

    fn buckets_less_than(&self, point: &Point, include: bool, cat: &dyn TypeCatalog) -> Vec<Bucket> {
        let mut result = Vec::with_capacity(self.buckets.len());
        for bucket in &self.buckets {
            if bucket.is_before_point(point, cat) {
                break;
            }
            if bucket.is_after_point(point, cat) {
                result.push(bucket.clone());
                continue;
            }
            result.extend(bucket.scale_upper(point, include, cat));
            break;
        }
        result
    }

    fn buckets_greater_than(&self, point: &Point, include: bool, cat: &dyn TypeCatalog) -> Vec<Bucket> {
        let mut result = Vec::with_capacity(self.buckets.len());
        let mut iter = self.buckets.iter();
        for bucket in iter.by_ref() {
            if bucket.is_after_point(point, cat) {
                continue;
            }
            if bucket.is_before_point(point, cat) {
                result.push(bucket.clone());
            } else if include {
                result.push(bucket.scale_lower(point, true, cat));
            } else {
                result.extend(bucket.greater_than(point, cat));
            }
            break;
        }
        result.extend(iter.cloned());
        result
    }

    /// Range filters keep a default share of the unbucketed values and drop NULLs
    fn with_range_residuals(&self, buckets: Vec<Bucket>, ctx: &EstimationContext) -> Histogram {
        let selectivity = ctx.config.default_selectivity;
        let (distinct_remain, freq_remain) = if self.distinct_remain * selectivity > EPSILON {
            (
                self.distinct_remain * selectivity,
                self.freq_remain * selectivity,
            )
        } else {
            (0.0, 0.0)
        };
        Self::new(buckets).with_residual_mass(0.0, distinct_remain, freq_remain)
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Histogram ({} buckets)", self.buckets.len())?;
        for (i, bucket) in self.buckets.iter().enumerate() {
            writeln!(f, "  bucket {}: {}", i, bucket)?;
        }
        writeln!(f, "  null fraction: {:.4}", self.null_freq)?;
        writeln!(f, "  remaining NDV: {:.2}", self.distinct_remain)?;
        write!(f, "  remaining frequency: {:.4}", self.freq_remain)?;
        if self.ndv_scaled {
            write!(f, " (ndv scaled)")?;
        }
        if !self.well_defined {
            write!(f, " (not well defined)")?;
        }
        Ok(())
    }
}
