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

//! Histogram buckets
//!
//! A bucket covers the range between two points, each end open or closed,
//! and carries the fraction of the relation's rows that fall inside it plus
//! the number of distinct values in the range. Values are assumed to be
//! spread uniformly over the range, so every split of a bucket pro-rates
//! its frequency and distinct count by width.
//!
//! Buckets are immutable. Every operation returns fresh buckets that share
//! the boundary points of their inputs.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Point, Result, TypeCatalog};

/// Overlap used when a point cannot be placed inside a bucket
pub const UNKNOWN_OVERLAP: f64 = 0.5;

/// A contiguous value range with its frequency and distinct count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    lower: Point,
    upper: Point,
    lower_closed: bool,
    upper_closed: bool,
    frequency: f64,
    distinct: f64,
}

/// Result of merging two overlapping buckets
///
/// `merged` covers the common prefix of both ranges; whatever is left of
/// either input past the merged range is returned as a residual.
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub merged: Bucket,
    pub residual_self: Option<Bucket>,
    pub residual_other: Option<Bucket>,
}

impl Bucket {
    /// Create a bucket
    ///
    /// # Panics
    ///
    /// Panics if a bound is NULL or the frequency/distinct count is negative.
    pub fn new(
        lower: Point,
        upper: Point,
        lower_closed: bool,
        upper_closed: bool,
        frequency: f64,
        distinct: f64,
    ) -> Self {
        assert!(
            !lower.is_null() && !upper.is_null(),
            "bucket bounds must not be NULL"
        );
        assert!(
            frequency >= 0.0 && distinct >= 0.0,
            "bucket mass must be non-negative: frequency {}, distinct {}",
            frequency,
            distinct
        );
        Self {
            lower,
            upper,
            lower_closed,
            upper_closed,
            frequency,
            distinct,
        }
    }

    /// Create a bucket from loaded statistics, validating every invariant
    pub fn try_new(
        lower: Point,
        upper: Point,
        lower_closed: bool,
        upper_closed: bool,
        frequency: f64,
        distinct: f64,
        cat: &dyn TypeCatalog,
    ) -> Result<Self> {
        if lower.is_null() || upper.is_null() || !lower.is_comparable(&upper, cat) {
            return Err(Error::incomparable_bounds(
                lower.to_string(),
                upper.to_string(),
            ));
        }
        if lower.greater_than(&upper, cat) {
            return Err(Error::bucket_bounds_out_of_order(
                lower.to_string(),
                upper.to_string(),
            ));
        }
        if lower.equals(&upper, cat) && !(lower_closed && upper_closed) {
            return Err(Error::OpenSingletonBucket {
                point: lower.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&frequency) {
            return Err(Error::InvalidFrequency(frequency));
        }
        if distinct.is_nan() || distinct < 0.0 {
            return Err(Error::InvalidDistinct(distinct));
        }
        Ok(Self::new(
            lower,
            upper,
            lower_closed,
            upper_closed,
            frequency,
            distinct,
        ))
    }

    /// Singleton bucket `[point, point]` holding all rows
    pub fn singleton(point: Point) -> Self {
        Self::new(point.clone(), point, true, true, 1.0, 1.0)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn lower(&self) -> &Point {
        &self.lower
    }

    pub fn upper(&self) -> &Point {
        &self.upper
    }

    pub fn is_lower_closed(&self) -> bool {
        self.lower_closed
    }

    pub fn is_upper_closed(&self) -> bool {
        self.upper_closed
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn distinct(&self) -> f64 {
        self.distinct
    }

    /// Same range with a different frequency and distinct count
    pub fn with_stats(&self, frequency: f64, distinct: f64) -> Self {
        Self::new(
            self.lower.clone(),
            self.upper.clone(),
            self.lower_closed,
            self.upper_closed,
            frequency,
            distinct,
        )
    }

    /// Same range and distinct count with a different frequency
    pub fn with_frequency(&self, frequency: f64) -> Self {
        self.with_stats(frequency, self.distinct)
    }

    pub fn is_singleton(&self, cat: &dyn TypeCatalog) -> bool {
        self.lower.equals(&self.upper, cat)
    }

    /// Distance between the bounds, 1 for singletons
    pub fn width(&self, cat: &dyn TypeCatalog) -> f64 {
        if self.is_singleton(cat) {
            1.0
        } else {
            self.upper.distance(&self.lower, cat)
        }
    }

    // =========================================================================
    // Point predicates
    // =========================================================================

    /// Whether the point lies inside the bucket, honoring closedness
    pub fn contains(&self, point: &Point, cat: &dyn TypeCatalog) -> bool {
        if self.is_singleton(cat) {
            return self.lower.equals(point, cat);
        }
        if self.lower_closed && self.lower.equals(point, cat) {
            return true;
        }
        if self.upper_closed && self.upper.equals(point, cat) {
            return true;
        }
        self.lower.less_than(point, cat) && self.upper.greater_than(point, cat)
    }

    /// Whether the whole bucket lies above the point
    pub fn is_before_point(&self, point: &Point, cat: &dyn TypeCatalog) -> bool {
        (self.lower_closed && self.lower.greater_than(point, cat))
            || (!self.lower_closed && self.lower.greater_than_or_equal(point, cat))
    }

    /// Whether the whole bucket lies below the point
    pub fn is_after_point(&self, point: &Point, cat: &dyn TypeCatalog) -> bool {
        (self.upper_closed && self.upper.less_than(point, cat))
            || (!self.upper_closed && self.upper.less_than_or_equal(point, cat))
    }

    /// Fraction of the bucket between its lower bound and the point
    ///
    /// 1 once the point reaches the upper bound, 0 below the bucket.
    pub fn overlap(&self, point: &Point, cat: &dyn TypeCatalog) -> f64 {
        if !self.lower.is_comparable(point, cat) {
            return UNKNOWN_OVERLAP;
        }
        if self.upper.less_than_or_equal(point, cat) {
            return 1.0;
        }
        if !self.contains(point, cat) {
            return 0.0;
        }
        if self.is_singleton(cat) {
            return 1.0;
        }

        let width = self.upper.distance(&self.lower, cat);
        if width <= 0.0 {
            // Distinct values whose distance collapses, e.g. long common prefixes
            return UNKNOWN_OVERLAP;
        }
        let middle = point.distance(&self.lower, cat);
        let mut res = 1.0 / width;
        if middle > 0.0 {
            res *= middle;
        }
        res.min(1.0)
    }

    // =========================================================================
    // Bucket predicates and comparators
    // =========================================================================

    /// Order by lower bound; a closed bound sorts before an open one
    pub fn compare_lower_bounds(b1: &Bucket, b2: &Bucket, cat: &dyn TypeCatalog) -> Ordering {
        if b1.lower.equals(&b2.lower, cat) {
            return match (b1.lower_closed, b2.lower_closed) {
                (c1, c2) if c1 == c2 => Ordering::Equal,
                (true, _) => Ordering::Less,
                _ => Ordering::Greater,
            };
        }
        if b1.lower.less_than(&b2.lower, cat) {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }

    /// Order by upper bound; a closed bound sorts after an open one
    pub fn compare_upper_bounds(b1: &Bucket, b2: &Bucket, cat: &dyn TypeCatalog) -> Ordering {
        if b1.upper.equals(&b2.upper, cat) {
            return match (b1.upper_closed, b2.upper_closed) {
                (c1, c2) if c1 == c2 => Ordering::Equal,
                (true, _) => Ordering::Greater,
                _ => Ordering::Less,
            };
        }
        if b1.upper.less_than(&b2.upper, cat) {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }

    /// Compare the lower bound of `b1` with the upper bound of `b2`
    pub fn compare_lower_to_upper(b1: &Bucket, b2: &Bucket, cat: &dyn TypeCatalog) -> Ordering {
        if b1.lower.greater_than(&b2.upper, cat) {
            return Ordering::Greater;
        }
        if b1.lower.less_than(&b2.upper, cat) {
            return Ordering::Less;
        }
        if b1.lower_closed && b2.upper_closed && b1.lower.equals(&b2.upper, cat) {
            return Ordering::Equal;
        }
        Ordering::Greater
    }

    /// Whether the two ranges share at least one value
    pub fn intersects(&self, other: &Bucket, cat: &dyn TypeCatalog) -> bool {
        let self_singleton = self.is_singleton(cat);
        let other_singleton = other.is_singleton(cat);
        if self_singleton && other_singleton {
            return self.lower.equals(&other.lower, cat);
        }
        if self_singleton {
            return other.contains(&self.lower, cat);
        }
        if other_singleton {
            return self.contains(&other.lower, cat);
        }
        if self.subsumes(other, cat) || other.subsumes(self, cat) {
            return true;
        }
        if Bucket::compare_lower_bounds(self, other, cat) != Ordering::Greater {
            return Bucket::compare_lower_to_upper(other, self, cat) != Ordering::Greater;
        }
        Bucket::compare_lower_to_upper(self, other, cat) != Ordering::Greater
    }

    /// Whether this range contains the whole of the other range
    pub fn subsumes(&self, other: &Bucket, cat: &dyn TypeCatalog) -> bool {
        if self.is_singleton(cat) && other.is_singleton(cat) {
            return self.lower.equals(&other.lower, cat);
        }
        if other.is_singleton(cat) {
            return self.contains(&other.lower, cat);
        }
        Bucket::compare_lower_bounds(self, other, cat) != Ordering::Greater
            && Bucket::compare_upper_bounds(self, other, cat) != Ordering::Less
    }

    /// Whether this bucket lies entirely below the other one
    pub fn is_before(&self, other: &Bucket, cat: &dyn TypeCatalog) -> bool {
        if self.intersects(other, cat) {
            return false;
        }
        self.upper.less_than_or_equal(&other.lower, cat)
    }

    /// Whether this bucket lies entirely above the other one
    pub fn is_after(&self, other: &Bucket, cat: &dyn TypeCatalog) -> bool {
        if self.intersects(other, cat) {
            return false;
        }
        self.lower.greater_than_or_equal(&other.upper, cat)
    }

    // =========================================================================
    // Reshaping
    // =========================================================================

    /// Part of the bucket up to `new_upper`
    ///
    /// Returns None when the bucket would be empty, i.e. when `new_upper`
    /// is the lower bound and excluded.
    pub fn scale_upper(
        &self,
        new_upper: &Point,
        include_upper: bool,
        cat: &dyn TypeCatalog,
    ) -> Option<Bucket> {
        debug_assert!(self.contains(new_upper, cat));

        if self.lower.equals(new_upper, cat) {
            if !include_upper {
                return None;
            }
            return Some(self.make_singleton(new_upper, cat));
        }

        let mut frequency = self.frequency;
        let mut distinct = self.distinct;
        if !self.upper.equals(new_upper, cat) {
            let overlap = self.overlap(new_upper, cat);
            frequency *= overlap;
            distinct *= overlap;
        }

        Some(Bucket::new(
            self.lower.clone(),
            new_upper.clone(),
            self.lower_closed,
            include_upper,
            frequency,
            distinct,
        ))
    }

    /// Part of the bucket from `new_lower` on
    pub fn scale_lower(
        &self,
        new_lower: &Point,
        include_lower: bool,
        cat: &dyn TypeCatalog,
    ) -> Bucket {
        debug_assert!(self.contains(new_lower, cat));

        if self.upper.equals(new_lower, cat) {
            return self.make_singleton(new_lower, cat);
        }

        let mut frequency = self.frequency;
        let mut distinct = self.distinct;
        if !self.lower.equals(new_lower, cat) {
            let overlap = 1.0 - self.overlap(new_lower, cat);
            frequency *= overlap;
            distinct *= overlap;
        }

        Bucket::new(
            new_lower.clone(),
            self.upper.clone(),
            include_lower,
            self.upper_closed,
            frequency,
            distinct,
        )
    }

    /// Singleton bucket at a point inside this bucket, with one distinct
    /// value's share of the frequency
    pub fn make_singleton(&self, point: &Point, cat: &dyn TypeCatalog) -> Bucket {
        debug_assert!(self.contains(point, cat));

        let ratio = if self.distinct > 0.0 {
            1.0 / self.distinct
        } else {
            1.0
        };
        let frequency = (self.frequency * ratio).min(1.0);
        Bucket::new(point.clone(), point.clone(), true, true, frequency, 1.0)
    }

    /// Part of the bucket strictly greater than the point
    pub fn greater_than(&self, point: &Point, cat: &dyn TypeCatalog) -> Option<Bucket> {
        debug_assert!(self.contains(point, cat));

        if self.is_singleton(cat) || self.upper.equals(point, cat) {
            return None;
        }

        match point.next(cat) {
            Some(next) => {
                if self.contains(&next, cat) {
                    Some(self.scale_lower(&next, true, cat))
                } else {
                    None
                }
            }
            None => Some(self.scale_lower(point, false, cat)),
        }
    }

    /// Re-express the frequency against a different row count
    pub fn update_frequency(&self, rows_old: f64, rows_new: f64) -> Bucket {
        self.with_frequency(self.frequency * rows_old / rows_new)
    }

    // =========================================================================
    // Binary operations
    // =========================================================================

    /// Overlapping part of two intersecting buckets, used for equi-joins
    ///
    /// Returns the joined bucket and the frequency each input contributes to
    /// the overlapping range.
    pub fn intersect(&self, other: &Bucket, cat: &dyn TypeCatalog) -> (Bucket, f64, f64) {
        debug_assert!(self.intersects(other, cat));

        let new_lower = Point::max(&self.lower, &other.lower, cat);
        let new_upper = Point::min(&self.upper, &other.upper, cat);

        let mut lower_closed = true;
        let mut upper_closed = true;
        let mut distance = 1.0;

        if !new_lower.equals(new_upper, cat) {
            lower_closed = self.lower_closed;
            upper_closed = self.upper_closed;

            if new_lower.equals(&other.lower, cat) {
                lower_closed = other.lower_closed;
                if new_lower.equals(&self.lower, cat) {
                    lower_closed = self.lower_closed && other.lower_closed;
                }
            }
            if new_upper.equals(&other.upper, cat) {
                upper_closed = other.upper_closed;
                if new_upper.equals(&self.upper, cat) {
                    upper_closed = self.upper_closed && other.upper_closed;
                }
            }
            distance = new_upper.distance(new_lower, cat);
        }

        let (ratio1, ratio2) = if self.is_singleton(cat) && other.is_singleton(cat) {
            (1.0, 1.0)
        } else {
            (
                width_ratio(distance, self.width(cat)),
                width_ratio(distance, other.width(cat)),
            )
        };

        let ndv1 = ratio1 * self.distinct;
        let ndv2 = ratio2 * other.distinct;
        let freq1 = ratio1 * self.frequency;
        let freq2 = ratio2 * other.frequency;
        let max_ndv = ndv1.max(ndv2);
        let frequency = if max_ndv > 0.0 {
            freq1 * freq2 / max_ndv
        } else {
            0.0
        };

        let bucket = Bucket::new(
            new_lower.clone(),
            new_upper.clone(),
            lower_closed,
            upper_closed,
            frequency,
            ndv1.min(ndv2),
        );
        (bucket, freq1, freq2)
    }

    /// This bucket minus the range of `other`
    ///
    /// Returns the remainder below `other` and the remainder above it.
    pub fn difference(
        &self,
        other: &Bucket,
        cat: &dyn TypeCatalog,
    ) -> (Option<Bucket>, Option<Bucket>) {
        if other.subsumes(self, cat) {
            return (None, None);
        }
        if self.is_before(other, cat) {
            return (Some(self.clone()), None);
        }
        if other.is_before(self, cat) {
            return (None, Some(self.clone()));
        }

        let mut lower = None;
        let mut upper = None;
        if self.lower.less_than(&other.lower, cat) {
            lower = self.scale_upper(&other.lower, !other.lower_closed, cat);
        }
        if other.upper.less_than(&self.upper, cat) {
            upper = Some(self.scale_lower(&other.upper, !other.upper_closed, cat));
        }
        (lower, upper)
    }

    /// Merge two intersecting buckets weighted by their relations' rows
    ///
    /// With `union_all` the merged bucket counts the rows of both inputs and
    /// its frequency is relative to `rows + rows_other`. Otherwise the inputs
    /// are alternatives of a disjunction: the merged bucket keeps the larger
    /// share and its frequency is relative to `max(rows, rows_other)`.
    pub fn merge(
        &self,
        other: &Bucket,
        rows: f64,
        rows_other: f64,
        union_all: bool,
        cat: &dyn TypeCatalog,
    ) -> MergeResult {
        let (new_lower, lower_closed) = if self.lower.equals(&other.lower, cat) {
            (&self.lower, self.lower_closed || other.lower_closed)
        } else if other.lower.less_than(&self.lower, cat) {
            (&other.lower, other.lower_closed)
        } else {
            (&self.lower, self.lower_closed)
        };
        let new_upper = Point::min(&self.upper, &other.upper, cat);

        let overlap1 = self.merge_overlap(new_upper, cat);
        let overlap2 = other.merge_overlap(new_upper, cat);
        let rows1 = rows * self.frequency * overlap1;
        let rows2 = rows_other * other.frequency * overlap2;
        let ndv1 = self.distinct * overlap1;
        let ndv2 = other.distinct * overlap2;

        let (frequency, distinct) = if union_all {
            ((rows1 + rows2) / (rows + rows_other), ndv1 + ndv2)
        } else {
            (rows1.max(rows2) / rows.max(rows_other), ndv1.max(ndv2))
        };

        let upper_closed = new_lower.equals(new_upper, cat);
        let residual_self = if new_upper.less_than(&self.upper, cat) {
            Some(self.scale_lower(new_upper, !upper_closed, cat))
        } else {
            None
        };
        let residual_other = if new_upper.less_than(&other.upper, cat) {
            Some(other.scale_lower(new_upper, !upper_closed, cat))
        } else {
            None
        };

        MergeResult {
            merged: Bucket::new(
                new_lower.clone(),
                new_upper.clone(),
                lower_closed,
                upper_closed,
                frequency.min(1.0),
                distinct,
            ),
            residual_self,
            residual_other,
        }
    }

    /// Share of the bucket that lands in a merged range ending at `upper`
    fn merge_overlap(&self, upper: &Point, cat: &dyn TypeCatalog) -> f64 {
        // A bucket that starts at the split point is carried whole in its residual
        if !self.is_singleton(cat) && self.lower.greater_than_or_equal(upper, cat) {
            return 0.0;
        }
        self.overlap(upper, cat)
    }
}

fn width_ratio(distance: f64, width: f64) -> f64 {
    if width > 0.0 {
        (distance / width).min(1.0)
    } else {
        1.0
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}, {}{} {:.4}, {:.2}",
            if self.lower_closed { "[" } else { "(" },
            self.lower,
            self.upper,
            if self.upper_closed { "]" } else { ")" },
            self.frequency,
            self.distinct
        )
    }
}
