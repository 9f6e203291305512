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

//! Point - a shared, immutable histogram boundary value

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::catalog::TypeCatalog;
use super::types::DataType;
use super::value::Value;

/// Distance used when two points have no numeric distance
pub const DEFAULT_DISTANCE: f64 = 1.0;

/// A single comparable value
///
/// Cloning a point only bumps the reference count. All ordering goes
/// through the catalog, and an incomparable pair answers false to every
/// ordering question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Point(Arc<Value>);

impl Point {
    /// Create a point from a value
    pub fn new(value: impl Into<Value>) -> Self {
        Point(Arc::new(value.into()))
    }

    /// The wrapped value
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Data type of the wrapped value
    pub fn data_type(&self) -> DataType {
        self.0.data_type()
    }

    /// Returns true if the point holds NULL
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    #[inline]
    fn cmp_with(&self, other: &Point, cat: &dyn TypeCatalog) -> Option<Ordering> {
        cat.compare(&self.0, &other.0)
    }

    pub fn equals(&self, other: &Point, cat: &dyn TypeCatalog) -> bool {
        self.cmp_with(other, cat) == Some(Ordering::Equal)
    }

    pub fn less_than(&self, other: &Point, cat: &dyn TypeCatalog) -> bool {
        self.cmp_with(other, cat) == Some(Ordering::Less)
    }

    pub fn less_than_or_equal(&self, other: &Point, cat: &dyn TypeCatalog) -> bool {
        matches!(
            self.cmp_with(other, cat),
            Some(Ordering::Less | Ordering::Equal)
        )
    }

    pub fn greater_than(&self, other: &Point, cat: &dyn TypeCatalog) -> bool {
        self.cmp_with(other, cat) == Some(Ordering::Greater)
    }

    pub fn greater_than_or_equal(&self, other: &Point, cat: &dyn TypeCatalog) -> bool {
        matches!(
            self.cmp_with(other, cat),
            Some(Ordering::Greater | Ordering::Equal)
        )
    }

    /// Distance `self - other`, or the default distance when undefined
    pub fn distance(&self, other: &Point, cat: &dyn TypeCatalog) -> f64 {
        cat.distance(&self.0, &other.0).unwrap_or(DEFAULT_DISTANCE)
    }

    /// Whether the catalog can order these two points
    pub fn is_comparable(&self, other: &Point, cat: &dyn TypeCatalog) -> bool {
        cat.comparable(self.data_type(), other.data_type())
    }

    /// Next point for integer-mapped types
    pub fn next(&self, cat: &dyn TypeCatalog) -> Option<Point> {
        cat.next_point(&self.0).map(Point::new)
    }

    /// The smaller of two points; the first one on ties or incomparability
    pub fn min<'a>(a: &'a Point, b: &'a Point, cat: &dyn TypeCatalog) -> &'a Point {
        if b.less_than(a, cat) {
            b
        } else {
            a
        }
    }

    /// The larger of two points; the first one on ties or incomparability
    pub fn max<'a>(a: &'a Point, b: &'a Point, cat: &dyn TypeCatalog) -> &'a Point {
        if b.greater_than(a, cat) {
            b
        } else {
            a
        }
    }
}

impl From<Value> for Point {
    fn from(value: Value) -> Self {
        Point(Arc::new(value))
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
