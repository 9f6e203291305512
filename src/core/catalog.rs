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

//! Type catalog boundary
//!
//! The statistics code never compares two values directly. Everything goes
//! through a `TypeCatalog`, which decides whether two types can be compared,
//! how far apart two values are, and what the next value after a point is.

use std::cmp::Ordering;

use super::types::DataType;
use super::value::Value;

/// Per-type comparison and distance semantics
pub trait TypeCatalog: Send + Sync {
    /// Whether values of the two types can be ordered against each other
    fn comparable(&self, left: DataType, right: DataType) -> bool;

    /// Order two values, None when they are incomparable or either is NULL
    fn compare(&self, left: &Value, right: &Value) -> Option<Ordering>;

    /// Signed distance `left - right`, None when the values have no distance
    fn distance(&self, left: &Value, right: &Value) -> Option<f64>;

    /// Smallest value greater than `value`, for integer-mapped types only
    fn next_point(&self, value: &Value) -> Option<Value>;

    /// Whether every value of the type maps onto an integer
    fn has_integer_mapping(&self, data_type: DataType) -> bool;
}

/// Catalog over the crate's own `Value` types
///
/// Integers, booleans and timestamps (microsecond resolution) are
/// integer-mapped. Text distances use the big-endian image of the first
/// eight bytes, so strings sharing a long prefix collapse to distance zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

impl BuiltinCatalog {
    /// Create the built-in catalog
    pub fn new() -> Self {
        BuiltinCatalog
    }
}

impl TypeCatalog for BuiltinCatalog {
    fn comparable(&self, left: DataType, right: DataType) -> bool {
        if left == DataType::Null || right == DataType::Null {
            return false;
        }
        left == right || (left.is_numeric() && right.is_numeric())
    }

    fn compare(&self, left: &Value, right: &Value) -> Option<Ordering> {
        if left.is_null() || right.is_null() {
            return None;
        }
        if !self.comparable(left.data_type(), right.data_type()) {
            return None;
        }
        left.compare(right).ok()
    }

    fn distance(&self, left: &Value, right: &Value) -> Option<f64> {
        if left.is_null() || right.is_null() {
            return None;
        }
        if !self.comparable(left.data_type(), right.data_type()) {
            return None;
        }
        match (left.as_mapped_int(), right.as_mapped_int()) {
            // Widened so the full i64 range cannot overflow
            (Some(l), Some(r)) => Some((i128::from(l) - i128::from(r)) as f64),
            _ => Some(left.as_double()? - right.as_double()?),
        }
    }

    fn next_point(&self, value: &Value) -> Option<Value> {
        if !self.has_integer_mapping(value.data_type()) {
            return None;
        }
        value.successor()
    }

    fn has_integer_mapping(&self, data_type: DataType) -> bool {
        data_type.has_integer_mapping()
    }
}
