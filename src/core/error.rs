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

//! Error types for cardest
//!
//! Only the loader and configuration boundaries return these errors. Broken
//! invariants inside the bucket algebra are programming errors and panic.

use thiserror::Error;

/// Result type alias for cardest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for statistics loading and configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // =========================================================================
    // Bucket errors
    // =========================================================================
    /// Lower bound is greater than the upper bound
    #[error("bucket bounds out of order: lower {lower} is greater than upper {upper}")]
    BucketBoundsOutOfOrder { lower: String, upper: String },

    /// Singleton bucket with an open bound, e.g. [5, 5)
    #[error("singleton bucket at {point} must be closed on both ends")]
    OpenSingletonBucket { point: String },

    /// Frequency outside [0, 1]
    #[error("bucket frequency {0} is outside [0, 1]")]
    InvalidFrequency(f64),

    /// Negative distinct count
    #[error("bucket distinct count {0} is negative")]
    InvalidDistinct(f64),

    /// Bounds whose types cannot be compared
    #[error("cannot compare bucket bounds of type {left} and {right}")]
    IncomparableBounds { left: String, right: String },

    // =========================================================================
    // Histogram errors
    // =========================================================================
    /// Buckets are not ordered or overlap
    #[error("histogram buckets {index} and {next} overlap or are out of order")]
    BucketsOverlap { index: usize, next: usize },

    /// Total frequency exceeds one
    #[error("histogram frequency {0} exceeds 1")]
    FrequencyOverflow(f64),

    /// Residual null/remaining mass is negative
    #[error("histogram residual {name} is negative: {value}")]
    NegativeResidual { name: &'static str, value: f64 },

    /// MCV value and frequency arrays differ in length
    #[error("MCV list has {values} values but {frequencies} frequencies")]
    McvLengthMismatch { values: usize, frequencies: usize },

    // =========================================================================
    // Value errors
    // =========================================================================
    /// Cannot compare NULL with non-NULL value
    #[error("cannot compare NULL with non-NULL value")]
    NullComparison,

    /// Cannot compare incompatible types
    #[error("cannot compare incompatible types")]
    IncomparableTypes,

    /// Unknown data type name
    #[error("unknown data type: {0}")]
    UnknownDataType(String),

    /// Parse error
    #[error("parse error: {0}")]
    Parse(String),

    // =========================================================================
    // Configuration errors
    // =========================================================================
    /// Invalid configuration value
    #[error("invalid configuration for {option}: {message}")]
    InvalidConfig { option: String, message: String },
}

impl Error {
    /// Create a new BucketBoundsOutOfOrder error
    pub fn bucket_bounds_out_of_order(lower: impl Into<String>, upper: impl Into<String>) -> Self {
        Error::BucketBoundsOutOfOrder {
            lower: lower.into(),
            upper: upper.into(),
        }
    }

    /// Create a new IncomparableBounds error
    pub fn incomparable_bounds(left: impl Into<String>, right: impl Into<String>) -> Self {
        Error::IncomparableBounds {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Create a new Parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    /// Create a new InvalidConfig error
    pub fn invalid_config(option: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            option: option.into(),
            message: message.into(),
        }
    }

    /// Check if this error was raised while validating loaded statistics
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Error::BucketBoundsOutOfOrder { .. }
                | Error::OpenSingletonBucket { .. }
                | Error::InvalidFrequency(_)
                | Error::InvalidDistinct(_)
                | Error::IncomparableBounds { .. }
                | Error::BucketsOverlap { .. }
                | Error::FrequencyOverflow(_)
                | Error::NegativeResidual { .. }
                | Error::McvLengthMismatch { .. }
        )
    }
}
