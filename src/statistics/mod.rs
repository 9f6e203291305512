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

//! Statistics data model and histogram algebra
//!
//! - [`Bucket`] - A value range with frequency and distinct count
//! - [`Histogram`] - Ordered buckets plus NULL and remaining mass
//! - [`Predicate`] - Filter predicate tree
//! - [`Statistics`] - Row count and per-column histograms of a relation
//! - [`ScaleFactorCombiner`] - Damped combination of selectivities
//! - [`StatisticsConfig`] - Estimation options

pub mod bucket;
mod combine;
pub mod config;
pub mod context;
pub mod histogram;
pub mod mcv;
pub mod predicate;
pub mod scale_factor;
pub mod stats;

pub use bucket::{Bucket, MergeResult};
pub use config::{
    CardinalityUpperBoundMethod, DampingRoundStrategy, StatisticsConfig, EPSILON, MIN_DISTINCT,
};
pub use context::EstimationContext;
pub use histogram::Histogram;
pub use mcv::{merge_mcv_histogram, transform_mcv};
pub use predicate::Predicate;
pub use scale_factor::{
    DampingStrategy, ExponentialBackoff, FlattenAfter, ScaleFactorCombiner, ScaleFactors,
};
pub use stats::{ComputedColumn, HistogramMap, JoinPredicate, Statistics, UnionAllColumns};
