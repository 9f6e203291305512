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

//! # cardest - Histogram-based cardinality estimation
//!
//! cardest derives the statistics of a relational operator's output from the
//! statistics of its inputs. A cost-based optimizer attaches [`Statistics`]
//! (row count plus per-column histograms) to every base relation, then asks
//! for the statistics of each filter, join, group-by or union-all it
//! considers.
//!
//! ## Key Features
//!
//! - **Bucket algebra** - Splitting, intersecting and merging value ranges
//! - **Predicate trees** - Conjunctions, disjunctions, comparisons and LIKE
//! - **Damped selectivity** - Correlation-aware combination of predicates
//! - **Joins** - Inner, semi, anti-semi and left outer joins
//! - **MCV merge** - Most common values folded into a histogram
//!
//! ## Quick Start
//!
//! ```rust
//! use cardest::core::{BuiltinCatalog, CmpType, DataType, Point};
//! use cardest::statistics::{Bucket, EstimationContext, Histogram, Predicate, Statistics, StatisticsConfig};
//!
//! let catalog = BuiltinCatalog::new();
//! let config = StatisticsConfig::default();
//! let ctx = EstimationContext::new(&catalog, &config);
//!
//! // 1000 rows with `age` spread evenly over [0, 100)
//! let age = Histogram::new(vec![Bucket::new(Point::new(0i64), Point::new(100i64), true, false, 1.0, 100.0)]);
//! let people = Statistics::new(1000.0).with_column(1, DataType::Integer, age);
//!
//! let adults = people.filter(&Predicate::point(1, CmpType::GEq, 18i64), &ctx);
//! assert!((adults.rows() - 820.0).abs() < 1e-6);
//! ```
//!
//! ## Modules
//!
//! - [`core`] - Values, points, data types and the type catalog ([`Error`])
//! - [`statistics`] - Buckets, histograms, predicates and [`Statistics`]
//! - [`processor`] - Filter, join, group-by and union-all derivation

pub mod core;
pub mod processor;
pub mod statistics;

pub use crate::core::{BuiltinCatalog, CmpType, ColumnId, DataType, Error, Point, Result, TypeCatalog, Value};
pub use crate::statistics::{
    Bucket, EstimationContext, Histogram, JoinPredicate, Predicate, Statistics, StatisticsConfig,
    UnionAllColumns,
};
