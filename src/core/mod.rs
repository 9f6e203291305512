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

//! Core types and definitions for cardest
//!
//! This module contains the fundamental types used by the statistics code:
//!
//! - [`DataType`] - Value types (INTEGER, TEXT, FLOAT, etc.)
//! - [`CmpType`] - Comparison types of predicates (=, <>, <, IS DISTINCT FROM, etc.)
//! - [`Value`] - Typed datums
//! - [`Point`] - Shared histogram boundary values
//! - [`TypeCatalog`] - Comparison and distance semantics per type
//! - [`Error`] - Error types for loading and configuration

pub mod catalog;
pub mod error;
pub mod point;
pub mod types;
pub mod value;

// Re-export main types for convenience
pub use catalog::{BuiltinCatalog, TypeCatalog};
pub use error::{Error, Result};
pub use point::Point;
pub use types::{CmpType, ColumnId, DataType};
pub use value::{parse_timestamp, Value};
