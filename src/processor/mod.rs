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

//! Statistics derivation for relational operators
//!
//! Each processor takes the statistics of its inputs and returns the
//! statistics of the operator's output. Processors hold no state between
//! calls; the catalog and configuration arrive in an [`EstimationContext`].
//!
//! [`EstimationContext`]: crate::statistics::EstimationContext

pub mod filter;
pub mod group_by;
pub mod join;
pub mod union_all;

pub use filter::{derive_filter, FilterProcessor};
pub use group_by::derive_group_by;
pub use join::{
    derive_inner_join, derive_left_anti_semi_join, derive_left_outer_join, derive_left_semi_join,
    JoinKind, JoinProcessor,
};
pub use union_all::derive_union_all;
