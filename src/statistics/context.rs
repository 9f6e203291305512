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

//! Estimation context passed to every derivation

use std::fmt;

use super::config::StatisticsConfig;
use crate::core::TypeCatalog;

/// Catalog and configuration for one estimation call
#[derive(Clone, Copy)]
pub struct EstimationContext<'a> {
    pub catalog: &'a dyn TypeCatalog,
    pub config: &'a StatisticsConfig,
}

impl<'a> EstimationContext<'a> {
    pub fn new(catalog: &'a dyn TypeCatalog, config: &'a StatisticsConfig) -> Self {
        Self { catalog, config }
    }

    /// Smallest row count a derivation produces
    #[inline]
    pub fn min_rows(&self) -> f64 {
        self.config.minimum_row_floor
    }

    /// Scale factor of a predicate with the default selectivity
    #[inline]
    pub fn default_scale_factor(&self) -> f64 {
        self.config.default_scale_factor()
    }
}

impl fmt::Debug for EstimationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstimationContext")
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}
