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

//! Scale factor combination
//!
//! Predicates on different columns are rarely independent. Multiplying
//! their scale factors underestimates the output badly once a query has a
//! handful of predicates, so the factors are sorted from most to least
//! selective and every further term is damped.
//!
//! The damping rounds are pluggable through [`DampingStrategy`]. Every
//! strategy keeps two properties: the combined conjunction never exceeds
//! the independence product, and adding a disjunct never raises the
//! disjunction's scale factor.

use smallvec::SmallVec;

use super::config::{DampingRoundStrategy, StatisticsConfig, EPSILON};

/// Scale factors collected while walking one predicate list
pub type ScaleFactors = SmallVec<[f64; 8]>;

/// Folds sorted terms into one damped value
pub trait DampingStrategy: Send + Sync {
    /// Damped product of scale factors sorted in descending order
    fn damped_product(&self, sorted: &[f64], damping: f64) -> f64;

    /// Damped sum of selectivities sorted in descending order
    fn damped_sum(&self, sorted: &[f64], damping: f64) -> f64;
}

/// `sf0 * sf1^d * sf2^(d^2) ...`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialBackoff;

impl DampingStrategy for ExponentialBackoff {
    fn damped_product(&self, sorted: &[f64], damping: f64) -> f64 {
        let mut exponent = 1.0;
        let mut result = 1.0;
        for &sf in sorted {
            result *= sf.max(1.0).powf(exponent);
            exponent *= damping;
        }
        result
    }

    fn damped_sum(&self, sorted: &[f64], damping: f64) -> f64 {
        let mut weight = 1.0;
        let mut result = 0.0;
        for &sel in sorted {
            result += sel * weight;
            weight *= damping;
        }
        result
    }
}

/// Exponential backoff for the first `after` terms, then one damping round
/// for the rest taken together
#[derive(Debug, Clone, Copy)]
pub struct FlattenAfter {
    pub after: usize,
}

impl DampingStrategy for FlattenAfter {
    fn damped_product(&self, sorted: &[f64], damping: f64) -> f64 {
        let split = self.after.min(sorted.len());
        let (head, tail) = sorted.split_at(split);
        let mut result = ExponentialBackoff.damped_product(head, damping);
        if !tail.is_empty() {
            let group: f64 = tail.iter().map(|sf| sf.max(1.0)).product();
            result *= group.powf(damping.powi(split as i32));
        }
        result
    }

    fn damped_sum(&self, sorted: &[f64], damping: f64) -> f64 {
        let split = self.after.min(sorted.len());
        let (head, tail) = sorted.split_at(split);
        let mut result = ExponentialBackoff.damped_sum(head, damping);
        if !tail.is_empty() {
            let group: f64 = tail.iter().sum();
            result += group * damping.powi(split as i32);
        }
        result
    }
}

impl DampingStrategy for DampingRoundStrategy {
    fn damped_product(&self, sorted: &[f64], damping: f64) -> f64 {
        match *self {
            DampingRoundStrategy::ExponentialBackoff => {
                ExponentialBackoff.damped_product(sorted, damping)
            }
            DampingRoundStrategy::FlattenAfter(after) => {
                FlattenAfter { after }.damped_product(sorted, damping)
            }
        }
    }

    fn damped_sum(&self, sorted: &[f64], damping: f64) -> f64 {
        match *self {
            DampingRoundStrategy::ExponentialBackoff => ExponentialBackoff.damped_sum(sorted, damping),
            DampingRoundStrategy::FlattenAfter(after) => {
                FlattenAfter { after }.damped_sum(sorted, damping)
            }
        }
    }
}

/// Combines per-predicate scale factors with the configured damping
pub struct ScaleFactorCombiner<'a> {
    config: &'a StatisticsConfig,
    strategy: &'a dyn DampingStrategy,
}

impl<'a> ScaleFactorCombiner<'a> {
    /// Combiner using the configuration's damping round strategy
    pub fn new(config: &'a StatisticsConfig) -> Self {
        Self {
            config,
            strategy: &config.damping_round_strategy,
        }
    }

    /// Combiner with a custom damping strategy
    pub fn with_strategy(config: &'a StatisticsConfig, strategy: &'a dyn DampingStrategy) -> Self {
        Self { config, strategy }
    }

    /// Scale factor of a conjunction of filters on different columns
    pub fn conjunction(&self, scale_factors: &[f64]) -> f64 {
        self.damped(scale_factors, self.config.damping_factor_filter)
    }

    /// Scale factor of a conjunction of join predicates
    pub fn join(&self, scale_factors: &[f64]) -> f64 {
        self.damped(scale_factors, self.config.damping_factor_join)
    }

    fn damped(&self, scale_factors: &[f64], damping: f64) -> f64 {
        if scale_factors.is_empty() {
            return 1.0;
        }
        let mut sorted: ScaleFactors = scale_factors.iter().copied().collect();
        sort_descending(&mut sorted);
        self.strategy.damped_product(&sorted, damping).max(1.0)
    }

    /// Scale factor of a disjunction, bounded by the input row count
    ///
    /// Each alternative's selectivity is added with a damped weight, most
    /// selective last, and the sum is capped at 1.
    pub fn disjunction(&self, scale_factors: &[f64], input_rows: f64) -> f64 {
        if scale_factors.is_empty() {
            return 1.0;
        }
        let mut selectivities: ScaleFactors = scale_factors
            .iter()
            .map(|sf| 1.0 / sf.max(1.0))
            .collect();
        sort_descending(&mut selectivities);

        let selectivity = self
            .strategy
            .damped_sum(&selectivities, self.config.damping_factor_filter)
            .min(1.0);
        let scale_factor = if selectivity > 0.0 {
            (1.0 / selectivity).max(1.0)
        } else {
            f64::MAX
        };
        scale_factor.min(input_rows.max(1.0))
    }

    /// Number of groups over several grouping columns
    ///
    /// Distinct counts are sorted descending. The largest counts in full
    /// and every further column adds a damped factor of at least one.
    pub fn group_by_distinct(&self, ndvs: &[f64]) -> f64 {
        if ndvs.is_empty() {
            return 1.0;
        }
        let mut sorted: ScaleFactors = ndvs.iter().copied().collect();
        sort_descending(&mut sorted);

        let damping = self.config.damping_factor_group_by;
        let mut weight = damping;
        let mut groups = sorted[0].max(1.0);
        for &ndv in &sorted[1..] {
            groups *= (ndv * weight).max(1.0);
            weight *= damping;
        }
        groups
    }
}

fn sort_descending(values: &mut [f64]) {
    values.sort_by(|a, b| b.total_cmp(a));
}

/// Whether two scale factors are the same within tolerance
pub fn scale_factors_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON * a.abs().max(b.abs()).max(1.0)
}
