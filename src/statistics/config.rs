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

//! Estimation configuration
//!

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Tolerance used when comparing frequencies and row counts
pub const EPSILON: f64 = 0.001;

/// Smallest distinct count a non-empty column can have
pub const MIN_DISTINCT: f64 = 1.0;

/// Prefix of the environment variables read by `StatisticsConfig::from_env`
pub const ENV_PREFIX: &str = "CARDEST_";

/// How the sorted scale-factor list is folded before damping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DampingRoundStrategy {
    /// Every further term is damped one more round: `sf0 * sf1^d * sf2^(d^2) ...`
    #[default]
    ExponentialBackoff,
    /// The first `n` terms back off exponentially; the remaining terms are
    /// multiplied into one group and damped once more
    FlattenAfter(usize),
}

impl fmt::Display for DampingRoundStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DampingRoundStrategy::ExponentialBackoff => write!(f, "exponential"),
            DampingRoundStrategy::FlattenAfter(n) => write!(f, "flatten:{}", n),
        }
    }
}

impl FromStr for DampingRoundStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "exponential" | "exponential_backoff" | "backoff" => {
                Ok(DampingRoundStrategy::ExponentialBackoff)
            }
            _ => {
                let n = lower
                    .strip_prefix("flatten:")
                    .or_else(|| lower.strip_prefix("flatten_after_"))
                    .ok_or_else(|| {
                        Error::invalid_config("damping_round_strategy", format!("unknown strategy '{}'", s))
                    })?;
                n.parse::<usize>()
                    .map(DampingRoundStrategy::FlattenAfter)
                    .map_err(|e| Error::invalid_config("damping_round_strategy", e.to_string()))
            }
        }
    }
}

/// How per-column cardinality upper bounds follow a derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CardinalityUpperBoundMethod {
    /// Minimum of the input bound and the output row count
    #[default]
    Min,
    /// The output row count alone
    Output,
}

impl fmt::Display for CardinalityUpperBoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardinalityUpperBoundMethod::Min => write!(f, "min"),
            CardinalityUpperBoundMethod::Output => write!(f, "output"),
        }
    }
}

impl FromStr for CardinalityUpperBoundMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "min" | "minimum" => Ok(CardinalityUpperBoundMethod::Min),
            "output" => Ok(CardinalityUpperBoundMethod::Output),
            _ => Err(Error::invalid_config(
                "cardinality_upper_bound_method",
                format!("unknown method '{}'", s),
            )),
        }
    }
}

/// Configuration options for cardinality estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// How scale factors are folded before damping
    /// Default: ExponentialBackoff
    pub damping_round_strategy: DampingRoundStrategy,

    /// Damping factor for predicates on different columns of a filter
    /// Default: 0.75
    pub damping_factor_filter: f64,

    /// Damping factor for the predicates of one join
    /// Default: 0.01
    pub damping_factor_join: f64,

    /// Damping factor for grouping columns
    /// Default: 0.75
    pub damping_factor_group_by: f64,

    /// Selectivity assumed for predicates the histograms cannot model
    /// Default: 0.4
    pub default_selectivity: f64,

    /// Distinct count assumed for a column with no statistics
    /// Default: 1000
    pub default_distinct_values: f64,

    /// Scale factor of a join predicate that is not an equality
    /// Default: 3.0
    pub default_join_scale_factor: f64,

    /// Width in bytes of a column with no width information
    /// Default: 8.0
    pub default_column_width: f64,

    /// Smallest row count a derivation produces
    /// Default: 1.0
    pub minimum_row_floor: f64,

    /// How upper bounds of column cardinalities are derived
    /// Default: Min
    pub cardinality_upper_bound_method: CardinalityUpperBoundMethod,

    /// Clamp distinct counts to the output row count after a filter
    /// Default: false
    pub cap_ndvs_after_filter: bool,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            damping_round_strategy: DampingRoundStrategy::ExponentialBackoff,
            damping_factor_filter: 0.75,
            damping_factor_join: 0.01,
            damping_factor_group_by: 0.75,
            default_selectivity: 0.4,
            default_distinct_values: 1000.0,
            default_join_scale_factor: 3.0,
            default_column_width: 8.0,
            minimum_row_floor: 1.0,
            cardinality_upper_bound_method: CardinalityUpperBoundMethod::Min,
            cap_ndvs_after_filter: false,
        }
    }
}

impl StatisticsConfig {
    /// Creates a new StatisticsConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that multiplies scale factors without damping
    pub fn independent() -> Self {
        Self {
            damping_factor_filter: 1.0,
            damping_factor_join: 1.0,
            damping_factor_group_by: 1.0,
            ..Self::default()
        }
    }

    /// Creates a configuration that leans towards overestimating row counts
    pub fn conservative() -> Self {
        Self {
            damping_round_strategy: DampingRoundStrategy::FlattenAfter(2),
            damping_factor_filter: 0.5,
            damping_factor_group_by: 0.5,
            cap_ndvs_after_filter: true,
            ..Self::default()
        }
    }

    /// Builder method to set the damping round strategy
    pub fn with_damping_round_strategy(mut self, strategy: DampingRoundStrategy) -> Self {
        self.damping_round_strategy = strategy;
        self
    }

    /// Builder method to set the filter damping factor
    pub fn with_damping_factor_filter(mut self, factor: f64) -> Self {
        self.damping_factor_filter = factor;
        self
    }

    /// Builder method to set the join damping factor
    pub fn with_damping_factor_join(mut self, factor: f64) -> Self {
        self.damping_factor_join = factor;
        self
    }

    /// Builder method to set the group-by damping factor
    pub fn with_damping_factor_group_by(mut self, factor: f64) -> Self {
        self.damping_factor_group_by = factor;
        self
    }

    /// Builder method to set the default selectivity
    pub fn with_default_selectivity(mut self, selectivity: f64) -> Self {
        self.default_selectivity = selectivity;
        self
    }

    /// Builder method to set the default distinct count
    pub fn with_default_distinct_values(mut self, ndv: f64) -> Self {
        self.default_distinct_values = ndv;
        self
    }

    /// Builder method to set the default join scale factor
    pub fn with_default_join_scale_factor(mut self, factor: f64) -> Self {
        self.default_join_scale_factor = factor;
        self
    }

    /// Builder method to set the default column width
    pub fn with_default_column_width(mut self, width: f64) -> Self {
        self.default_column_width = width;
        self
    }

    /// Builder method to set the row floor
    pub fn with_minimum_row_floor(mut self, rows: f64) -> Self {
        self.minimum_row_floor = rows;
        self
    }

    /// Builder method to set the upper bound method
    pub fn with_cardinality_upper_bound_method(
        mut self,
        method: CardinalityUpperBoundMethod,
    ) -> Self {
        self.cardinality_upper_bound_method = method;
        self
    }

    /// Builder method to enable/disable NDV capping after filters
    pub fn with_cap_ndvs_after_filter(mut self, enabled: bool) -> Self {
        self.cap_ndvs_after_filter = enabled;
        self
    }

    /// Scale factor of a predicate with the default selectivity
    pub fn default_scale_factor(&self) -> f64 {
        1.0 / self.default_selectivity
    }

    /// Check that every option is inside its valid range
    pub fn validate(&self) -> Result<()> {
        fn unit(option: &str, v: f64) -> Result<()> {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(Error::invalid_config(option, format!("{} is not in (0, 1]", v)))
            }
        }
        fn at_least(option: &str, v: f64, min: f64) -> Result<()> {
            if v.is_finite() && v >= min {
                Ok(())
            } else {
                Err(Error::invalid_config(option, format!("{} is below {}", v, min)))
            }
        }

        unit("damping_factor_filter", self.damping_factor_filter)?;
        unit("damping_factor_join", self.damping_factor_join)?;
        unit("damping_factor_group_by", self.damping_factor_group_by)?;
        unit("default_selectivity", self.default_selectivity)?;
        at_least("default_distinct_values", self.default_distinct_values, MIN_DISTINCT)?;
        at_least("default_join_scale_factor", self.default_join_scale_factor, 1.0)?;
        at_least("default_column_width", self.default_column_width, 0.0)?;
        at_least("minimum_row_floor", self.minimum_row_floor, EPSILON)?;
        if let DampingRoundStrategy::FlattenAfter(0) = self.damping_round_strategy {
            return Err(Error::invalid_config(
                "damping_round_strategy",
                "flatten point must be at least 1",
            ));
        }
        Ok(())
    }

    /// Build a configuration from `CARDEST_*` environment variables
    ///
    /// Unset variables keep their default. The result is validated.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from a variable lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |option: &str| lookup(&format!("{}{}", ENV_PREFIX, option.to_uppercase()));
        let float = |option: &str, current: f64| -> Result<f64> {
            match get(option) {
                Some(raw) => raw
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| Error::invalid_config(option, format!("'{}': {}", raw, e))),
                None => Ok(current),
            }
        };

        let mut config = Self::default();
        if let Some(raw) = get("damping_round_strategy") {
            config.damping_round_strategy = raw.parse()?;
        }
        config.damping_factor_filter = float("damping_factor_filter", config.damping_factor_filter)?;
        config.damping_factor_join = float("damping_factor_join", config.damping_factor_join)?;
        config.damping_factor_group_by =
            float("damping_factor_group_by", config.damping_factor_group_by)?;
        config.default_selectivity = float("default_selectivity", config.default_selectivity)?;
        config.default_distinct_values =
            float("default_distinct_values", config.default_distinct_values)?;
        config.default_join_scale_factor =
            float("default_join_scale_factor", config.default_join_scale_factor)?;
        config.default_column_width = float("default_column_width", config.default_column_width)?;
        config.minimum_row_floor = float("minimum_row_floor", config.minimum_row_floor)?;
        if let Some(raw) = get("cardinality_upper_bound_method") {
            config.cardinality_upper_bound_method = raw.parse()?;
        }
        if let Some(raw) = get("cap_ndvs_after_filter") {
            config.cap_ndvs_after_filter = match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                _ => {
                    return Err(Error::invalid_config(
                        "cap_ndvs_after_filter",
                        format!("'{}' is not a boolean", raw),
                    ))
                }
            };
        }

        config.validate()?;
        Ok(config)
    }
}
