//! Serializable optimizer configuration.
//!
//! One TOML document drives a whole optimization session:
//!
//! ```toml
//! [genetic]
//! population_size = 50
//! generations = 100
//! seed = 42
//!
//! [fitness.weights]
//! sharpe = 0.4
//!
//! [rule]
//! ma_period = 50
//! ```
//!
//! Every section is optional and falls back to its defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stratlab_core::accel::DualPathExecutor;
use stratlab_core::components::{DynamicPeriodRule, RuleParams};
use stratlab_core::engine::SimulatorConfig;
use stratlab_core::gene::GeneDomain;
use thiserror::Error;

use crate::fitness::FitnessConfig;
use crate::genetic::GeneticConfig;

/// Unique identifier for an optimization run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Accelerated-path switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelConfig {
    pub enabled: bool,
}

impl Default for AccelConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub genetic: GeneticConfig,
    pub fitness: FitnessConfig,
    pub domain: GeneDomain,
    pub backtest: SimulatorConfig,
    pub rule: RuleParams,
    pub dynamic: DynamicPeriodRule,
    pub accel: AccelConfig,
}

impl OptimizerConfig {
    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.genetic.validate()?;
        self.fitness.validate()?;
        self.domain
            .validate()
            .map_err(|e| ConfigError::invalid("domain", e.to_string()))?;
        validate_backtest(&self.backtest)?;
        validate_rule(&self.rule)?;
        validate_dynamic(&self.dynamic)?;
        Ok(())
    }

    /// Executor for rule evaluation, honoring `[accel] enabled`.
    pub fn executor(&self) -> DualPathExecutor {
        DualPathExecutor::from_flag(self.accel.enabled)
    }

    /// Deterministic hash of the canonical JSON form.
    ///
    /// Two sessions with identical configs share a RunId.
    pub fn run_id(&self) -> RunId {
        // Plain data with string keys; serialization does not fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}

fn positive(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be positive, got {v}")))
    }
}

fn validate_backtest(c: &SimulatorConfig) -> Result<(), ConfigError> {
    positive("backtest.initial_equity", c.initial_equity)?;
    positive("backtest.position_size", c.position_size)
}

fn validate_rule(r: &RuleParams) -> Result<(), ConfigError> {
    if r.ma_period < 1 {
        return Err(ConfigError::invalid("rule.ma_period", "must be >= 1"));
    }
    if r.osc_period < 1 {
        return Err(ConfigError::invalid("rule.osc_period", "must be >= 1"));
    }
    if !(0.0..=100.0).contains(&r.oversold) {
        return Err(ConfigError::invalid(
            "rule.oversold",
            format!("must be in [0, 100], got {}", r.oversold),
        ));
    }
    positive("rule.risk_reward", r.risk_reward)?;
    if !(r.base_stop_pct > 0.0 && r.base_stop_pct < 1.0) {
        return Err(ConfigError::invalid(
            "rule.base_stop_pct",
            format!("must be in (0, 1), got {}", r.base_stop_pct),
        ));
    }
    if !(r.gap_threshold.is_finite() && r.gap_threshold >= 0.0) {
        return Err(ConfigError::invalid(
            "rule.gap_threshold",
            format!("must be >= 0, got {}", r.gap_threshold),
        ));
    }
    Ok(())
}

fn validate_dynamic(d: &DynamicPeriodRule) -> Result<(), ConfigError> {
    for (field, min, max) in [
        ("dynamic.ma", d.ma_min, d.ma_max),
        ("dynamic.osc", d.osc_min, d.osc_max),
    ] {
        if min < 1 || min > max {
            return Err(ConfigError::invalid(
                field,
                format!("period bounds must satisfy 1 <= min <= max, got [{min}, {max}]"),
            ));
        }
    }
    for (field, scale) in [
        ("dynamic.ma_days_scale", d.ma_days_scale),
        ("dynamic.osc_days_scale", d.osc_days_scale),
    ] {
        if !(scale.is_finite() && scale >= 0.0) {
            return Err(ConfigError::invalid(field, format!("must be >= 0, got {scale}")));
        }
    }
    Ok(())
}
