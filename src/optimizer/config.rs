//! Optimizer configuration.
//!
//! All thresholds are configuration with documented defaults; nothing numeric
//! is hard-coded in the solver or sequencer.
//!
//! # Example
//!
//! ```toml
//! reward_pool_rate = 1200.0
//! dust_threshold = 1.0
//! tolerance = 1e-6
//! max_iterations = 200
//! atomic_reallocation = true
//! gas_cost_per_action = 50.0
//! allocation_lifetime = 28.0
//! max_new_allocations = 10
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Configuration for one optimization run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OptimizerConfig {
    /// Rewards issued per epoch across all signalled targets (default: 1.0).
    /// A target's rate is `reward_pool_rate × signal / total_signal`.
    #[serde(default = "default_reward_pool_rate")]
    pub reward_pool_rate: f64,

    /// Network-wide signal used as the denominator of reward shares.
    /// Default: the sum of candidate signals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_network_signal: Option<f64>,

    /// Global cap applied to every eligible target's allocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_allocation_per_target: Option<f64>,

    /// Deltas with magnitude below this are not emitted (default: 1.0).
    #[serde(default = "default_dust_threshold")]
    pub dust_threshold: f64,

    /// Convergence tolerance on `budget − Σ allocation`, relative to the
    /// budget and absolute below a budget of 1 (default: 1e-6).
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Stake placed on a target nobody else allocates to. Any positive stake
    /// earns such a target its whole reward. Default: `dust_threshold`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncontested_seed: Option<f64>,

    /// Bisection iteration cap (default: 200).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Emit `Reallocate` instead of a Close + Open pair (default: false).
    #[serde(default)]
    pub atomic_reallocation: bool,

    /// Normal targets with less signal than this are excluded (default: 0).
    #[serde(default)]
    pub min_signal: f64,

    /// Transaction cost charged against each newly opened allocation (default: 0).
    /// Zero disables profitability pruning.
    #[serde(default)]
    pub gas_cost_per_action: f64,

    /// Epochs an allocation is expected to stay open (default: 28).
    #[serde(default = "default_allocation_lifetime")]
    pub allocation_lifetime: f64,

    /// Cap on how many targets may be newly opened in one run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_new_allocations: Option<usize>,
}

fn default_reward_pool_rate() -> f64 {
    1.0
}

fn default_dust_threshold() -> f64 {
    1.0
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_max_iterations() -> u32 {
    200
}

/// Default lifetime: 28 epochs, the protocol's maximum allocation lifetime.
fn default_allocation_lifetime() -> f64 {
    28.0
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            reward_pool_rate: default_reward_pool_rate(),
            total_network_signal: None,
            max_allocation_per_target: None,
            dust_threshold: default_dust_threshold(),
            tolerance: default_tolerance(),
            uncontested_seed: None,
            max_iterations: default_max_iterations(),
            atomic_reallocation: false,
            min_signal: 0.0,
            gas_cost_per_action: 0.0,
            allocation_lifetime: default_allocation_lifetime(),
            max_new_allocations: None,
        }
    }
}

impl OptimizerConfig {
    /// Parse from a TOML document, then validate.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::ConfigLoad(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Builder: set reward pool rate.
    pub fn with_reward_pool_rate(mut self, rate: f64) -> Self {
        self.reward_pool_rate = rate;
        self
    }

    /// Builder: set network-wide signal.
    pub fn with_total_network_signal(mut self, signal: f64) -> Self {
        self.total_network_signal = Some(signal);
        self
    }

    /// Builder: set global per-target cap.
    pub fn with_max_allocation_per_target(mut self, cap: f64) -> Self {
        self.max_allocation_per_target = Some(cap);
        self
    }

    /// Builder: set dust threshold.
    pub fn with_dust_threshold(mut self, dust: f64) -> Self {
        self.dust_threshold = dust;
        self
    }

    /// Builder: set bisection tolerance and iteration cap.
    pub fn with_convergence(mut self, tolerance: f64, max_iterations: u32) -> Self {
        self.tolerance = tolerance;
        self.max_iterations = max_iterations;
        self
    }

    /// Builder: set the stake placed on uncontested targets.
    pub fn with_uncontested_seed(mut self, seed: f64) -> Self {
        self.uncontested_seed = Some(seed);
        self
    }

    /// Stake placed on each uncontested target.
    pub fn seed_stake(&self) -> f64 {
        self.uncontested_seed.unwrap_or(self.dust_threshold)
    }

    /// Builder: enable atomic reallocation.
    pub fn with_atomic_reallocation(mut self, atomic: bool) -> Self {
        self.atomic_reallocation = atomic;
        self
    }

    /// Builder: set minimum signal for Normal targets.
    pub fn with_min_signal(mut self, min_signal: f64) -> Self {
        self.min_signal = min_signal;
        self
    }

    /// Builder: set gas cost per action and allocation lifetime.
    pub fn with_gas(mut self, gas_cost_per_action: f64, allocation_lifetime: f64) -> Self {
        self.gas_cost_per_action = gas_cost_per_action;
        self.allocation_lifetime = allocation_lifetime;
        self
    }

    /// Builder: cap new allocations.
    pub fn with_max_new_allocations(mut self, max: usize) -> Self {
        self.max_new_allocations = Some(max);
        self
    }

    /// Check every parameter is in range.
    pub fn validate(&self) -> Result<()> {
        require_non_negative("reward_pool_rate", self.reward_pool_rate)?;
        require_non_negative("dust_threshold", self.dust_threshold)?;
        require_non_negative("min_signal", self.min_signal)?;
        require_non_negative("gas_cost_per_action", self.gas_cost_per_action)?;
        if let Some(signal) = self.total_network_signal {
            require_non_negative("total_network_signal", signal)?;
        }
        if let Some(cap) = self.max_allocation_per_target {
            require_non_negative("max_allocation_per_target", cap)?;
        }
        if let Some(seed) = self.uncontested_seed {
            require_non_negative("uncontested_seed", seed)?;
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.allocation_lifetime.is_finite() && self.allocation_lifetime > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "allocation_lifetime must be positive, got {}",
                self.allocation_lifetime
            )));
        }
        Ok(())
    }
}

fn require_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{name} must be finite and non-negative, got {value}"
        )))
    }
}
