//! Per-target reward model.
//!
//! With everything else fixed, a target with reward rate `r` and competing
//! stake `Ω` pays this indexer
//!
//! ```text
//! value(a)    = r · a / (a + Ω)
//! marginal(a) = r · Ω / (a + Ω)²
//! a(m)        = max(0, √(r · Ω / m) − Ω)      // inverse of marginal
//! ```
//!
//! `value` is increasing and strictly concave for `Ω > 0`, so the marginal is
//! strictly decreasing and the closed-form inverse lets the solver evaluate a
//! target in O(1) per water level instead of searching per target.

use std::collections::BTreeMap;

use crate::optimizer::config::OptimizerConfig;
use crate::types::{AllocationVector, Target, TargetId};

/// Reward parameters of one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetEconomics {
    /// Share of the reward pool earned per epoch by the whole target.
    pub reward_rate: f64,
    /// Stake other indexers hold on the target.
    pub competing_stake: f64,
}

impl TargetEconomics {
    pub fn new(reward_rate: f64, competing_stake: f64) -> Self {
        Self {
            reward_rate,
            competing_stake,
        }
    }

    /// Reward earned with allocation `a`.
    pub fn value(&self, a: f64) -> f64 {
        let total = a + self.competing_stake;
        if total <= 0.0 {
            return 0.0;
        }
        self.reward_rate * a / total
    }

    /// Derivative of `value` at `a`.
    pub fn marginal(&self, a: f64) -> f64 {
        let total = a + self.competing_stake;
        if total <= 0.0 {
            return 0.0;
        }
        self.reward_rate * self.competing_stake / (total * total)
    }

    /// Allocation at which the marginal reward equals `m`, clamped at zero.
    ///
    /// Unbounded as `m → 0` for a responsive target; always zero for a
    /// target without rate or without competing stake.
    pub fn amount_for_marginal(&self, m: f64) -> f64 {
        let k = self.reward_rate * self.competing_stake;
        if k <= 0.0 {
            return 0.0;
        }
        if m <= 0.0 {
            return f64::INFINITY;
        }
        ((k / m).sqrt() - self.competing_stake).max(0.0)
    }

    /// Whether extra stake changes the reward at all.
    pub fn is_responsive(&self) -> bool {
        self.reward_rate > 0.0 && self.competing_stake > 0.0
    }

    /// Rewarded but with no competing stake: the first unit earns all of `r`.
    pub fn is_uncontested(&self) -> bool {
        self.reward_rate > 0.0 && self.competing_stake <= 0.0
    }
}

/// Reward parameters for every target in a snapshot.
#[derive(Debug, Clone, Default)]
pub struct RewardModel {
    economics: BTreeMap<TargetId, TargetEconomics>,
}

impl RewardModel {
    /// Derive reward rates from signal shares of the pool.
    pub fn from_targets(targets: &[Target], config: &OptimizerConfig) -> Self {
        let total_signal = config
            .total_network_signal
            .unwrap_or_else(|| targets.iter().map(|t| t.signal).sum());

        let economics = targets
            .iter()
            .map(|t| {
                let rate = if total_signal > 0.0 {
                    config.reward_pool_rate * t.signal / total_signal
                } else {
                    0.0
                };
                (t.id.clone(), TargetEconomics::new(rate, t.competing_stake))
            })
            .collect();

        Self { economics }
    }

    pub fn insert(&mut self, id: TargetId, economics: TargetEconomics) {
        self.economics.insert(id, economics);
    }

    pub fn economics(&self, id: &TargetId) -> Option<TargetEconomics> {
        self.economics.get(id).copied()
    }

    /// Reward of `id` at allocation `a`; unknown targets earn nothing.
    pub fn value(&self, id: &TargetId, a: f64) -> f64 {
        self.economics(id).map_or(0.0, |e| e.value(a))
    }

    pub fn marginal(&self, id: &TargetId, a: f64) -> f64 {
        self.economics(id).map_or(0.0, |e| e.marginal(a))
    }

    pub fn amount_for_marginal(&self, id: &TargetId, m: f64) -> f64 {
        self.economics(id).map_or(0.0, |e| e.amount_for_marginal(m))
    }

    /// Total reward of an allocation vector.
    pub fn total_value(&self, allocations: &AllocationVector) -> f64 {
        allocations.iter().map(|(id, a)| self.value(id, a)).sum()
    }
}
