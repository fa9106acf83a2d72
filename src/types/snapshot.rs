//! Immutable input snapshot handed to the optimizer.
//!
//! The snapshot is the data contract with whatever fetched the network state:
//! candidate targets with this indexer's current positions, the operator's
//! policy lists, and either an explicit budget or the idle stake from which
//! the budget is derived.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::allocation::Budget;
use super::policy::PolicyLists;
use super::target::Target;
use crate::errors::{Error, Result};

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub targets: Vec<Target>,
    #[serde(default)]
    pub policy: PolicyLists,
    /// Stake not currently allocated anywhere.
    #[serde(default)]
    pub idle_stake: f64,
    /// Explicit budget; overrides `idle_stake + Σ current` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
}

impl Snapshot {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets,
            ..Default::default()
        }
    }

    /// Builder: set policy lists.
    pub fn with_policy(mut self, policy: PolicyLists) -> Self {
        self.policy = policy;
        self
    }

    /// Builder: set idle stake.
    pub fn with_idle_stake(mut self, idle: f64) -> Self {
        self.idle_stake = idle;
        self
    }

    /// Builder: set an explicit budget.
    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Parse a JSON snapshot document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::SnapshotLoad(e.to_string()))
    }

    /// Parse a TOML snapshot document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::SnapshotLoad(e.to_string()))
    }

    /// Validate every target and reject duplicate ids.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for target in &self.targets {
            target.validate()?;
            if !seen.insert(&target.id) {
                return Err(Error::DuplicateTarget(target.id.clone()));
            }
        }
        if !self.idle_stake.is_finite() || self.idle_stake < 0.0 {
            return Err(Error::InvalidBudget(self.idle_stake));
        }
        Ok(())
    }

    /// Budget for this run.
    pub fn resolve_budget(&self) -> Result<Budget> {
        match self.budget {
            Some(amount) => Budget::new(amount),
            None => Budget::from_stake(self.idle_stake, &self.targets),
        }
    }

    /// Stake not tied up in current positions, given the resolved budget.
    ///
    /// Never negative: an explicit budget below the current positions leaves
    /// no idle capital, and the shortfall has to come from closes.
    pub fn idle_capital(&self, budget: Budget) -> f64 {
        let allocated: f64 = self.targets.iter().map(|t| t.current_allocation).sum();
        (budget.amount() - allocated).max(0.0)
    }
}
