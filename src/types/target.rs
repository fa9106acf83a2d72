//! Target identifiers and candidate state.
//!
//! A target is an allocation destination (a subgraph deployment) competing
//! for stake. `TargetId` is ordered so every map keyed by it iterates in a
//! reproducible order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Identifier for a target (e.g. an IPFS deployment hash).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetId({})", self.0)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Candidate target as observed by the data-fetching collaborator.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: TargetId,
    /// Curation signal; determines the share of the reward pool.
    pub signal: f64,
    /// Stake allocated by other indexers.
    pub competing_stake: f64,
    /// This indexer's existing stake on the target.
    #[serde(default)]
    pub current_allocation: f64,
}

impl Target {
    pub fn new(id: impl Into<TargetId>, signal: f64, competing_stake: f64) -> Self {
        Self {
            id: id.into(),
            signal,
            competing_stake,
            current_allocation: 0.0,
        }
    }

    /// Builder: set the existing allocation.
    pub fn with_current_allocation(mut self, amount: f64) -> Self {
        self.current_allocation = amount;
        self
    }

    /// Check the data-model invariants: every quantity finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        check_quantity(&self.id, "signal", self.signal)?;
        check_quantity(&self.id, "competingStake", self.competing_stake)?;
        check_quantity(&self.id, "currentAllocation", self.current_allocation)
    }
}

fn check_quantity(id: &TargetId, field: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::invalid_target(id, format!("{field} is not finite")));
    }
    if value < 0.0 {
        return Err(Error::invalid_target(
            id,
            format!("{field} is negative ({value})"),
        ));
    }
    Ok(())
}
