//! Budget and allocation vector.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::target::{Target, TargetId};
use crate::errors::{Error, Result};

/// Total stake a run may have allocated, frozen positions included.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Budget(f64);

impl Budget {
    pub fn new(amount: f64) -> Result<Self> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(Error::InvalidBudget(amount));
        }
        Ok(Self(amount))
    }

    /// Idle stake plus everything currently allocated.
    ///
    /// Frozen positions stay in the sum: they consume exactly what they hold,
    /// so the budget left for solving is idle stake plus the non-frozen
    /// positions that can be released.
    pub fn from_stake(idle_stake: f64, targets: &[Target]) -> Result<Self> {
        let allocated: f64 = targets.iter().map(|t| t.current_allocation).sum();
        Self::new(idle_stake + allocated)
    }

    pub fn amount(&self) -> f64 {
        self.0
    }
}

/// Solved stake per target.
///
/// Backed by a `BTreeMap` so iteration is ordered by target id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationVector(BTreeMap<TargetId, f64>);

impl AllocationVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: TargetId, amount: f64) {
        debug_assert!(amount >= 0.0, "allocation must be non-negative");
        self.0.insert(id, amount);
    }

    /// Amount for a target; absent targets hold zero.
    pub fn get(&self, id: &TargetId) -> f64 {
        self.0.get(id).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, id: &TargetId) -> bool {
        self.0.contains_key(id)
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TargetId, f64)> {
        self.0.iter().map(|(id, &amount)| (id, amount))
    }

    pub fn ids(&self) -> impl Iterator<Item = &TargetId> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Targets holding a strictly positive amount.
    pub fn nonzero_count(&self) -> usize {
        self.0.values().filter(|&&a| a > 0.0).count()
    }

    /// Current allocations of a target list.
    pub fn from_current(targets: &[Target]) -> Self {
        Self(
            targets
                .iter()
                .map(|t| (t.id.clone(), t.current_allocation))
                .collect(),
        )
    }
}

impl FromIterator<(TargetId, f64)> for AllocationVector {
    fn from_iter<I: IntoIterator<Item = (TargetId, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
