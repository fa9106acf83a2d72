//! Constraint normalization.
//!
//! Merges the candidate targets with the operator's policy lists into one
//! [`ConstraintRecord`] per target. The resulting [`ConstraintSet`] is built
//! once per run and handed to the solver by value; the solver never consults
//! the policy lists itself.
//!
//! # Precedence
//!
//! 1. A target named by more than one list aborts the run (`ConflictingPolicy`)
//! 2. Blacklisted → `[0, 0]`
//! 3. Frozen → `[current, current]`
//! 4. Pinned → `[floor, cap]`
//! 5. Whitelisted → `[0, cap]`
//! 6. Unlisted → `[0, cap]`, or `[0, 0]` when a non-empty whitelist exists
//!
//! Pruning later moves dropped Normal targets to `Pruned` with `[0, 0]`, so
//! an operator blacklist stays distinguishable from an optimizer decision.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::errors::{Error, Result};
use crate::optimizer::config::OptimizerConfig;
use crate::types::{PolicyLists, Target, TargetId};

/// Policy status of a target for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintStatus {
    Normal,
    Blacklisted,
    Pinned,
    Frozen,
    /// Normal target dropped by pruning.
    Pruned,
}

/// Box constraint on one target's allocation.
///
/// Invariant: `max_allocation >= min_allocation >= 0`. `max_allocation` may
/// be infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintRecord {
    pub status: ConstraintStatus,
    pub min_allocation: f64,
    pub max_allocation: f64,
}

impl ConstraintRecord {
    pub fn normal(cap: Option<f64>) -> Self {
        Self {
            status: ConstraintStatus::Normal,
            min_allocation: 0.0,
            max_allocation: cap.unwrap_or(f64::INFINITY),
        }
    }

    pub fn blacklisted() -> Self {
        Self {
            status: ConstraintStatus::Blacklisted,
            min_allocation: 0.0,
            max_allocation: 0.0,
        }
    }

    pub fn pruned() -> Self {
        Self {
            status: ConstraintStatus::Pruned,
            min_allocation: 0.0,
            max_allocation: 0.0,
        }
    }

    pub fn frozen(current: f64) -> Self {
        Self {
            status: ConstraintStatus::Frozen,
            min_allocation: current,
            max_allocation: current,
        }
    }

    /// Pinned floor; a floor above the global cap lifts the cap to the floor.
    pub fn pinned(floor: f64, cap: Option<f64>) -> Self {
        let max = cap.map_or(f64::INFINITY, |c| c.max(floor));
        Self {
            status: ConstraintStatus::Pinned,
            min_allocation: floor,
            max_allocation: max,
        }
    }

    /// Bounds collapse to a single point; nothing to solve.
    pub fn is_fixed(&self) -> bool {
        self.min_allocation >= self.max_allocation
    }

    pub fn is_excluded(&self) -> bool {
        self.max_allocation <= 0.0
    }

    pub fn clamp(&self, a: f64) -> f64 {
        a.max(self.min_allocation).min(self.max_allocation)
    }
}

/// Constraint records for every target, ordered by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    records: BTreeMap<TargetId, ConstraintRecord>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: TargetId, record: ConstraintRecord) {
        self.records.insert(id, record);
    }

    pub fn get(&self, id: &TargetId) -> Option<&ConstraintRecord> {
        self.records.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TargetId, &ConstraintRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop a target from consideration by marking it `Pruned`.
    ///
    /// Only Normal targets can be excluded; forced statuses are left alone and
    /// `false` is returned.
    pub fn exclude(&mut self, id: &TargetId) -> bool {
        match self.records.get_mut(id) {
            Some(record) if record.status == ConstraintStatus::Normal => {
                *record = ConstraintRecord::pruned();
                true
            }
            _ => false,
        }
    }

    /// Targets the solver can move.
    pub fn eligible_count(&self) -> usize {
        self.records.values().filter(|r| !r.is_fixed()).count()
    }

    /// Sum of forced minimums, frozen amounts included.
    pub fn required_total(&self) -> f64 {
        self.records.values().map(|r| r.min_allocation).sum()
    }
}

/// Build one constraint record per target.
pub fn normalize(
    targets: &[Target],
    policy: &PolicyLists,
    config: &OptimizerConfig,
) -> Result<ConstraintSet> {
    let cap = config.max_allocation_per_target;
    let mut set = ConstraintSet::new();

    for target in targets {
        let lists = policy.lists_for(&target.id);
        if lists.len() > 1 {
            return Err(Error::ConflictingPolicy {
                target: target.id.clone(),
                lists,
            });
        }

        let record = if policy.blacklist.contains(&target.id) {
            ConstraintRecord::blacklisted()
        } else if policy.frozen.contains(&target.id) {
            ConstraintRecord::frozen(target.current_allocation)
        } else if let Some(&floor) = policy.pinned.get(&target.id) {
            if !floor.is_finite() || floor < 0.0 {
                return Err(Error::invalid_policy(
                    &target.id,
                    format!("pinned floor must be finite and non-negative, got {floor}"),
                ));
            }
            ConstraintRecord::pinned(floor, cap)
        } else if policy.whitelist.contains(&target.id) {
            ConstraintRecord::normal(cap)
        } else if policy.has_whitelist() {
            debug!(target_id = %target.id, "Not whitelisted; excluded");
            ConstraintRecord::blacklisted()
        } else if target.signal < config.min_signal {
            debug!(
                target_id = %target.id,
                signal = target.signal,
                min_signal = config.min_signal,
                "Signal below minimum; excluded"
            );
            ConstraintRecord::blacklisted()
        } else {
            ConstraintRecord::normal(cap)
        };

        set.insert(target.id.clone(), record);
    }

    for id in policy.all_ids() {
        if set.get(id).is_none() {
            warn!(target_id = %id, "Policy names a target missing from the snapshot; ignored");
        }
    }

    Ok(set)
}
