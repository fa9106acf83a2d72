//! Allocation diff.
//!
//! Compares the solved vector with the current positions and yields one
//! signed delta per target that actually changes. Deltas smaller than the
//! dust threshold are suppressed instead of becoming no-op actions.

use std::collections::BTreeSet;

use tracing::trace;

use crate::types::{AllocationVector, TargetId};

/// Change for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub target_id: TargetId,
    pub current: f64,
    pub solved: f64,
}

impl Delta {
    /// `solved − current`.
    pub fn amount(&self) -> f64 {
        self.solved - self.current
    }

    /// Negative delta: the change releases stake.
    pub fn frees_capital(&self) -> bool {
        self.amount() < 0.0
    }
}

/// Deltas ordered by target id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationDiff {
    pub deltas: Vec<Delta>,
    /// Non-zero deltas dropped as dust.
    pub suppressed: usize,
}

impl AllocationDiff {
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Net stake the diff consumes (negative when it frees stake).
    pub fn net_change(&self) -> f64 {
        self.deltas.iter().map(Delta::amount).sum()
    }
}

/// Diff `solved` against `current` over the union of their targets.
pub fn diff(
    solved: &AllocationVector,
    current: &AllocationVector,
    dust_threshold: f64,
) -> AllocationDiff {
    let ids: BTreeSet<&TargetId> = solved.ids().chain(current.ids()).collect();
    let mut result = AllocationDiff::default();

    for id in ids {
        let delta = Delta {
            target_id: id.clone(),
            current: current.get(id),
            solved: solved.get(id),
        };
        let change = delta.amount();
        if change == 0.0 {
            continue;
        }
        if change.abs() < dust_threshold {
            trace!(target_id = %id, change, "Delta below dust threshold");
            result.suppressed += 1;
            continue;
        }
        result.deltas.push(delta);
    }

    result
}
