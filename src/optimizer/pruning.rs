//! Post-solve pruning of new allocations.
//!
//! Opening an allocation costs a transaction. Two optional passes drop Normal
//! targets that the first solve would newly open and re-solve without them:
//!
//! - **Profitability**: expected reward over the allocation lifetime below the
//!   gas cost of opening it
//! - **New-allocation cap**: more new openings than `max_new_allocations`;
//!   the highest-reward ones are kept (ties broken by target id)
//!
//! Pinned and frozen targets are never pruned.

use std::cmp::Ordering;

use tracing::{debug, info};

use crate::errors::Result;
use crate::optimizer::config::OptimizerConfig;
use crate::optimizer::constraints::{ConstraintSet, ConstraintStatus};
use crate::optimizer::reward::RewardModel;
use crate::optimizer::solver::{Solution, WaterFillingSolver};
use crate::types::{AllocationVector, Budget, TargetId};

/// Result of pruning: the final solve and what was dropped.
#[derive(Debug, Clone)]
pub struct PruneOutcome {
    pub solution: Solution,
    pub constraints: ConstraintSet,
    /// Targets excluded by pruning, in the order they were dropped.
    pub pruned: Vec<TargetId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pruner {
    gas_cost_per_action: f64,
    allocation_lifetime: f64,
    max_new_allocations: Option<usize>,
}

impl Pruner {
    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self {
            gas_cost_per_action: config.gas_cost_per_action,
            allocation_lifetime: config.allocation_lifetime,
            max_new_allocations: config.max_new_allocations,
        }
    }

    pub fn is_active(&self) -> bool {
        self.gas_cost_per_action > 0.0 || self.max_new_allocations.is_some()
    }

    /// Prune until neither pass drops a target, re-solving after each drop.
    pub fn prune(
        &self,
        solver: &WaterFillingSolver,
        model: &RewardModel,
        mut constraints: ConstraintSet,
        budget: Budget,
        current: &AllocationVector,
        mut solution: Solution,
    ) -> Result<PruneOutcome> {
        let mut pruned = Vec::new();

        // Every round excludes at least one target, so this bounds the loop
        for _ in 0..=constraints.len() {
            let openings = new_openings(&constraints, current, &solution, model);

            let mut drop = self.unprofitable(&openings);
            if drop.is_empty() {
                drop = self.over_cap(&openings);
            }
            if drop.is_empty() {
                break;
            }

            for id in &drop {
                if constraints.exclude(id) {
                    debug!(target_id = %id, "Pruned new allocation");
                }
            }
            pruned.extend(drop);
            solution = solver.solve(model, &constraints, budget)?;
        }

        if !pruned.is_empty() {
            info!(count = pruned.len(), "Pruned new allocations and re-solved");
        }

        Ok(PruneOutcome {
            solution,
            constraints,
            pruned,
        })
    }

    fn unprofitable(&self, openings: &[Opening]) -> Vec<TargetId> {
        if self.gas_cost_per_action <= 0.0 {
            return Vec::new();
        }
        openings
            .iter()
            .filter(|o| o.reward * self.allocation_lifetime < self.gas_cost_per_action)
            .map(|o| o.id.clone())
            .collect()
    }

    fn over_cap(&self, openings: &[Opening]) -> Vec<TargetId> {
        let Some(max) = self.max_new_allocations else {
            return Vec::new();
        };
        if openings.len() <= max {
            return Vec::new();
        }
        let mut ranked: Vec<&Opening> = openings.iter().collect();
        ranked.sort_by(|a, b| {
            b.reward
                .partial_cmp(&a.reward)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked[max..].iter().map(|o| o.id.clone()).collect()
    }
}

struct Opening {
    id: TargetId,
    reward: f64,
}

/// Normal targets with no current position that the solution would open.
fn new_openings(
    constraints: &ConstraintSet,
    current: &AllocationVector,
    solution: &Solution,
    model: &RewardModel,
) -> Vec<Opening> {
    constraints
        .iter()
        .filter(|(_, record)| record.status == ConstraintStatus::Normal)
        .filter_map(|(id, _)| {
            let solved = solution.allocations.get(id);
            (current.get(id) <= 0.0 && solved > 0.0).then(|| Opening {
                id: id.clone(),
                reward: model.value(id, solved),
            })
        })
        .collect()
}
