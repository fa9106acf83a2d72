//! End-to-end optimization pipeline.
//!
//! ```text
//! Snapshot ─► normalize ─► solve ─► prune ─► diff ─► sequence ─► AllocationPlan
//!               │            ▲
//!               └─ RewardModel
//! ```
//!
//! Each run takes an immutable snapshot and returns a fresh plan; nothing is
//! shared between runs.

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::Result;
use crate::optimizer::config::OptimizerConfig;
use crate::optimizer::constraints::normalize;
use crate::optimizer::diff::diff;
use crate::optimizer::pruning::Pruner;
use crate::optimizer::reward::RewardModel;
use crate::optimizer::sequencer::ActionSequencer;
use crate::optimizer::sink::ActionSink;
use crate::optimizer::solver::{SolveStatus, WaterFillingSolver};
use crate::types::{Action, AllocationVector, Snapshot, TargetId};

/// Solved allocation and the ordered actions that reach it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationPlan {
    pub allocations: AllocationVector,
    pub actions: Vec<Action>,
    pub status: SolveStatus,
    /// Budget that could not be spent (every target saturated).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unspent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_level: Option<f64>,
    pub budget: f64,
    /// Capital not tied up in positions before the first action.
    pub idle_capital: f64,
    /// Σ reward per epoch of the solved allocation.
    pub expected_reward: f64,
    /// Σ reward per epoch of the current allocation.
    pub current_reward: f64,
    /// Deltas dropped as dust.
    pub suppressed_deltas: usize,
    /// Targets dropped by gas or new-allocation pruning.
    pub pruned: Vec<TargetId>,
    /// Targets whose action was trimmed by the capital guard.
    pub trimmed: Vec<TargetId>,
}

impl AllocationPlan {
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Hand the ordered actions to a sink.
    pub fn submit<S: ActionSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        sink.submit(&self.actions)
    }
}

/// Runs the full pipeline with one configuration.
#[derive(Debug, Clone)]
pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    /// Create an optimizer; the configuration is validated up front.
    pub fn new(config: OptimizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Compute the allocation plan for a snapshot.
    ///
    /// # Errors
    /// Invalid targets or budget, `ConflictingPolicy`, `BudgetInfeasible`.
    /// Non-convergence is not an error; see [`AllocationPlan::status`].
    pub fn optimize(&self, snapshot: &Snapshot) -> Result<AllocationPlan> {
        snapshot.validate()?;
        let budget = snapshot.resolve_budget()?;

        let model = RewardModel::from_targets(&snapshot.targets, &self.config);
        let constraints = normalize(&snapshot.targets, &snapshot.policy, &self.config)?;
        let solver = WaterFillingSolver::from_config(&self.config);
        let current = AllocationVector::from_current(&snapshot.targets);

        let mut solution = solver.solve(&model, &constraints, budget)?;
        let mut pruned = Vec::new();

        let pruner = Pruner::from_config(&self.config);
        if pruner.is_active() {
            let outcome = pruner.prune(&solver, &model, constraints, budget, &current, solution)?;
            solution = outcome.solution;
            pruned = outcome.pruned;
        }

        let diff = diff(&solution.allocations, &current, self.config.dust_threshold);
        let idle_capital = snapshot.idle_capital(budget);
        let sequence = ActionSequencer::from_config(&self.config).sequence(&diff, idle_capital);

        let plan = AllocationPlan {
            expected_reward: model.total_value(&solution.allocations),
            current_reward: model.total_value(&current),
            allocations: solution.allocations,
            actions: sequence.actions,
            status: solution.status,
            unspent: solution.unspent,
            water_level: solution.water_level,
            budget: budget.amount(),
            idle_capital,
            suppressed_deltas: diff.suppressed,
            pruned,
            trimmed: sequence.trimmed,
        };

        if let SolveStatus::NonConverged { iterations, residual } = plan.status {
            warn!(iterations, residual, "Plan built from a non-converged solve");
        }
        info!(
            targets = snapshot.targets.len(),
            budget = plan.budget,
            allocated = plan.allocations.total(),
            actions = plan.actions.len(),
            expected_reward = plan.expected_reward,
            current_reward = plan.current_reward,
            "Allocation plan ready"
        );

        Ok(plan)
    }
}
