//! Stake allocation optimizer.
//!
//! Computes the reward-maximizing split of an indexer's stake across
//! deployments and the ordered actions that move current positions there.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Optimizer (pipeline)                     │
//! │  - Config validation     - Snapshot validation              │
//! │  - Reward summary        - Structured plan logging          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌───────┐  │
//! │  │ normalize  │─►│ WaterFill  │─►│   diff     │─►│ Seq   │  │
//! │  │ policy →   │  │ λ bisect   │  │ dust       │  │ close │  │
//! │  │ bounds     │  │ + pruning  │  │ filter     │  │ first │  │
//! │  └────────────┘  └────────────┘  └────────────┘  └───────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - **normalize**: Policy lists and caps → per-target bounds
//! - **RewardModel**: Closed-form `r·a/(a+Ω)` value and marginal
//! - **WaterFillingSolver**: Shared-marginal allocation under the budget
//! - **Pruner**: Gas profitability and new-allocation cap
//! - **diff**: Signed per-target deltas with dust suppression
//! - **ActionSequencer**: Freeing actions before consuming ones
//! - **simulate**: Capital replay of an action list
//!
//! # Usage
//!
//! ```ignore
//! use allocation_optimizer::{Optimizer, OptimizerConfig, Snapshot, Target};
//!
//! let snapshot = Snapshot::new(vec![
//!     Target::new("QmA", 100.0, 100.0).with_current_allocation(250.0),
//!     Target::new("QmB", 100.0, 1000.0),
//! ])
//! .with_idle_stake(250.0);
//!
//! let plan = Optimizer::new(OptimizerConfig::default())?.optimize(&snapshot)?;
//! for action in &plan.actions {
//!     println!("{action}");
//! }
//! ```

mod config;
mod constraints;
mod diff;
mod plan;
mod pruning;
mod reward;
mod sequencer;
mod simulate;
mod sink;
mod solver;

#[cfg(test)]
mod tests;

pub use config::OptimizerConfig;
pub use constraints::{normalize, ConstraintRecord, ConstraintSet, ConstraintStatus};
pub use diff::{diff, AllocationDiff, Delta};
pub use plan::{AllocationPlan, Optimizer};
pub use pruning::{PruneOutcome, Pruner};
pub use reward::{RewardModel, TargetEconomics};
pub use sequencer::{ActionSequence, ActionSequencer};
pub use simulate::{simulate, CapitalTrace};
pub use sink::{ActionSink, VecSink};
pub use solver::{Solution, SolveStatus, WaterFillingSolver};
