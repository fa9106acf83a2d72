#![deny(unreachable_pub)]

// Core modules
mod errors;

// Shared data model
pub mod types;

// Feature modules
pub mod optimizer;

// Re-exports
pub use errors::{Error, Result};
pub use optimizer::{
    diff, normalize, simulate, ActionSequence, ActionSequencer, ActionSink, AllocationDiff,
    AllocationPlan, CapitalTrace, ConstraintRecord, ConstraintSet, ConstraintStatus, Delta,
    Optimizer, OptimizerConfig, PruneOutcome, Pruner, RewardModel, Solution, SolveStatus,
    TargetEconomics, VecSink, WaterFillingSolver,
};
pub use types::*;
