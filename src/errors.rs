use thiserror::Error;

use crate::types::{PolicyList, TargetId};

/// Main optimizer error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // === Policy errors (abort before solving) ===
    /// Target named by more than one policy list
    #[error("Conflicting policy for target {target}: listed in {}", format_lists(.lists))]
    ConflictingPolicy {
        target: TargetId,
        lists: Vec<PolicyList>,
    },

    /// Policy entry with an unusable value (e.g. negative pinned floor)
    #[error("Invalid policy for target {target}: {reason}")]
    InvalidPolicy { target: TargetId, reason: String },

    // === Solver errors ===
    /// Forced minimums exceed the budget
    #[error("Budget infeasible: forced minimums require {required}, budget is {budget} (shortfall {shortfall})")]
    BudgetInfeasible {
        required: f64,
        budget: f64,
        shortfall: f64,
    },

    // === Input validation ===
    /// Target violates a data-model invariant
    #[error("Invalid target {target}: {reason}")]
    InvalidTarget { target: TargetId, reason: String },

    /// Same target id appears twice in the snapshot
    #[error("Duplicate target id: {0}")]
    DuplicateTarget(TargetId),

    /// Budget is negative or not finite
    #[error("Invalid budget: {0}")]
    InvalidBudget(f64),

    /// Configuration value out of range
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    // === Action replay ===
    /// Action cannot be applied to the current positions
    #[error("Illegal action on target {target}: {reason}")]
    IllegalAction { target: TargetId, reason: String },

    // === Loading ===
    /// Config file could not be parsed
    #[error("Config load error: {0}")]
    ConfigLoad(String),

    /// Snapshot document could not be parsed
    #[error("Snapshot load error: {0}")]
    SnapshotLoad(String),

    /// Action sink rejected the plan
    #[error("Action sink error: {0}")]
    Sink(String),
}

fn format_lists(lists: &[PolicyList]) -> String {
    lists
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// Convenience constructors for common error patterns
impl Error {
    /// Create an invalid target error
    pub fn invalid_target(target: &TargetId, reason: impl Into<String>) -> Self {
        Error::InvalidTarget {
            target: target.clone(),
            reason: reason.into(),
        }
    }

    /// Create an invalid policy error
    pub fn invalid_policy(target: &TargetId, reason: impl Into<String>) -> Self {
        Error::InvalidPolicy {
            target: target.clone(),
            reason: reason.into(),
        }
    }

    /// Create an illegal action error
    pub fn illegal_action(target: &TargetId, reason: impl Into<String>) -> Self {
        Error::IllegalAction {
            target: target.clone(),
            reason: reason.into(),
        }
    }

    /// Create a budget infeasibility error; shortfall is derived
    pub fn budget_infeasible(required: f64, budget: f64) -> Self {
        Error::BudgetInfeasible {
            required,
            budget,
            shortfall: required - budget,
        }
    }
}

/// Optimizer result alias
pub type Result<T> = std::result::Result<T, Error>;
