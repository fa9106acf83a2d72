//! Discrete allocation actions emitted for an external executor.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::target::TargetId;

/// Kind of allocation operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Open a new allocation from zero.
    Open,
    /// Change an existing allocation in one atomic step.
    Reallocate,
    /// Close an existing allocation, freeing its stake.
    Close,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Open => "open",
            ActionKind::Reallocate => "reallocate",
            ActionKind::Close => "close",
        };
        f.write_str(name)
    }
}

/// One operation on one target's allocation.
///
/// `amount` is always non-negative. For `Open` and `Reallocate` it is the new
/// total allocation; for `Close` it is the stake being released.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub kind: ActionKind,
    pub target_id: TargetId,
    pub amount: f64,
}

impl Action {
    pub fn open(target_id: TargetId, amount: f64) -> Self {
        Self {
            kind: ActionKind::Open,
            target_id,
            amount,
        }
    }

    pub fn reallocate(target_id: TargetId, amount: f64) -> Self {
        Self {
            kind: ActionKind::Reallocate,
            target_id,
            amount,
        }
    }

    pub fn close(target_id: TargetId, amount: f64) -> Self {
        Self {
            kind: ActionKind::Close,
            target_id,
            amount,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:.6}", self.kind, self.target_id, self.amount)
    }
}
