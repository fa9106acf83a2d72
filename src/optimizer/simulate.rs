//! Sequential replay of an action list.
//!
//! Applies actions in emission order against the current positions and
//! tracks available capital at every prefix. Used to check that a plan is
//! safe for a naive executor before it is handed off.

use std::collections::BTreeMap;

use crate::errors::{Error, Result};
use crate::types::{Action, ActionKind, AllocationVector, TargetId};

/// Available capital across a replay.
#[derive(Debug, Clone, PartialEq)]
pub struct CapitalTrace {
    /// Capital after each action, in order.
    pub steps: Vec<f64>,
    /// Lowest capital seen at any prefix, the starting point included.
    pub min_available: f64,
    pub final_available: f64,
    /// Positions after the last action; closed positions are removed.
    pub positions: AllocationVector,
}

impl CapitalTrace {
    /// No prefix went below zero, within `epsilon` of rounding.
    pub fn is_legal(&self, epsilon: f64) -> bool {
        self.min_available >= -epsilon
    }
}

/// Replay `actions` from `current` positions and `idle` capital.
///
/// # Errors
/// `IllegalAction` when an action does not match the positions it is
/// applied to: closing or reallocating a target without a position, opening
/// one that already has one, or a negative amount.
pub fn simulate(
    actions: &[Action],
    current: &AllocationVector,
    idle: f64,
) -> Result<CapitalTrace> {
    let mut positions: BTreeMap<TargetId, f64> = current
        .iter()
        .filter(|(_, amount)| *amount > 0.0)
        .map(|(id, amount)| (id.clone(), amount))
        .collect();
    let mut available = idle;
    let mut min_available = idle;
    let mut steps = Vec::with_capacity(actions.len());

    for action in actions {
        let id = &action.target_id;
        if action.amount.is_nan() || action.amount < 0.0 {
            return Err(Error::illegal_action(id, "negative amount"));
        }
        match action.kind {
            ActionKind::Close => {
                let held = positions
                    .remove(id)
                    .ok_or_else(|| Error::illegal_action(id, "close without a position"))?;
                available += held;
            }
            ActionKind::Open => {
                if positions.contains_key(id) {
                    return Err(Error::illegal_action(id, "open on an existing position"));
                }
                available -= action.amount;
                positions.insert(id.clone(), action.amount);
            }
            ActionKind::Reallocate => {
                let held = positions
                    .get_mut(id)
                    .ok_or_else(|| Error::illegal_action(id, "reallocate without a position"))?;
                available -= action.amount - *held;
                *held = action.amount;
            }
        }
        min_available = min_available.min(available);
        steps.push(available);
    }

    Ok(CapitalTrace {
        steps,
        min_available,
        final_available: available,
        positions: positions.into_iter().collect(),
    })
}
