//! Action sequencing.
//!
//! Turns signed deltas into an ordered action list that a naive sequential
//! executor can apply without ever running out of capital.
//!
//! # Execution Order
//!
//! Actions are emitted in two explicit passes, each in ascending target id:
//! 1. **Freeing** - closes and downward reallocations release stake
//! 2. **Consuming** - opens and upward reallocations spend it
//!
//! Without atomic reallocation a change on an existing position becomes a
//! `Close` in the freeing pass and an `Open` of the new total in the
//! consuming pass.
//!
//! The consuming pass tracks available capital. Dust suppression can leave a
//! few units of planned release unemitted; a consuming action that would
//! overdraw is trimmed to what is available, and dropped if the trimmed change
//! is itself dust.
//!
//! A non-atomic re-open always goes out. The capital its close released
//! (up to the solved amount) stays reserved for it, so fresh opens earlier in
//! id order cannot leave a kept position closed.

use tracing::{debug, warn};

use crate::optimizer::config::OptimizerConfig;
use crate::optimizer::diff::{AllocationDiff, Delta};
use crate::types::{Action, TargetId};

/// Ordered actions plus what the capital guard had to trim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionSequence {
    pub actions: Vec<Action>,
    /// Targets whose consuming action was trimmed or dropped.
    pub trimmed: Vec<TargetId>,
    /// Capital left after the whole sequence.
    pub final_capital: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionSequencer {
    atomic_reallocation: bool,
    dust_threshold: f64,
}

/// Consuming step waiting for the second pass.
struct Pending<'a> {
    delta: &'a Delta,
    /// Position held when the step executes (0 after a non-atomic close).
    held: f64,
    /// Capital set aside for a non-atomic re-open.
    reserved: f64,
}

impl<'a> Pending<'a> {
    fn reopen(delta: &'a Delta) -> Self {
        Self {
            delta,
            held: 0.0,
            reserved: delta.current.min(delta.solved),
        }
    }
}

impl ActionSequencer {
    pub fn new(atomic_reallocation: bool, dust_threshold: f64) -> Self {
        Self {
            atomic_reallocation,
            dust_threshold,
        }
    }

    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(config.atomic_reallocation, config.dust_threshold)
    }

    /// Order `diff` for sequential execution starting from `idle_capital`.
    pub fn sequence(&self, diff: &AllocationDiff, idle_capital: f64) -> ActionSequence {
        let mut actions = Vec::with_capacity(diff.deltas.len() * 2);
        let mut pending = Vec::new();
        let mut available = idle_capital.max(0.0);
        let mut reserved = 0.0;

        // Pass 1: everything that releases stake
        for delta in &diff.deltas {
            let id = &delta.target_id;
            if delta.frees_capital() {
                if delta.solved <= 0.0 {
                    actions.push(Action::close(id.clone(), delta.current));
                    available += delta.current;
                } else if self.atomic_reallocation {
                    actions.push(Action::reallocate(id.clone(), delta.solved));
                    available += delta.current - delta.solved;
                } else {
                    actions.push(Action::close(id.clone(), delta.current));
                    available += delta.current;
                    let step = Pending::reopen(delta);
                    reserved += step.reserved;
                    pending.push(step);
                }
            } else if delta.current > 0.0 && !self.atomic_reallocation {
                actions.push(Action::close(id.clone(), delta.current));
                available += delta.current;
                let step = Pending::reopen(delta);
                reserved += step.reserved;
                pending.push(step);
            } else {
                pending.push(Pending {
                    delta,
                    held: delta.current,
                    reserved: 0.0,
                });
            }
        }

        // Pass 2: everything that spends it, in id order
        pending.sort_by(|a, b| a.delta.target_id.cmp(&b.delta.target_id));
        let mut trimmed = Vec::new();

        for step in pending {
            let id = &step.delta.target_id;
            let mut total = step.delta.solved;
            let cost = total - step.held;
            // Other re-opens' reserves are off limits
            reserved -= step.reserved;
            let spendable = available - reserved;

            if cost > spendable {
                let shortfall = cost - spendable;
                total = step.held + spendable.max(0.0);
                trimmed.push(id.clone());
                if shortfall >= self.dust_threshold {
                    warn!(target_id = %id, shortfall, "Insufficient freed capital; trimming action");
                } else {
                    debug!(target_id = %id, shortfall, "Trimming rounding shortfall");
                }
                let change = total - step.held;
                let restores = step.reserved > 0.0;
                if change <= 0.0 || (change < self.dust_threshold && !restores) {
                    continue;
                }
            }

            available -= total - step.held;
            if step.held > 0.0 {
                actions.push(Action::reallocate(id.clone(), total));
            } else {
                actions.push(Action::open(id.clone(), total));
            }
        }

        ActionSequence {
            actions,
            trimmed,
            final_capital: available,
        }
    }
}
