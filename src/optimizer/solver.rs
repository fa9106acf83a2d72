//! Water-filling solver.
//!
//! Maximizes `Σ value_t(a_t)` subject to `Σ a_t ≤ budget` and
//! `min_t ≤ a_t ≤ max_t`. The objective is separable and concave, so at the
//! optimum every unclamped target sits at a shared marginal reward λ (the
//! water level) and clamped targets sit at the nearer bound.
//!
//! # Algorithm
//!
//! 1. Fixed targets (blacklisted, frozen, collapsed bounds) take their fixed
//!    amount off the top of the budget
//! 2. Forced minimums above the budget → `BudgetInfeasible`
//! 3. Uncontested targets (rate but no competing stake) are pinned at the
//!    seed stake, highest rate first, while the budget left after the
//!    floors covers it
//! 4. Budget above the achievable capacity → saturate at capacity, report
//!    the remainder
//! 5. Otherwise bisect λ in log space. For each λ every target takes
//!    `clamp(amount_for_marginal(λ), min, max)`; the sum is non-increasing
//!    in λ
//! 6. Stop within the tolerance window below the budget, or at
//!    `max_iterations` with the best feasible vector and a `NonConverged`
//!    status
//!
//! The window is `tolerance × max(budget, 1)`, so the same setting holds
//! at any stake scale.

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::errors::{Error, Result};
use crate::optimizer::config::OptimizerConfig;
use crate::optimizer::constraints::{ConstraintRecord, ConstraintSet};
use crate::optimizer::reward::{RewardModel, TargetEconomics};
use crate::types::{AllocationVector, Budget, TargetId};

/// Halvings allowed while searching for the lower end of the λ bracket.
/// Enough to walk the whole positive f64 exponent range.
const MAX_BRACKET_STEPS: u32 = 2100;

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SolveStatus {
    /// Sum within tolerance of the budget (or pinned exactly at the floors).
    Converged,
    /// Every eligible target is at its achievable maximum; budget left over.
    Saturated,
    /// Iteration cap reached; the returned vector is the best feasible one.
    NonConverged { iterations: u32, residual: f64 },
    /// No eligible targets remained after normalization.
    Empty,
}

impl SolveStatus {
    pub fn is_converged(&self) -> bool {
        !matches!(self, SolveStatus::NonConverged { .. })
    }
}

/// Output of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Amount for every constrained target, zeros included.
    pub allocations: AllocationVector,
    /// Shared marginal reward at the optimum, when one was bisected.
    pub water_level: Option<f64>,
    pub status: SolveStatus,
    /// Budget left unallocated when full spend is impossible.
    pub unspent: Option<f64>,
    /// Bisection iterations used.
    pub iterations: u32,
}

struct Entry<'a> {
    id: &'a TargetId,
    economics: TargetEconomics,
    record: ConstraintRecord,
}

impl Entry<'_> {
    fn amount_at(&self, lambda: f64) -> f64 {
        self.record.clamp(self.economics.amount_for_marginal(lambda))
    }

    /// Largest amount worth allocating: an unresponsive target gains
    /// nothing above its floor.
    fn capacity(&self) -> f64 {
        if self.economics.is_responsive() {
            self.record.max_allocation
        } else {
            self.record.min_allocation
        }
    }
}

/// Bisection solver over the water level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterFillingSolver {
    tolerance: f64,
    max_iterations: u32,
    uncontested_seed: f64,
}

impl WaterFillingSolver {
    /// Solver without uncontested seeding.
    pub fn new(tolerance: f64, max_iterations: u32) -> Self {
        Self {
            tolerance,
            max_iterations,
            uncontested_seed: 0.0,
        }
    }

    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(config.tolerance, config.max_iterations)
            .with_uncontested_seed(config.seed_stake())
    }

    /// Builder: stake placed on each uncontested target (0 disables).
    pub fn with_uncontested_seed(mut self, seed: f64) -> Self {
        self.uncontested_seed = seed;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Absolute convergence window for `budget`.
    pub fn window(&self, budget: f64) -> f64 {
        self.tolerance * budget.max(1.0)
    }

    /// Solve for the reward-maximizing allocation.
    ///
    /// # Errors
    /// `BudgetInfeasible` when the forced minimums (frozen amounts included)
    /// exceed the budget by more than the tolerance.
    pub fn solve(
        &self,
        model: &RewardModel,
        constraints: &ConstraintSet,
        budget: Budget,
    ) -> Result<Solution> {
        let budget = budget.amount();
        let tol = self.window(budget);
        let mut allocations = AllocationVector::new();
        let mut entries = Vec::new();
        let mut fixed_total = 0.0;

        for (id, record) in constraints.iter() {
            if record.is_fixed() {
                allocations.insert(id.clone(), record.min_allocation);
                fixed_total += record.min_allocation;
            } else {
                entries.push(Entry {
                    id,
                    economics: model
                        .economics(id)
                        .unwrap_or(TargetEconomics::new(0.0, 0.0)),
                    record: *record,
                });
            }
        }

        let free_min: f64 = entries.iter().map(|e| e.record.min_allocation).sum();
        let required = fixed_total + free_min;
        if required > budget + tol {
            return Err(Error::budget_infeasible(required, budget));
        }

        self.seed_uncontested(&mut entries, budget - required);
        let free_min: f64 = entries.iter().map(|e| e.record.min_allocation).sum();

        let free_budget = (budget - fixed_total).max(0.0);

        if entries.is_empty() {
            debug!(fixed = fixed_total, "No eligible targets");
            return Ok(Solution {
                unspent: remainder(budget, fixed_total, tol),
                allocations,
                water_level: None,
                status: SolveStatus::Empty,
                iterations: 0,
            });
        }

        // Floors consume the whole budget: nothing to distribute
        if free_budget - free_min <= tol {
            fill(&mut allocations, &entries, |e| e.record.min_allocation);
            return Ok(Solution {
                allocations,
                water_level: None,
                status: SolveStatus::Converged,
                unspent: None,
                iterations: 0,
            });
        }

        let capacity: f64 = entries.iter().map(Entry::capacity).sum();
        if capacity <= free_budget + tol {
            debug!(capacity, free_budget, "Budget exceeds capacity; saturating");
            return Ok(saturate(allocations, &entries, budget, fixed_total + capacity, tol));
        }

        let mut hi = entries
            .iter()
            .filter(|e| e.economics.is_responsive())
            .map(|e| e.economics.marginal(e.record.min_allocation))
            .fold(0.0_f64, f64::max)
            * 2.0;
        let mut lo = entries
            .iter()
            .filter(|e| e.economics.is_responsive())
            .map(|e| e.economics.marginal(free_budget))
            .fold(f64::INFINITY, f64::min);

        let total_at =
            |lambda: f64| -> f64 { entries.iter().map(|e| e.amount_at(lambda)).sum() };

        let mut bracketed = false;
        for _ in 0..MAX_BRACKET_STEPS {
            if lo <= 0.0 {
                break;
            }
            if total_at(lo) >= free_budget {
                bracketed = true;
                break;
            }
            lo *= 0.5;
        }
        if !bracketed {
            // Capacity check passed but no positive λ reaches the budget;
            // only possible at the edge of f64 range.
            fill(&mut allocations, &entries, |e| e.amount_at(hi));
            let residual = free_budget - total_at(hi);
            warn!(lo, residual, "Could not bracket water level");
            return Ok(Solution {
                allocations,
                water_level: Some(hi),
                status: SolveStatus::NonConverged {
                    iterations: 0,
                    residual,
                },
                unspent: None,
                iterations: 0,
            });
        }

        trace!(lo, hi, "Bracketed water level");

        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;
            let mid = ((lo.ln() + hi.ln()) * 0.5).exp();
            if mid <= lo || mid >= hi {
                // Floating-point plateau: bracket cannot shrink further
                break;
            }
            let total = total_at(mid);
            trace!(iteration = iterations, lambda = mid, total, "Bisection step");

            // One-sided window: converge from below so the budget is never exceeded
            let gap = free_budget - total;
            if (0.0..=tol).contains(&gap) {
                fill(&mut allocations, &entries, |e| e.amount_at(mid));
                debug!(lambda = mid, iterations, "Water level converged");
                return Ok(Solution {
                    allocations,
                    water_level: Some(mid),
                    status: SolveStatus::Converged,
                    unspent: None,
                    iterations,
                });
            }
            if total > free_budget {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        // Best so far: the upper end of the bracket never overspends
        fill(&mut allocations, &entries, |e| e.amount_at(hi));
        let residual = free_budget - total_at(hi);
        if residual <= tol {
            return Ok(Solution {
                allocations,
                water_level: Some(hi),
                status: SolveStatus::Converged,
                unspent: None,
                iterations,
            });
        }
        warn!(
            iterations,
            residual,
            lambda = hi,
            "Water level did not converge; returning best feasible allocation"
        );
        Ok(Solution {
            allocations,
            water_level: Some(hi),
            status: SolveStatus::NonConverged {
                iterations,
                residual,
            },
            unspent: None,
            iterations,
        })
    }

    /// Collapse uncontested entries onto the seed stake while `room` lasts.
    /// Entries that already carry a positive floor earn their rate anyway.
    fn seed_uncontested(&self, entries: &mut [Entry<'_>], mut room: f64) {
        if self.uncontested_seed <= 0.0 {
            return;
        }
        let mut order: Vec<usize> = (0..entries.len())
            .filter(|&i| {
                entries[i].economics.is_uncontested() && entries[i].record.min_allocation <= 0.0
            })
            .collect();
        // Stable: equal rates keep id order
        order.sort_by(|&a, &b| {
            entries[b]
                .economics
                .reward_rate
                .total_cmp(&entries[a].economics.reward_rate)
        });

        for i in order {
            let entry = &mut entries[i];
            let seed = self.uncontested_seed.min(entry.record.max_allocation);
            if seed <= 0.0 {
                continue;
            }
            if seed > room {
                debug!(target_id = %entry.id, seed, room, "No budget left to seed uncontested target");
                continue;
            }
            room -= seed;
            entry.record.min_allocation = seed;
            entry.record.max_allocation = seed;
            trace!(target_id = %entry.id, seed, "Seeded uncontested target");
        }
    }
}

fn saturate(
    mut allocations: AllocationVector,
    entries: &[Entry<'_>],
    budget: f64,
    total: f64,
    tolerance: f64,
) -> Solution {
    fill(&mut allocations, entries, Entry::capacity);
    Solution {
        allocations,
        water_level: None,
        status: SolveStatus::Saturated,
        unspent: remainder(budget, total, tolerance),
        iterations: 0,
    }
}

fn fill<'a, F>(allocations: &mut AllocationVector, entries: &[Entry<'a>], amount: F)
where
    F: Fn(&Entry<'a>) -> f64,
{
    for entry in entries {
        allocations.insert(entry.id.clone(), amount(entry));
    }
}

fn remainder(budget: f64, total: f64, tolerance: f64) -> Option<f64> {
    let rem = budget - total;
    (rem > tolerance).then_some(rem)
}
