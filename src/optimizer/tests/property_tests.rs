//! Property tests over randomly generated snapshots and diffs.

use proptest::prelude::*;

use crate::errors::Error;
use crate::optimizer::{
    diff, simulate, ActionSequencer, Optimizer, OptimizerConfig, SolveStatus,
};
use crate::types::{AllocationVector, PolicyLists, Snapshot, Target, TargetId};

/// Rounding slack on sums.
const SUM_SLACK: f64 = 1e-5;

/// Per-target slack when comparing two independent solves.
const AMOUNT_SLACK: f64 = 1e-4;

/// Convergence window of the default config at `budget`.
fn window(budget: f64) -> f64 {
    OptimizerConfig::default().tolerance * budget.max(1.0)
}

fn target_id(i: usize) -> TargetId {
    TargetId::new(format!("Qm{i:03}"))
}

/// (signal, competing stake, current allocation)
fn target_strategy() -> impl Strategy<Value = (f64, f64, f64)> {
    (1.0..1_000.0f64, 1.0..10_000.0f64, prop_oneof![Just(0.0), 0.0..1_000.0f64])
}

fn targets_from(params: &[(f64, f64, f64)]) -> Vec<Target> {
    params
        .iter()
        .enumerate()
        .map(|(i, &(signal, competing, current))| {
            Target::new(target_id(i), signal, competing).with_current_allocation(current)
        })
        .collect()
}

/// 0 = unlisted, 1 = blacklisted, 2 = frozen, 3 = pinned
fn policy_from(tags: &[(u8, f64)]) -> PolicyLists {
    tags.iter()
        .enumerate()
        .fold(PolicyLists::new(), |policy, (i, &(tag, floor))| match tag {
            1 => policy.blacklist(target_id(i)),
            2 => policy.freeze(target_id(i)),
            3 => policy.pin(target_id(i), floor),
            _ => policy,
        })
}

fn vector_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(prop_oneof![Just(0.0), 0.0..500.0f64], 1..10)
}

fn vector_from(amounts: &[f64]) -> AllocationVector {
    amounts
        .iter()
        .enumerate()
        .map(|(i, &a)| (target_id(i), a))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    /// Spend never exceeds the budget and matches it unless nothing more is worth buying.
    #[test]
    fn pbt_budget_ceiling(
        params in prop::collection::vec(target_strategy(), 1..8),
        idle in 0.0..10_000.0f64,
    ) {
        let snapshot = Snapshot::new(targets_from(&params)).with_idle_stake(idle);
        let budget = snapshot.resolve_budget().unwrap().amount();
        let plan = Optimizer::new(OptimizerConfig::default().with_reward_pool_rate(1_000.0))
            .unwrap()
            .optimize(&snapshot)
            .unwrap();

        let total = plan.allocations.total();
        prop_assert!(total <= budget + SUM_SLACK, "total {} > budget {}", total, budget);
        if plan.status == SolveStatus::Converged {
            prop_assert!(
                (budget - total).abs() <= window(budget) + SUM_SLACK,
                "total {} vs budget {}",
                total,
                budget
            );
        }
    }

    /// Solved amounts respect every box and every policy status.
    #[test]
    fn pbt_bounds_and_policy(
        params in prop::collection::vec(target_strategy(), 1..8),
        tags in prop::collection::vec((0u8..4, 0.0..200.0f64), 8),
        idle in 0.0..5_000.0f64,
        cap in prop::option::of(50.0..2_000.0f64),
    ) {
        let targets = targets_from(&params);
        let policy = policy_from(&tags[..targets.len()]);
        let snapshot = Snapshot::new(targets.clone()).with_policy(policy.clone()).with_idle_stake(idle);
        let mut config = OptimizerConfig::default().with_reward_pool_rate(1_000.0);
        config.max_allocation_per_target = cap;
        let result = Optimizer::new(config).unwrap().optimize(&snapshot);

        let plan = match result {
            Err(Error::BudgetInfeasible { required, budget, .. }) => {
                prop_assert!(required > budget);
                return Ok(());
            }
            other => other.unwrap(),
        };

        for target in &targets {
            let solved = plan.allocations.get(&target.id);
            prop_assert!(solved >= 0.0);
            if policy.blacklist.contains(&target.id) {
                prop_assert_eq!(solved, 0.0);
            } else if policy.frozen.contains(&target.id) {
                prop_assert_eq!(solved, target.current_allocation);
            } else if let Some(&floor) = policy.pinned.get(&target.id) {
                prop_assert!(solved >= floor);
                if let Some(cap) = cap {
                    prop_assert!(solved <= cap.max(floor));
                }
            } else if let Some(cap) = cap {
                prop_assert!(solved <= cap);
            }
        }
    }

    /// Raising one target's signal never lowers its allocation nor raises anyone else's.
    #[test]
    fn pbt_monotone_in_signal(
        params in prop::collection::vec(target_strategy(), 2..6),
        idle in 100.0..10_000.0f64,
        boost in 1.0..10.0f64,
    ) {
        let optimizer = Optimizer::new(OptimizerConfig::default().with_reward_pool_rate(1_000.0)).unwrap();
        let base = Snapshot::new(targets_from(&params)).with_idle_stake(idle);

        let mut boosted_params = params.clone();
        boosted_params[0].0 *= boost;
        let boosted = Snapshot::new(targets_from(&boosted_params)).with_idle_stake(idle);

        let before = optimizer.optimize(&base).unwrap();
        let after = optimizer.optimize(&boosted).unwrap();
        // Each solve may stop anywhere in its window
        let slack = AMOUNT_SLACK + 2.0 * window(before.budget);

        let first = target_id(0);
        prop_assert!(after.allocations.get(&first) >= before.allocations.get(&first) - slack);
        for i in 1..params.len() {
            let id = target_id(i);
            prop_assert!(after.allocations.get(&id) <= before.allocations.get(&id) + slack);
        }
    }

    /// Identical snapshots produce bit-identical plans.
    #[test]
    fn pbt_idempotent(
        params in prop::collection::vec(target_strategy(), 0..8),
        idle in 0.0..10_000.0f64,
        atomic in any::<bool>(),
    ) {
        let snapshot = Snapshot::new(targets_from(&params)).with_idle_stake(idle);
        let optimizer = Optimizer::new(
            OptimizerConfig::default()
                .with_reward_pool_rate(1_000.0)
                .with_atomic_reallocation(atomic),
        )
        .unwrap();
        let first = optimizer.optimize(&snapshot).unwrap();
        let second = optimizer.optimize(&snapshot).unwrap();

        prop_assert_eq!(&first.allocations, &second.allocations);
        prop_assert_eq!(&first.actions, &second.actions);
        for (id, amount) in first.allocations.iter() {
            prop_assert_eq!(amount.to_bits(), second.allocations.get(id).to_bits());
        }
    }

    /// Any diff, sequenced either way, replays without a negative prefix.
    #[test]
    fn pbt_sequence_never_overdraws(
        current in vector_strategy(),
        solved in vector_strategy(),
        idle in 0.0..500.0f64,
        dust in prop_oneof![Just(0.0), 0.0..5.0f64],
        atomic in any::<bool>(),
    ) {
        let current = vector_from(&current);
        let solved = vector_from(&solved);
        let delta = diff(&solved, &current, dust);
        let sequence = ActionSequencer::new(atomic, dust).sequence(&delta, idle);

        let trace = simulate(&sequence.actions, &current, idle).unwrap();
        prop_assert!(trace.is_legal(1e-9), "steps {:?}", trace.steps);
        prop_assert!((trace.final_available - sequence.final_capital).abs() <= 1e-9);
    }

    /// Plans computed by the optimizer replay legally from the snapshot state.
    #[test]
    fn pbt_plan_replays_legally(
        params in prop::collection::vec(target_strategy(), 1..8),
        idle in 0.0..2_000.0f64,
        atomic in any::<bool>(),
    ) {
        let snapshot = Snapshot::new(targets_from(&params)).with_idle_stake(idle);
        let plan = Optimizer::new(
            OptimizerConfig::default()
                .with_reward_pool_rate(1_000.0)
                .with_atomic_reallocation(atomic),
        )
        .unwrap()
        .optimize(&snapshot)
        .unwrap();

        let current = AllocationVector::from_current(&snapshot.targets);
        let trace = simulate(&plan.actions, &current, plan.idle_capital).unwrap();
        prop_assert!(trace.is_legal(1e-9), "steps {:?}", trace.steps);
    }
}
