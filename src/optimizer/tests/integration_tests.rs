//! Integration tests for the full optimization pipeline.
//!
//! These tests run snapshots end to end and check that:
//! - Policy statuses survive solving, diffing and sequencing
//! - The budget examples (frozen, pinned, saturated) behave as documented
//! - Every emitted plan replays without overdrawing capital
//! - Applying a plan and re-running it produces no further actions

use crate::errors::Error;
use crate::optimizer::{
    simulate, AllocationPlan, CapitalTrace, Optimizer, OptimizerConfig, SolveStatus, VecSink,
};
use crate::types::{ActionKind, AllocationVector, PolicyLists, Snapshot, Target, TargetId};

fn id(s: &str) -> TargetId {
    TargetId::new(s)
}

fn optimizer(config: OptimizerConfig) -> Optimizer {
    Optimizer::new(config).unwrap()
}

/// Replay a plan against the snapshot it came from.
fn replay(snapshot: &Snapshot, plan: &AllocationPlan) -> CapitalTrace {
    let current = AllocationVector::from_current(&snapshot.targets);
    simulate(&plan.actions, &current, plan.idle_capital).unwrap()
}

fn rebalancing_snapshot() -> Snapshot {
    Snapshot::new(vec![
        Target::new("QmA", 100.0, 100.0).with_current_allocation(50.0),
        Target::new("QmB", 100.0, 1000.0).with_current_allocation(400.0),
        Target::new("QmC", 5.0, 5000.0).with_current_allocation(300.0),
        Target::new("QmD", 80.0, 400.0),
    ])
    .with_idle_stake(250.0)
}

// =========================================================================
// Budget Examples
// =========================================================================

#[test]
fn test_less_contested_target_wins_and_budget_is_spent() {
    let snapshot = Snapshot::new(vec![
        Target::new("QmA", 100.0, 100.0),
        Target::new("QmB", 100.0, 1000.0),
    ])
    .with_idle_stake(500.0);
    let plan = optimizer(OptimizerConfig::default().with_reward_pool_rate(200.0))
        .optimize(&snapshot)
        .unwrap();

    assert_eq!(plan.status, SolveStatus::Converged);
    assert!(plan.allocations.get(&id("QmA")) > plan.allocations.get(&id("QmB")));
    assert!((plan.allocations.total() - 500.0).abs() <= 1e-6 * 500.0);
    assert!(plan.allocations.total() <= 500.0);
    assert!(plan.water_level.is_some());
}

#[test]
fn test_uncontested_target_is_seeded_and_earns_full_reward() {
    let snapshot = Snapshot::new(vec![
        Target::new("QmA", 100.0, 0.0),
        Target::new("QmB", 100.0, 1000.0),
    ])
    .with_idle_stake(500.0);
    let plan = optimizer(OptimizerConfig::default().with_reward_pool_rate(200.0))
        .optimize(&snapshot)
        .unwrap();

    // Seed defaults to the dust threshold, so the open survives the diff
    assert_eq!(plan.allocations.get(&id("QmA")), 1.0);
    assert!((plan.allocations.total() - 500.0).abs() <= 1e-6 * 500.0);
    assert!(plan
        .actions
        .iter()
        .any(|a| a.kind == ActionKind::Open && a.target_id == id("QmA") && a.amount == 1.0));
    // 100 from QmA plus QmB's 100 * 499 / 1499
    assert!(plan.expected_reward > 133.0, "reward {}", plan.expected_reward);
    assert!(replay(&snapshot, &plan).is_legal(1e-9));
}

#[test]
fn test_frozen_position_untouched_in_pipeline() {
    let targets = vec![
        Target::new("QmF", 10.0, 100.0).with_current_allocation(200.0),
        Target::new("QmA", 100.0, 100.0),
        Target::new("QmB", 50.0, 300.0),
    ];
    let snapshot = Snapshot::new(targets.clone())
        .with_policy(PolicyLists::new().freeze("QmF"))
        .with_budget(200.0);
    let plan = optimizer(OptimizerConfig::default()).optimize(&snapshot).unwrap();

    assert_eq!(plan.allocations.get(&id("QmF")), 200.0);
    assert!(plan.actions.iter().all(|a| a.target_id != id("QmF")));
    assert_eq!(plan.allocations.total(), 200.0);

    let snapshot = Snapshot::new(targets)
        .with_policy(PolicyLists::new().freeze("QmF").pin("QmB", 10.0))
        .with_budget(200.0);
    match optimizer(OptimizerConfig::default()).optimize(&snapshot) {
        Err(Error::BudgetInfeasible {
            required, shortfall, ..
        }) => {
            assert_eq!(required, 210.0);
            assert_eq!(shortfall, 10.0);
        }
        other => panic!("expected infeasible budget, got {other:?}"),
    }
}

#[test]
fn test_pinned_floor_over_budget_reports_shortfall() {
    let snapshot = Snapshot::new(vec![Target::new("QmA", 10.0, 100.0)])
        .with_policy(PolicyLists::new().pin("QmA", 300.0))
        .with_budget(250.0);
    let err = optimizer(OptimizerConfig::default())
        .optimize(&snapshot)
        .unwrap_err();
    assert_eq!(
        err,
        Error::BudgetInfeasible {
            required: 300.0,
            budget: 250.0,
            shortfall: 50.0,
        }
    );
}

#[test]
fn test_saturated_plan_reports_unspent() {
    let snapshot = Snapshot::new(vec![
        Target::new("QmA", 10.0, 100.0),
        Target::new("QmB", 10.0, 100.0),
    ])
    .with_idle_stake(1000.0);
    let config = OptimizerConfig::default().with_max_allocation_per_target(300.0);
    let plan = optimizer(config).optimize(&snapshot).unwrap();

    assert_eq!(plan.status, SolveStatus::Saturated);
    assert_eq!(plan.unspent, Some(400.0));
    assert_eq!(plan.actions.len(), 2);
    assert!(plan.actions.iter().all(|a| a.kind == ActionKind::Open && a.amount == 300.0));
}

#[test]
fn test_empty_snapshot_is_valid() {
    let plan = optimizer(OptimizerConfig::default())
        .optimize(&Snapshot::new(Vec::new()).with_idle_stake(100.0))
        .unwrap();
    assert_eq!(plan.status, SolveStatus::Empty);
    assert!(plan.actions.is_empty());
    assert_eq!(plan.unspent, Some(100.0));
}

// =========================================================================
// Policy Through the Pipeline
// =========================================================================

#[test]
fn test_blacklisted_position_is_closed() {
    let snapshot = rebalancing_snapshot().with_policy(PolicyLists::new().blacklist("QmA"));
    let plan = optimizer(OptimizerConfig::default()).optimize(&snapshot).unwrap();

    assert_eq!(plan.allocations.get(&id("QmA")), 0.0);
    let close = plan
        .actions
        .iter()
        .find(|a| a.target_id == id("QmA"))
        .unwrap();
    assert_eq!(close.kind, ActionKind::Close);
    assert_eq!(close.amount, 50.0);
}

#[test]
fn test_all_excluded_closes_everything_except_frozen() {
    let snapshot = rebalancing_snapshot()
        .with_policy(PolicyLists::new().whitelist("QmMissing").freeze("QmC"));
    let plan = optimizer(OptimizerConfig::default()).optimize(&snapshot).unwrap();

    assert_eq!(plan.status, SolveStatus::Empty);
    assert_eq!(plan.allocations.get(&id("QmC")), 300.0);
    let closed: Vec<&str> = plan
        .actions
        .iter()
        .filter(|a| a.kind == ActionKind::Close)
        .map(|a| a.target_id.as_str())
        .collect();
    assert_eq!(closed, vec!["QmA", "QmB"]);
    assert_eq!(plan.actions.len(), 2);
}

#[test]
fn test_conflicting_lists_abort() {
    let snapshot = rebalancing_snapshot()
        .with_policy(PolicyLists::new().blacklist("QmB").pin("QmB", 10.0));
    assert!(matches!(
        optimizer(OptimizerConfig::default()).optimize(&snapshot),
        Err(Error::ConflictingPolicy { .. })
    ));
}

// =========================================================================
// Sequencing
// =========================================================================

#[test]
fn test_plan_replays_without_overdraw() {
    let snapshot = rebalancing_snapshot();
    for atomic in [false, true] {
        let config = OptimizerConfig::default()
            .with_reward_pool_rate(285.0)
            .with_atomic_reallocation(atomic);
        let plan = optimizer(config).optimize(&snapshot).unwrap();
        assert!(!plan.actions.is_empty());

        let trace = replay(&snapshot, &plan);
        assert!(trace.is_legal(1e-9), "atomic={atomic}: {:?}", trace.steps);
        for (target, amount) in plan.allocations.iter() {
            let reached = trace.positions.get(target);
            assert!((reached - amount).abs() < 1.0, "{target}: {reached} vs {amount}");
        }
    }
}

#[test]
fn test_freeing_actions_precede_consuming_ones() {
    let snapshot = rebalancing_snapshot();
    let plan = optimizer(OptimizerConfig::default().with_atomic_reallocation(true))
        .optimize(&snapshot)
        .unwrap();
    let current = AllocationVector::from_current(&snapshot.targets);

    let frees: Vec<bool> = plan
        .actions
        .iter()
        .map(|a| match a.kind {
            ActionKind::Close => true,
            ActionKind::Open => false,
            ActionKind::Reallocate => a.amount < current.get(&a.target_id),
        })
        .collect();
    let first_consuming = frees.iter().position(|f| !f).unwrap_or(frees.len());
    assert!(frees[first_consuming..].iter().all(|f| !f));
}

#[test]
fn test_applied_plan_is_a_fixed_point() {
    let snapshot = rebalancing_snapshot();
    let optimizer = optimizer(OptimizerConfig::default().with_reward_pool_rate(285.0));
    let plan = optimizer.optimize(&snapshot).unwrap();
    let trace = replay(&snapshot, &plan);

    let targets = snapshot
        .targets
        .iter()
        .map(|t| {
            Target::new(t.id.as_str(), t.signal, t.competing_stake)
                .with_current_allocation(trace.positions.get(&t.id))
        })
        .collect();
    let applied = Snapshot::new(targets).with_idle_stake(trace.final_available.max(0.0));
    let again = optimizer.optimize(&applied).unwrap();
    assert!(again.actions.is_empty(), "{:?}", again.actions);
}

#[test]
fn test_identical_snapshots_give_identical_plans() {
    let snapshot = rebalancing_snapshot().with_policy(PolicyLists::new().pin("QmD", 25.0));
    let optimizer = optimizer(OptimizerConfig::default().with_gas(0.5, 28.0));
    let first = optimizer.optimize(&snapshot).unwrap();
    let second = optimizer.optimize(&snapshot).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_plan_submitted_to_sink_in_order() {
    let plan = optimizer(OptimizerConfig::default())
        .optimize(&rebalancing_snapshot())
        .unwrap();
    let mut sink = VecSink::new();
    plan.submit(&mut sink).unwrap();
    assert_eq!(sink.into_actions(), plan.actions);
}

// =========================================================================
// Pruning
// =========================================================================

#[test]
fn test_new_allocation_cap_in_pipeline() {
    let snapshot = Snapshot::new(vec![
        Target::new("QmA", 30.0, 100.0).with_current_allocation(100.0),
        Target::new("QmB", 20.0, 100.0),
        Target::new("QmC", 10.0, 100.0),
        Target::new("QmD", 15.0, 100.0),
    ])
    .with_idle_stake(900.0);
    let config = OptimizerConfig::default()
        .with_reward_pool_rate(75.0)
        .with_max_new_allocations(1);
    let plan = optimizer(config).optimize(&snapshot).unwrap();

    let opens: Vec<&str> = plan
        .actions
        .iter()
        .filter(|a| a.kind == ActionKind::Open && a.target_id != id("QmA"))
        .map(|a| a.target_id.as_str())
        .collect();
    assert_eq!(opens, vec!["QmB"]);
    assert_eq!(plan.pruned.len(), 2);
    assert!((plan.allocations.total() - 1000.0).abs() <= 1e-6 * 1000.0);
}
