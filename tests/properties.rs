//! Property tests for the update rules and the fitting loop.
//!
//! Panels are generated as 2 × 3 crosses of Gender and Age_group with every
//! cell populated, so every target category has respondents and the raking
//! problem is always feasible.

use proptest::prelude::*;

use rim_weighting::fit::{RimConfig, RimWeighting};
use rim_weighting::panel::Panel;
use rim_weighting::rule::{Difference, Multiplicative, UpdateRule, UpdateRuleKind};
use rim_weighting::target::{ConditionId, TargetTable};

fn build_panel(cells: &[usize]) -> Panel {
    let mut gender: Vec<ConditionId> = Vec::new();
    let mut age_group: Vec<ConditionId> = Vec::new();
    for (i, &n) in cells.iter().enumerate() {
        let (g, a) = ((i / 3) as ConditionId, (i % 3) as ConditionId);
        gender.extend(std::iter::repeat(g).take(n));
        age_group.extend(std::iter::repeat(a).take(n));
    }
    Panel::builder()
        .factor("Gender", &gender)
        .unwrap()
        .factor("Age_group", &age_group)
        .unwrap()
        .build()
        .unwrap()
}

fn build_targets(n: usize, female: f64, ages: &[f64]) -> TargetTable {
    let total: f64 = ages.iter().sum();
    let age_shares: Vec<f64> = ages.iter().map(|a| a / total).collect();
    TargetTable::builder(n)
        .factor("Gender", &[female, 1.0 - female])
        .unwrap()
        .factor("Age_group", &age_shares)
        .unwrap()
        .build()
}

fn arb_cells() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..15, 6)
}

fn arb_ages() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.1f64..1.0, 3)
}

fn arb_weights(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.2f64..5.0, len)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

// ── Category sums land on their targets after one update ─────────────────

proptest! {
    #[test]
    fn multiplicative_update_hits_every_target(
        (cells, weights) in arb_cells().prop_flat_map(|cells| {
            let len = cells.iter().sum();
            (Just(cells), arb_weights(len))
        }),
        female in 0.2f64..0.8,
        ages in arb_ages(),
    ) {
        let mut panel = build_panel(&cells);
        panel.set_weights(weights).unwrap();
        let targets = build_targets(panel.len(), female, &ages);

        Multiplicative.update(&mut panel, &targets, "Age_group").unwrap();
        for cat in targets.factor("Age_group").unwrap().categories() {
            let sum = panel.weighted_sum("Age_group", cat.condition).unwrap();
            prop_assert!(close(sum, cat.target), "{} vs {}", sum, cat.target);
        }
    }

    #[test]
    fn difference_update_hits_every_target(
        (cells, weights) in arb_cells().prop_flat_map(|cells| {
            let len = cells.iter().sum();
            (Just(cells), arb_weights(len))
        }),
        female in 0.2f64..0.8,
        ages in arb_ages(),
    ) {
        let mut panel = build_panel(&cells);
        panel.set_weights(weights).unwrap();
        let targets = build_targets(panel.len(), female, &ages);

        Difference.update(&mut panel, &targets, "Gender").unwrap();
        for cat in targets.factor("Gender").unwrap().categories() {
            let sum = panel.weighted_sum("Gender", cat.condition).unwrap();
            prop_assert!(close(sum, cat.target), "{} vs {}", sum, cat.target);
        }
    }
}

// ── One multiplier per category ──────────────────────────────────────────

proptest! {
    #[test]
    fn multiplicative_update_scales_each_category_uniformly(
        (cells, weights) in arb_cells().prop_flat_map(|cells| {
            let len = cells.iter().sum();
            (Just(cells), arb_weights(len))
        }),
        female in 0.2f64..0.8,
        ages in arb_ages(),
    ) {
        let mut panel = build_panel(&cells);
        panel.set_weights(weights.clone()).unwrap();
        let targets = build_targets(panel.len(), female, &ages);

        let multipliers = Multiplicative.multipliers(&panel, &targets, "Gender").unwrap();
        Multiplicative.update(&mut panel, &targets, "Gender").unwrap();

        for respondent in panel.respondents() {
            let condition = respondent.condition("Gender").unwrap() as usize;
            let expected = weights[respondent.index()] * multipliers[condition];
            prop_assert!(close(respondent.weight(), expected));
        }
    }
}

// ── Fitting loop ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn trace_never_exceeds_budget(
        cells in arb_cells(),
        female in 0.2f64..0.8,
        ages in arb_ages(),
        budget in 0u32..12,
        dd in any::<bool>(),
    ) {
        let mut panel = build_panel(&cells);
        let targets = build_targets(panel.len(), female, &ages);
        let rule = if dd { UpdateRuleKind::Difference } else { UpdateRuleKind::Multiplicative };

        let outcome = RimWeighting::with_rule(budget, rule).fit(&mut panel, &targets).unwrap();
        prop_assert!(outcome.trace.len() <= budget as usize);
        prop_assert_eq!(outcome.trace.len() as u32, outcome.status.iterations());
        for (i, record) in outcome.trace.records().iter().enumerate() {
            prop_assert_eq!(record.iteration as usize, i + 1);
            prop_assert!(record.rmse >= 0.0 && record.mae >= 0.0);
        }
    }

    #[test]
    fn populated_panels_converge(
        cells in arb_cells(),
        female in 0.2f64..0.8,
        ages in arb_ages(),
    ) {
        let mut panel = build_panel(&cells);
        let targets = build_targets(panel.len(), female, &ages);
        let engine = RimWeighting::new(RimConfig { max_iterations: 500, ..RimConfig::default() });

        let outcome = engine.fit(&mut panel, &targets).unwrap();
        prop_assert!(outcome.status.is_converged(), "status {:?}", outcome.status);
        prop_assert!(panel.weights().iter().all(|&w| w > 0.0));
        for cat in targets.categories() {
            let sum = panel.weighted_sum(&cat.factor, cat.condition).unwrap();
            prop_assert!((sum - cat.target).abs() < 1e-6);
        }
    }
}
