//! # Multiplicative vs difference rule on one survey panel
//!
//! Builds a 100-respondent panel from two demographic columns, fits two
//! identical copies, one with each update rule, and prints the MAE after every
//! iteration side by side. Ends with the weighted totals of every target cell.
//!
//! ## Running this demo
//!
//! ```
//! cargo run --example compare_rules
//! ```

use rim_weighting::fit::rim;
use rim_weighting::metric::{error, ErrorKind};
use rim_weighting::panel::Panel;
use rim_weighting::rule::UpdateRuleKind;
use rim_weighting::target::TargetTable;
use rim_weighting::RimResult;

const ITERATIONS: u32 = 20;

// ── Panel ─────────────────────────────────────────────────────────────────────

/// Deterministic pseudo-random codes so the demo prints the same table every run.
fn lcg_codes(seed: u64, n: usize, buckets: &[u64]) -> Vec<i64> {
    let total: u64 = buckets.iter().sum();
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let mut draw = (state >> 33) % total;
            let mut code = 0;
            for (i, &b) in buckets.iter().enumerate() {
                if draw < b {
                    code = i;
                    break;
                }
                draw -= b;
            }
            code as i64 + 1
        })
        .collect()
}

fn survey() -> RimResult<(Panel, TargetTable)> {
    // raw survey codes: Gender 1/2, Age_group 1/2/3
    let gender = lcg_codes(7, 100, &[40, 60]);
    let age_group = lcg_codes(11, 100, &[25, 50, 25]);

    let panel = Panel::builder()
        .factor_values("Gender", &gender)?
        .factor_values("Age_group", &age_group)?
        .build()?;
    let targets = TargetTable::builder(panel.len())
        .factor("Gender", &[0.5, 0.5])?
        .factor("Age_group", &[0.2, 0.6, 0.2])?
        .build();
    Ok((panel, targets))
}

// ── Display helpers ───────────────────────────────────────────────────────────

fn cell(trace: &[f64], i: usize) -> String {
    trace
        .get(i)
        .map_or_else(|| "-".to_string(), |v| format!("{v:.3e}"))
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> RimResult<()> {
    let (panel, targets) = survey()?;
    println!(
        "panel: {} respondents, start MAE {:.4}\n",
        panel.len(),
        error(&panel, &targets, ErrorKind::Mae)?
    );

    let (ratio, ratio_trace) = rim(panel.clone(), &targets, ITERATIONS, UpdateRuleKind::Multiplicative)?;
    let (dd, dd_trace) = rim(panel.clone(), &targets, ITERATIONS, UpdateRuleKind::Difference)?;

    let ratio_mae = ratio_trace.column(ErrorKind::Mae);
    let dd_mae = dd_trace.column(ErrorKind::Mae);

    println!("  iter | multiplicative MAE | dd MAE");
    println!("  -----+--------------------+-----------");
    for i in 0..ratio_mae.len().max(dd_mae.len()) {
        println!("  {:>4} | {:>18} | {:>10}", i + 1, cell(&ratio_mae, i), cell(&dd_mae, i));
    }

    println!("\n  cell            target   multiplicative       dd");
    for cat in targets.categories() {
        let value = panel
            .column(&cat.factor)
            .and_then(|c| c.value_of(cat.condition))
            .unwrap_or_default();
        println!(
            "  {:<10} = {:<2} {:>7.2} {:>16.4} {:>10.4}",
            cat.factor,
            value,
            cat.target,
            ratio.weighted_sum(&cat.factor, cat.condition)?,
            dd.weighted_sum(&cat.factor, cat.condition)?,
        );
    }

    let min = |p: &Panel| p.weights().iter().copied().fold(f64::INFINITY, f64::min);
    println!(
        "\n  smallest weight: multiplicative {:.4}, dd {:.4}",
        min(&ratio),
        min(&dd)
    );
    Ok(())
}
