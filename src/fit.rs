//! Convergence loop — raking the panel across all factors until the targets fit.
//!
//! One iteration applies the configured update rule once per factor, in the
//! target table's factor order, then records the RMSE and MAE over all
//! (factor, condition) cells. The loop stops as soon as the RMSE falls below
//! the tolerance, or when the iteration budget runs out.
//!
//! Factor order matters: the result is not order-invariant in general.
//!
//! # Invariants
//!
//! - The error trace has one record per completed iteration and stops at the
//!   iteration that converged; it is never padded to `max_iterations`.
//! - Running out of iterations is not an error. The weights reached so far are
//!   kept and the status says [`FitStatus::Exhausted`].
//! - A failure inside a pass leaves the factors already updated in that pass
//!   as they are. Nothing is rolled back.

use alloc::format;
use alloc::vec::Vec;

use crate::error::{RimError, RimResult};
use crate::metric::{CellTotals, ErrorKind};
use crate::panel::Panel;
use crate::rule::{UpdateRule, UpdateRuleKind};
use crate::target::TargetTable;

/// Default RMSE below which the loop stops.
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Default iteration budget.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

// ─── RimConfig ───────────────────────────────────────────────────────────────

/// Configuration for [`RimWeighting`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RimConfig {
    /// Maximum number of full passes over all factors. Default: 10.
    pub max_iterations: u32,

    /// Stop once the RMSE over all cells is strictly below this value.
    /// Default: 1e-8.
    pub tolerance: f64,

    /// Update rule applied to each factor. Default: multiplicative.
    pub rule: UpdateRuleKind,
}

impl Default for RimConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            rule: UpdateRuleKind::Multiplicative,
        }
    }
}

impl RimConfig {
    /// Reject a negative or non-finite tolerance.
    pub fn validate(&self) -> RimResult<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(RimError::InvalidConfig(format!(
                "tolerance must be a finite non-negative number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

// ─── ErrorTrace ──────────────────────────────────────────────────────────────

/// Error metrics recorded after one full pass over all factors.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorRecord {
    /// 1-based iteration number.
    pub iteration: u32,
    /// Root-mean-squared error over all cells.
    pub rmse: f64,
    /// Mean absolute error over all cells.
    pub mae: f64,
}

impl ErrorRecord {
    /// Value of the requested metric, if it was recorded.
    pub fn get(&self, kind: ErrorKind) -> Option<f64> {
        match kind {
            ErrorKind::Rmse => Some(self.rmse),
            ErrorKind::Mae => Some(self.mae),
            ErrorKind::Mse => None,
        }
    }
}

/// Append-only sequence of [`ErrorRecord`]s, one per completed iteration.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ErrorTrace {
    records: Vec<ErrorRecord>,
}

impl ErrorTrace {
    /// Empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, record: ErrorRecord) {
        self.records.push(record);
    }

    /// All records in iteration order.
    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    /// Number of recorded iterations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if no iteration completed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record of the last completed iteration.
    pub fn last(&self) -> Option<&ErrorRecord> {
        self.records.last()
    }

    /// One metric as a column, in iteration order. Empty for metrics the trace
    /// does not record.
    pub fn column(&self, kind: ErrorKind) -> Vec<f64> {
        self.records.iter().filter_map(|r| r.get(kind)).collect()
    }
}

// ─── FitOutcome ──────────────────────────────────────────────────────────────

/// How the convergence loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", rename_all = "lowercase"))]
pub enum FitStatus {
    /// RMSE fell below the tolerance after `iterations` passes.
    Converged {
        /// Passes completed, including the converging one.
        iterations: u32,
    },
    /// The iteration budget ran out first.
    Exhausted {
        /// Passes completed (= `max_iterations`).
        iterations: u32,
    },
}

impl FitStatus {
    /// `true` for [`FitStatus::Converged`].
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    /// Passes completed.
    pub fn iterations(&self) -> u32 {
        match *self {
            Self::Converged { iterations } | Self::Exhausted { iterations } => iterations,
        }
    }
}

/// Result of one fitting run.
#[derive(Clone, Debug, PartialEq)]
pub struct FitOutcome {
    /// How the loop ended.
    pub status: FitStatus,
    /// Per-iteration error trace.
    pub trace: ErrorTrace,
}

impl FitOutcome {
    /// RMSE after the last completed iteration, if any iteration completed.
    pub fn final_rmse(&self) -> Option<f64> {
        self.trace.last().map(|r| r.rmse)
    }
}

// ─── RimWeighting ────────────────────────────────────────────────────────────

/// RIM weighting engine.
///
/// ```rust
/// use rim_weighting::fit::RimWeighting;
/// use rim_weighting::panel::Panel;
/// use rim_weighting::target::TargetTable;
///
/// let gender: Vec<u32> = (0..100).map(|i| u32::from(i < 60)).collect();
/// let mut panel = Panel::builder().factor("Gender", &gender).unwrap().build().unwrap();
/// let targets = TargetTable::builder(100).factor("Gender", &[0.5, 0.5]).unwrap().build();
///
/// let outcome = RimWeighting::default().fit(&mut panel, &targets).unwrap();
/// assert!(outcome.status.is_converged());
/// assert!((panel.weighted_sum("Gender", 1).unwrap() - 50.0).abs() < 1e-9);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RimWeighting {
    /// Iteration budget, tolerance and update rule.
    pub config: RimConfig,
}

impl RimWeighting {
    /// Engine with the given configuration.
    pub fn new(config: RimConfig) -> Self {
        Self { config }
    }

    /// Engine with the given budget and rule and the default tolerance.
    pub fn with_rule(max_iterations: u32, rule: UpdateRuleKind) -> Self {
        Self::new(RimConfig {
            max_iterations,
            rule,
            ..RimConfig::default()
        })
    }

    /// Fit the panel's weights in place and return the status and error trace.
    pub fn fit(&self, panel: &mut Panel, targets: &TargetTable) -> RimResult<FitOutcome> {
        self.config.validate()?;
        let rule = self.config.rule;
        let mut trace = ErrorTrace::new();

        for iteration in 1..=self.config.max_iterations {
            for factor in targets.factors() {
                rule.update(panel, targets, factor.name())?;
            }

            let totals = CellTotals::collect(panel, targets)?;
            let record = ErrorRecord {
                iteration,
                rmse: totals.error(ErrorKind::Rmse),
                mae: totals.error(ErrorKind::Mae),
            };
            tracing::debug!(
                iteration,
                rmse = record.rmse,
                mae = record.mae,
                rule = rule.as_str(),
                "rim iteration complete"
            );
            trace.push(record);

            if record.rmse < self.config.tolerance {
                tracing::info!(iterations = iteration, rmse = record.rmse, "rim weighting converged");
                return Ok(FitOutcome {
                    status: FitStatus::Converged { iterations: iteration },
                    trace,
                });
            }
        }

        let iterations = self.config.max_iterations;
        tracing::warn!(
            iterations,
            rmse = trace.last().map_or(f64::NAN, |r| r.rmse),
            "rim weighting did not converge within the iteration budget"
        );
        Ok(FitOutcome {
            status: FitStatus::Exhausted { iterations },
            trace,
        })
    }

    /// Fit a copy of `panel`, leaving the original untouched.
    pub fn fit_copy(
        &self,
        panel: &Panel,
        targets: &TargetTable,
    ) -> RimResult<(Panel, FitOutcome)> {
        let mut fitted = panel.clone();
        let outcome = self.fit(&mut fitted, targets)?;
        Ok((fitted, outcome))
    }
}

/// Fit `panel` with `max_iterations` passes of `rule` and return the weighted
/// panel together with its error trace.
pub fn rim(
    mut panel: Panel,
    targets: &TargetTable,
    max_iterations: u32,
    rule: UpdateRuleKind,
) -> RimResult<(Panel, ErrorTrace)> {
    let outcome = RimWeighting::with_rule(max_iterations, rule).fit(&mut panel, targets)?;
    Ok((panel, outcome.trace))
}
