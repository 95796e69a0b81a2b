//! Fit report — portable snapshot of a finished fitting run.
//!
//! A [`FitReport`] captures everything a reporting collaborator needs to plot
//! or audit a run: the rule used, how the loop ended, the per-iteration error
//! trace, the final weights and the weighted total of every target cell next
//! to its target.
//!
//! # no_std
//!
//! This module requires the `serde` feature. It only uses `alloc` types.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::RimResult;
use crate::fit::{ErrorTrace, FitOutcome, FitStatus};
use crate::metric::abs;
use crate::panel::Panel;
use crate::rule::UpdateRuleKind;
use crate::target::{ConditionId, TargetTable};

/// Current fit report format version.
pub const FIT_REPORT_VERSION: u16 = 1;

/// Weighted total of one (factor, condition) cell next to its target.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct CellRecord {
    /// Factor name.
    pub factor: String,
    /// Condition identifier.
    pub condition: ConditionId,
    /// Target count.
    pub target: f64,
    /// Weighted sum after fitting.
    pub weighted: f64,
}

impl CellRecord {
    /// `weighted − target`.
    pub fn residual(&self) -> f64 {
        self.weighted - self.target
    }
}

/// Serialisable summary of one fitting run.
///
/// ```rust,ignore
/// let outcome = engine.fit(&mut panel, &targets)?;
/// let report = FitReport::from_fit(&panel, &targets, rule, &outcome)?;
/// let json = serde_json::to_string(&report).unwrap();
/// ```
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct FitReport {
    /// Format version. Always [`FIT_REPORT_VERSION`] for new reports.
    pub version: u16,
    /// Update rule the run used.
    pub rule: UpdateRuleKind,
    /// How the loop ended.
    pub status: FitStatus,
    /// Per-iteration RMSE and MAE.
    pub trace: ErrorTrace,
    /// Final weight of every respondent, in panel order.
    pub weights: Vec<f64>,
    /// Every target cell in stored order.
    pub cells: Vec<CellRecord>,
}

impl FitReport {
    /// Build a report from a fitted panel and its outcome.
    pub fn from_fit(
        panel: &Panel,
        targets: &TargetTable,
        rule: UpdateRuleKind,
        outcome: &FitOutcome,
    ) -> RimResult<Self> {
        let mut cells = Vec::with_capacity(targets.cell_count());
        for factor in targets.factors() {
            let sums = panel.category_sums(factor.name())?;
            for cat in factor.categories() {
                cells.push(CellRecord {
                    factor: cat.factor.clone(),
                    condition: cat.condition,
                    target: cat.target,
                    weighted: sums.get(cat.condition as usize).copied().unwrap_or(0.0),
                });
            }
        }

        Ok(Self {
            version: FIT_REPORT_VERSION,
            rule,
            status: outcome.status,
            trace: outcome.trace.clone(),
            weights: panel.weights().to_vec(),
            cells,
        })
    }

    /// Look up the cell for a (factor, condition) pair.
    pub fn cell(&self, factor: &str, condition: ConditionId) -> Option<&CellRecord> {
        self.cells
            .iter()
            .find(|c| c.factor == factor && c.condition == condition)
    }

    /// Largest absolute cell residual.
    pub fn max_residual(&self) -> f64 {
        self.cells
            .iter()
            .map(|c| abs(c.residual()))
            .fold(0.0, f64::max)
    }
}
