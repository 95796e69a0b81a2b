//! Weight update rules — one correction of the panel toward one factor's targets.
//!
//! Both rules share the same contract: for the named factor, compare each
//! category's current weighted sum with its target count, derive a per-category
//! correction and apply it to every respondent of that category. The weight
//! column is rewritten in place and returned.
//!
//! - [`Multiplicative`] scales weights by `target / weighted_sum`. Weights stay
//!   positive as long as they start positive.
//! - [`Difference`] ("dd") adds `(target − weighted_sum) / respondent_count` to
//!   each weight. There is no clamping; weights can go negative.
//!
//! # Joining categories to targets
//!
//! Categories are joined by (factor, condition) key. Every condition present in
//! the panel must have a target ([`RimError::MissingTarget`]); every condition
//! with a non-zero target must have something to correct
//! ([`RimError::EmptyCategory`]). A zero target over zero mass is already met
//! and leaves its weights unchanged.
//! All corrections are computed before any weight is touched, so a failing
//! update leaves the weight column as it was.

use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::error::{RimError, RimResult};
use crate::panel::Panel;
use crate::target::{FactorTargets, TargetTable};

// ─── UpdateRule ──────────────────────────────────────────────────────────────

/// A strategy that moves one factor's category totals toward their targets.
pub trait UpdateRule {
    /// Rewrite the panel's weights for `factor` and return the new weight column.
    fn update<'p>(
        &self,
        panel: &'p mut Panel,
        targets: &TargetTable,
        factor: &str,
    ) -> RimResult<&'p [f64]>;
}

// ─── shared join ─────────────────────────────────────────────────────────────

/// Targets, weighted sums and unweighted counts for one factor, aligned by
/// condition and covering every targeted condition.
struct FactorState<'t> {
    targets: &'t FactorTargets,
    sums: Vec<f64>,
    counts: Vec<usize>,
}

impl<'t> FactorState<'t> {
    fn join(panel: &Panel, targets: &'t TargetTable, factor: &str) -> RimResult<Self> {
        let factor_targets = targets
            .factor(factor)
            .ok_or_else(|| RimError::UntargetedFactor(factor.to_string()))?;
        let column = panel
            .column(factor)
            .ok_or_else(|| RimError::UnknownFactor(factor.to_string()))?;

        let mut sums = panel.category_sums(factor)?;
        let mut counts = column.counts();

        for (condition, &count) in counts.iter().enumerate() {
            if count > 0 && condition >= factor_targets.len() {
                return Err(RimError::MissingTarget {
                    factor: factor.to_string(),
                    condition: condition as u32,
                });
            }
        }

        // pad to the full target span so untouched categories show up as zero
        sums.resize(factor_targets.len(), 0.0);
        counts.resize(factor_targets.len(), 0);

        Ok(Self {
            targets: factor_targets,
            sums,
            counts,
        })
    }

    fn empty_category(&self, condition: usize) -> RimError {
        RimError::EmptyCategory {
            factor: self.targets.name().to_string(),
            condition: condition as u32,
        }
    }
}

// ─── Multiplicative ──────────────────────────────────────────────────────────

/// Ratio rule: every weight in a category is multiplied by
/// `target_count / current_weight_sum`.
///
/// After the update, each category's weighted sum equals its target.
///
/// ```rust
/// use rim_weighting::panel::Panel;
/// use rim_weighting::rule::{Multiplicative, UpdateRule};
/// use rim_weighting::target::TargetTable;
///
/// let mut panel = Panel::builder().factor("Gender", &[0, 1, 1, 1]).unwrap().build().unwrap();
/// let targets = TargetTable::builder(4).factor("Gender", &[0.5, 0.5]).unwrap().build();
///
/// let weights = Multiplicative.update(&mut panel, &targets, "Gender").unwrap();
/// assert_eq!(weights[0], 2.0);
/// assert!((weights[1] - 2.0 / 3.0).abs() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Multiplicative;

impl Multiplicative {
    /// Per-condition multipliers for `factor`, indexed by condition.
    pub fn multipliers(
        &self,
        panel: &Panel,
        targets: &TargetTable,
        factor: &str,
    ) -> RimResult<Vec<f64>> {
        let state = FactorState::join(panel, targets, factor)?;
        state
            .targets
            .categories()
            .iter()
            .zip(&state.sums)
            .enumerate()
            .map(|(condition, (cat, &sum))| {
                if sum != 0.0 {
                    Ok(cat.target / sum)
                } else if cat.target == 0.0 {
                    // already on a zero target
                    Ok(1.0)
                } else {
                    Err(state.empty_category(condition))
                }
            })
            .collect()
    }
}

impl UpdateRule for Multiplicative {
    fn update<'p>(
        &self,
        panel: &'p mut Panel,
        targets: &TargetTable,
        factor: &str,
    ) -> RimResult<&'p [f64]> {
        let multipliers = self.multipliers(panel, targets, factor)?;
        tracing::trace!(factor, ?multipliers, "multiplicative update");
        panel.map_weights(factor, |c, w| w * multipliers[c as usize])?;
        Ok(panel.weights())
    }
}

// ─── Difference ──────────────────────────────────────────────────────────────

/// Difference ("dd") rule: every weight in a category is shifted by
/// `(target_count − current_weight_sum) / respondent_count`.
///
/// After the update, each category's weighted sum equals its target, as with
/// the ratio rule, but the correction is additive and unclamped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Difference;

impl Difference {
    /// Per-condition additive corrections for `factor`, indexed by condition.
    pub fn corrections(
        &self,
        panel: &Panel,
        targets: &TargetTable,
        factor: &str,
    ) -> RimResult<Vec<f64>> {
        let state = FactorState::join(panel, targets, factor)?;
        state
            .targets
            .categories()
            .iter()
            .zip(state.sums.iter().zip(&state.counts))
            .enumerate()
            .map(|(condition, (cat, (&sum, &count)))| {
                if count != 0 {
                    Ok((cat.target - sum) / count as f64)
                } else if cat.target == 0.0 {
                    Ok(0.0)
                } else {
                    Err(state.empty_category(condition))
                }
            })
            .collect()
    }
}

impl UpdateRule for Difference {
    fn update<'p>(
        &self,
        panel: &'p mut Panel,
        targets: &TargetTable,
        factor: &str,
    ) -> RimResult<&'p [f64]> {
        let corrections = self.corrections(panel, targets, factor)?;
        tracing::trace!(factor, ?corrections, "difference update");
        panel.map_weights(factor, |c, w| w + corrections[c as usize])?;
        Ok(panel.weights())
    }
}

// ─── UpdateRuleKind ──────────────────────────────────────────────────────────

/// Configuration-level selector between the two update rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UpdateRuleKind {
    /// [`Multiplicative`], the default.
    #[default]
    Multiplicative,
    /// [`Difference`].
    #[cfg_attr(feature = "serde", serde(rename = "dd"))]
    Difference,
}

impl UpdateRuleKind {
    /// Selector name: `"multiplicative"` or `"dd"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Multiplicative => "multiplicative",
            Self::Difference => "dd",
        }
    }
}

impl UpdateRule for UpdateRuleKind {
    fn update<'p>(
        &self,
        panel: &'p mut Panel,
        targets: &TargetTable,
        factor: &str,
    ) -> RimResult<&'p [f64]> {
        match self {
            Self::Multiplicative => Multiplicative.update(panel, targets, factor),
            Self::Difference => Difference.update(panel, targets, factor),
        }
    }
}

impl FromStr for UpdateRuleKind {
    type Err = RimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiplicative" | "default" => Ok(Self::Multiplicative),
            "dd" | "difference" => Ok(Self::Difference),
            other => Err(RimError::UnknownRule(other.to_string())),
        }
    }
}

impl fmt::Display for UpdateRuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
