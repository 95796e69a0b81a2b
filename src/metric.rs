//! Error metric — distance between current weighted cell totals and targets.
//!
//! Cells are enumerated in the target table's stored order (factor order,
//! then condition order). For each cell the panel's current weighted sum is
//! paired with the target count; the pairs are summarised as mean absolute
//! error, mean squared error or root-mean-squared error.
//!
//! # no_std
//!
//! Float `abs` and `sqrt` are `std` methods, so this module carries its own
//! branch-based `abs` and a Newton-Raphson `sqrt`.

use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::error::{RimError, RimResult};
use crate::panel::Panel;
use crate::target::TargetTable;

/// Absolute value without `std`.
#[inline]
pub(crate) fn abs(x: f64) -> f64 {
    if x < 0.0 {
        -x
    } else {
        x
    }
}

/// Square root of a non-negative f64 by Newton-Raphson iteration.
///
/// The seed halves the exponent through the bit pattern (within ~6%), so
/// six iterations reach full double precision.
pub(crate) fn sqrt_nr(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x <= 0.0 {
        return 0.0;
    }
    let bits = x.to_bits();
    let mut s = f64::from_bits((bits >> 1) + 0x1ff8_0000_0000_0000);
    for _ in 0..6 {
        s = 0.5 * (s + x / s);
    }
    s
}

// ─── ErrorKind ───────────────────────────────────────────────────────────────

/// Summary statistic used to collapse per-cell discrepancies into a scalar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ErrorKind {
    /// Mean absolute error.
    Mae,
    /// Mean squared error.
    Mse,
    /// Root-mean-squared error.
    Rmse,
}

impl ErrorKind {
    /// Lowercase selector name: `"mae"`, `"mse"` or `"rmse"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mae => "mae",
            Self::Mse => "mse",
            Self::Rmse => "rmse",
        }
    }
}

impl FromStr for ErrorKind {
    type Err = RimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mae" => Ok(Self::Mae),
            "mse" => Ok(Self::Mse),
            "rmse" => Ok(Self::Rmse),
            other => Err(RimError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── CellTotals ──────────────────────────────────────────────────────────────

/// Parallel sequences of weighted cell sums and their target counts.
#[derive(Clone, Debug, PartialEq)]
pub struct CellTotals {
    /// Current weighted sum per cell.
    pub weighted: Vec<f64>,
    /// Target count per cell.
    pub targets: Vec<f64>,
}

impl CellTotals {
    /// Collect totals for every target cell in stored order.
    ///
    /// A target category that no respondent falls in contributes a weighted
    /// sum of zero. Fails if a targeted factor has no panel column.
    pub fn collect(panel: &Panel, targets: &TargetTable) -> RimResult<Self> {
        let cells = targets.cell_count();
        let mut weighted = Vec::with_capacity(cells);
        let mut target_values = Vec::with_capacity(cells);

        for factor in targets.factors() {
            let sums = panel.category_sums(factor.name())?;
            for cat in factor.categories() {
                weighted.push(sums.get(cat.condition as usize).copied().unwrap_or(0.0));
                target_values.push(cat.target);
            }
        }

        Ok(Self {
            weighted,
            targets: target_values,
        })
    }

    /// Summarise the per-cell differences with the chosen statistic.
    ///
    /// Returns 0.0 for an empty table.
    pub fn error(&self, kind: ErrorKind) -> f64 {
        let n = self.weighted.len();
        if n == 0 {
            return 0.0;
        }
        let diffs = self.weighted.iter().zip(&self.targets).map(|(v, t)| v - t);
        match kind {
            ErrorKind::Mae => diffs.map(abs).sum::<f64>() / n as f64,
            ErrorKind::Mse => diffs.map(|d| d * d).sum::<f64>() / n as f64,
            ErrorKind::Rmse => sqrt_nr(diffs.map(|d| d * d).sum::<f64>() / n as f64),
        }
    }

    /// Largest absolute per-cell difference.
    pub fn max_abs_diff(&self) -> f64 {
        self.weighted
            .iter()
            .zip(&self.targets)
            .map(|(v, t)| abs(v - t))
            .fold(0.0, f64::max)
    }
}

/// Error between the panel's weighted cell sums and the targets.
pub fn error(panel: &Panel, targets: &TargetTable, kind: ErrorKind) -> RimResult<f64> {
    Ok(CellTotals::collect(panel, targets)?.error(kind))
}

/// Same as [`error`], selecting the statistic by name.
///
/// An unrecognised selector yields [`RimError::UnknownMetric`].
pub fn error_by_name(panel: &Panel, targets: &TargetTable, kind: &str) -> RimResult<f64> {
    let kind: ErrorKind = kind.parse()?;
    error(panel, targets, kind)
}
