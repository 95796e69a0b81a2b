//! Target table — desired population shares and absolute counts per category.
//!
//! A target table is built once from external population statistics and the
//! panel's respondent count. Each factor keeps its categories in condition
//! order, and factors keep the order they were added in; that factor order is
//! the order the convergence loop visits them.
//!
//! # Invariants
//!
//! - Condition identifiers within a factor are a dense zero-based sequence:
//!   the i-th share supplied for a factor becomes condition `i`.
//! - `target = share × sample_size` for every category.
//! - Shares per factor are expected to sum to 1. The builder does not reject
//!   tables that drift from 1; it logs a warning instead.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::{RimError, RimResult};
use crate::metric::abs;

/// Ordinal identifier of a category within its factor.
pub type ConditionId = u32;

/// How far a factor's shares may drift from 1.0 before a warning is logged.
const SHARE_SUM_TOLERANCE: f64 = 1e-6;

// ─── Category ────────────────────────────────────────────────────────────────

/// One (factor, condition) cell of the target table.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Category {
    /// Name of the factor this category belongs to.
    pub factor: String,
    /// Ordinal condition identifier, unique within the factor.
    pub condition: ConditionId,
    /// Desired population share in `[0, 1]`.
    pub share: f64,
    /// Absolute target count: `share × sample_size`.
    pub target: f64,
}

// ─── FactorTargets ───────────────────────────────────────────────────────────

/// All categories of one factor, in condition order.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FactorTargets {
    name: String,
    categories: Vec<Category>,
}

impl FactorTargets {
    /// Factor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Categories in condition order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Look up the category with the given condition identifier.
    pub fn get(&self, condition: ConditionId) -> Option<&Category> {
        self.categories.get(condition as usize)
    }

    /// Number of categories in this factor.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Always `false` for factors built through [`TargetTableBuilder`].
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

// ─── TargetTable ─────────────────────────────────────────────────────────────

/// Ordered collection of category targets, grouped by factor.
///
/// ```rust
/// use rim_weighting::target::TargetTable;
///
/// let targets = TargetTable::builder(100)
///     .factor("Gender", &[0.5, 0.5]).unwrap()
///     .factor("Age_group", &[0.2, 0.6, 0.2]).unwrap()
///     .build();
///
/// assert_eq!(targets.target("Age_group", 1), Some(60.0));
/// assert_eq!(targets.cell_count(), 5);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetTable {
    sample_size: usize,
    factors: Vec<FactorTargets>,
}

impl TargetTable {
    /// Start building a table for a panel of `sample_size` respondents.
    pub fn builder(sample_size: usize) -> TargetTableBuilder {
        TargetTableBuilder {
            sample_size,
            factors: Vec::new(),
        }
    }

    /// Respondent count the absolute targets were derived from.
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Factors in fitting order.
    pub fn factors(&self) -> &[FactorTargets] {
        &self.factors
    }

    /// Look up a factor by name.
    pub fn factor(&self, name: &str) -> Option<&FactorTargets> {
        self.factors.iter().find(|f| f.name == name)
    }

    /// Absolute target count for one (factor, condition) cell.
    pub fn target(&self, factor: &str, condition: ConditionId) -> Option<f64> {
        self.factor(factor)
            .and_then(|f| f.get(condition))
            .map(|c| c.target)
    }

    /// Every category in stored order: factor order, then condition order.
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.factors.iter().flat_map(|f| f.categories.iter())
    }

    /// Total number of (factor, condition) cells.
    pub fn cell_count(&self) -> usize {
        self.factors.iter().map(|f| f.categories.len()).sum()
    }
}

// ─── TargetTableBuilder ──────────────────────────────────────────────────────

/// Builder for [`TargetTable`]. Factors are fitted in the order they are added.
#[derive(Clone, Debug)]
pub struct TargetTableBuilder {
    sample_size: usize,
    factors: Vec<FactorTargets>,
}

impl TargetTableBuilder {
    /// Add a factor whose i-th share becomes condition `i`.
    ///
    /// Rejects duplicate factor names, empty share lists and shares outside
    /// `[0, 1]`.
    pub fn factor(mut self, name: &str, shares: &[f64]) -> RimResult<Self> {
        if self.factors.iter().any(|f| f.name == name) {
            return Err(RimError::DuplicateFactor(name.to_string()));
        }
        if shares.is_empty() {
            return Err(RimError::EmptyFactor(name.to_string()));
        }

        let n = self.sample_size as f64;
        let mut categories = Vec::with_capacity(shares.len());
        for (i, &share) in shares.iter().enumerate() {
            let condition = i as ConditionId;
            if !share.is_finite() || !(0.0..=1.0).contains(&share) {
                return Err(RimError::InvalidShare {
                    factor: name.to_string(),
                    condition,
                    share,
                });
            }
            categories.push(Category {
                factor: name.to_string(),
                condition,
                share,
                target: share * n,
            });
        }

        let total: f64 = shares.iter().sum();
        if abs(total - 1.0) > SHARE_SUM_TOLERANCE {
            tracing::warn!(factor = name, total, "target shares do not sum to 1");
        }

        self.factors.push(FactorTargets {
            name: name.to_string(),
            categories,
        });
        Ok(self)
    }

    /// Finish the table.
    pub fn build(self) -> TargetTable {
        TargetTable {
            sample_size: self.sample_size,
            factors: self.factors,
        }
    }
}
