//! Error type for panel construction, target joins and fitting.
//!
//! One enum for the whole crate, `thiserror` only. Non-convergence is not an
//! error: an exhausted fit is reported through [`crate::fit::FitStatus`].

use alloc::string::String;

use crate::target::ConditionId;

/// Convenience alias used by every fallible operation in the crate.
pub type RimResult<T> = Result<T, RimError>;

/// Errors raised while building tables or fitting weights.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RimError {
    // ─── selectors and configuration ─────────────────────────────────────

    /// An error-metric selector did not name `mae`, `mse` or `rmse`.
    #[error("unknown error metric: {0:?} (expected \"mae\", \"mse\" or \"rmse\")")]
    UnknownMetric(String),

    /// An update-rule selector did not name a known rule.
    #[error("unknown update rule: {0:?} (expected \"multiplicative\" or \"dd\")")]
    UnknownRule(String),

    /// A fitting configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ─── table construction ──────────────────────────────────────────────

    /// A target share is outside `[0, 1]` or not finite.
    #[error("factor {factor:?}: share {share} for condition {condition} is outside [0, 1]")]
    InvalidShare {
        /// Factor the share belongs to.
        factor: String,
        /// Condition the share belongs to.
        condition: ConditionId,
        /// The rejected share.
        share: f64,
    },

    /// The same factor name was added twice to one table.
    #[error("factor {0:?} is defined more than once")]
    DuplicateFactor(String),

    /// A factor was declared without any category.
    #[error("factor {0:?} has no categories")]
    EmptyFactor(String),

    /// A panel column does not have one value per respondent.
    #[error("column {factor:?} has {actual} values, expected {expected}")]
    ColumnLength {
        /// Column name.
        factor: String,
        /// Respondent count fixed by the first column.
        expected: usize,
        /// Values supplied for this column.
        actual: usize,
    },

    /// A replacement weight column does not match the respondent count.
    #[error("weight column has {actual} values, panel has {expected} respondents")]
    WeightsLength {
        /// Respondent count.
        expected: usize,
        /// Weights supplied.
        actual: usize,
    },

    /// A panel code lies beyond the condition range the column can hold.
    #[error("column {factor:?}: condition {condition} is out of range (limit {limit})")]
    ConditionOutOfRange {
        /// Column name.
        factor: String,
        /// The offending condition code.
        condition: ConditionId,
        /// Exclusive upper bound for this column.
        limit: usize,
    },

    /// The panel has no respondents or no factor columns.
    #[error("panel has no respondents or no factor columns")]
    EmptyPanel,

    // ─── key joins ───────────────────────────────────────────────────────

    /// A targeted factor has no column in the panel.
    #[error("factor {0:?} is not present in the panel")]
    UnknownFactor(String),

    /// An update was requested for a factor the target table does not cover.
    #[error("factor {0:?} has no targets")]
    UntargetedFactor(String),

    /// The panel holds respondents in a category the target table does not cover.
    #[error("factor {factor:?}: panel condition {condition} has no target")]
    MissingTarget {
        /// Factor name.
        factor: String,
        /// Condition present in the panel but absent from the targets.
        condition: ConditionId,
    },

    // ─── numeric failures ────────────────────────────────────────────────

    /// A targeted category carries no weight mass (or no respondents), so its
    /// correction would divide by zero.
    #[error("factor {factor:?}: condition {condition} has no weight mass to rescale")]
    EmptyCategory {
        /// Factor name.
        factor: String,
        /// Condition with zero mass.
        condition: ConditionId,
    },
}
