//! Panel table — respondents, their category codes and their weights.
//!
//! The panel is stored column-wise: one condition column per factor plus a
//! single weight column shared by all factors. Condition identifiers are the
//! join key against the target table; a loader either supplies them directly
//! or hands over raw values, which are coded into dense zero-based identifiers
//! in ascending order of value.
//!
//! Only the weight column is mutable after construction. Independent fitting
//! runs should each start from their own `clone()` of the freshly built panel.

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::error::{RimError, RimResult};
use crate::target::ConditionId;

/// Exclusive upper bound on condition identifiers supplied directly.
pub const MAX_CONDITIONS: usize = 1 << 16;

// ─── FactorColumn ────────────────────────────────────────────────────────────

/// One factor column: a condition identifier per respondent.
///
/// Condition identifiers are the join key against the target table. When a
/// column is built from raw values, the ascending value coding is kept so the
/// identifiers can be mapped back.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FactorColumn {
    name: String,
    codes: Vec<ConditionId>,
    /// `coding[id]` is the raw value coded as condition `id`. Ascending.
    coding: Option<Vec<i64>>,
}

impl FactorColumn {
    fn from_conditions(name: &str, conditions: &[ConditionId]) -> Self {
        Self {
            name: name.to_string(),
            codes: conditions.to_vec(),
            coding: None,
        }
    }

    /// Code raw values into dense condition identifiers, ascending by value.
    fn from_values(name: &str, raw: &[i64]) -> Self {
        let mut values: Vec<i64> = raw.to_vec();
        values.sort_unstable();
        values.dedup();

        let index: HashMap<i64, ConditionId> = values
            .iter()
            .enumerate()
            .map(|(id, &v)| (v, id as ConditionId))
            .collect();
        let codes = raw.iter().map(|v| index[v]).collect();

        Self {
            name: name.to_string(),
            codes,
            coding: Some(values),
        }
    }

    /// Check the column holds `len` codes, each inside its condition range.
    fn check(&self, len: usize) -> RimResult<()> {
        if self.codes.len() != len {
            return Err(RimError::ColumnLength {
                factor: self.name.clone(),
                expected: len,
                actual: self.codes.len(),
            });
        }
        let limit = self.coding.as_ref().map_or(MAX_CONDITIONS, Vec::len);
        match self.codes.iter().find(|&&c| c as usize >= limit) {
            Some(&condition) => Err(RimError::ConditionOutOfRange {
                factor: self.name.clone(),
                condition,
                limit,
            }),
            None => Ok(()),
        }
    }

    /// Factor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Condition identifier of every respondent, in respondent order.
    pub fn codes(&self) -> &[ConditionId] {
        &self.codes
    }

    /// One past the largest condition identifier present.
    pub fn span(&self) -> usize {
        self.codes.iter().max().map_or(0, |&c| c as usize + 1)
    }

    /// Distinct condition identifiers present, ascending.
    pub fn conditions(&self) -> Vec<ConditionId> {
        let mut present: Vec<ConditionId> = self.codes.clone();
        present.sort_unstable();
        present.dedup();
        present
    }

    /// Raw value behind `condition`. Columns built from condition identifiers
    /// map every identifier to itself.
    pub fn value_of(&self, condition: ConditionId) -> Option<i64> {
        match &self.coding {
            Some(values) => values.get(condition as usize).copied(),
            None => Some(i64::from(condition)),
        }
    }

    /// Condition identifier assigned to a raw value.
    pub fn condition_of(&self, value: i64) -> Option<ConditionId> {
        match &self.coding {
            Some(values) => values.binary_search(&value).ok().map(|i| i as ConditionId),
            None => ConditionId::try_from(value).ok(),
        }
    }

    /// Unweighted respondent count per condition, indexed by condition.
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.span()];
        for &c in &self.codes {
            counts[c as usize] += 1;
        }
        counts
    }
}

// ─── Respondent ──────────────────────────────────────────────────────────────

/// Row view of one respondent.
#[derive(Clone, Copy, Debug)]
pub struct Respondent<'a> {
    panel: &'a Panel,
    index: usize,
}

impl Respondent<'_> {
    /// Position of this respondent in the panel.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current weight.
    pub fn weight(&self) -> f64 {
        self.panel.weights[self.index]
    }

    /// Condition code for the named factor.
    pub fn condition(&self, factor: &str) -> Option<ConditionId> {
        self.panel
            .column(factor)
            .map(|col| col.codes[self.index])
    }
}

// ─── Panel ───────────────────────────────────────────────────────────────────

/// The full set of respondents with a mutable weight column.
///
/// ```rust
/// use rim_weighting::panel::Panel;
///
/// let panel = Panel::builder()
///     .factor("Gender", &[1, 0, 1, 1]).unwrap()
///     .factor_values("Age", &[34, 19, 60, 34]).unwrap()
///     .build().unwrap();
///
/// assert_eq!(panel.len(), 4);
/// assert_eq!(panel.weights(), &[1.0; 4]);
/// // ages 19 < 34 < 60 become conditions 0, 1, 2
/// assert_eq!(panel.column("Age").unwrap().codes(), &[1, 0, 2, 1]);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "PanelParts"))]
pub struct Panel {
    columns: Vec<FactorColumn>,
    weights: Vec<f64>,
}

/// Unchecked wire form of a [`Panel`]; rebuilt through [`PanelBuilder`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct PanelParts {
    columns: Vec<FactorColumn>,
    weights: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<PanelParts> for Panel {
    type Error = RimError;

    fn try_from(parts: PanelParts) -> RimResult<Self> {
        let mut builder = Panel::builder();
        for column in parts.columns {
            builder = builder.push(column)?;
        }
        let mut panel = builder.build()?;
        panel.set_weights(parts.weights)?;
        Ok(panel)
    }
}

impl Panel {
    /// Start building a panel column by column.
    pub fn builder() -> PanelBuilder {
        PanelBuilder {
            columns: Vec::new(),
            len: None,
        }
    }

    /// Number of respondents.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// `true` if the panel has no respondents. Never the case for built panels.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Factor columns in the order they were added.
    pub fn columns(&self) -> &[FactorColumn] {
        &self.columns
    }

    /// Look up a factor column by name.
    pub fn column(&self, factor: &str) -> Option<&FactorColumn> {
        self.columns.iter().find(|c| c.name == factor)
    }

    fn column_or_err(&self, factor: &str) -> RimResult<&FactorColumn> {
        self.column(factor)
            .ok_or_else(|| RimError::UnknownFactor(factor.to_string()))
    }

    /// Current weight column.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Mutable weight column.
    pub fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    /// Replace the whole weight column.
    pub fn set_weights(&mut self, weights: Vec<f64>) -> RimResult<()> {
        if weights.len() != self.weights.len() {
            return Err(RimError::WeightsLength {
                expected: self.weights.len(),
                actual: weights.len(),
            });
        }
        self.weights = weights;
        Ok(())
    }

    /// Reset every weight to 1.0.
    pub fn reset_weights(&mut self) {
        self.weights.iter_mut().for_each(|w| *w = 1.0);
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Row view of respondent `index`.
    pub fn respondent(&self, index: usize) -> Option<Respondent<'_>> {
        (index < self.len()).then_some(Respondent { panel: self, index })
    }

    /// Iterate over all respondents.
    pub fn respondents(&self) -> impl Iterator<Item = Respondent<'_>> {
        (0..self.len()).map(move |index| Respondent { panel: self, index })
    }

    /// Weighted sum per condition of `factor`, indexed by condition.
    pub fn category_sums(&self, factor: &str) -> RimResult<Vec<f64>> {
        let col = self.column_or_err(factor)?;
        let mut sums = vec![0.0f64; col.span()];
        for (&c, &w) in col.codes.iter().zip(&self.weights) {
            sums[c as usize] += w;
        }
        Ok(sums)
    }

    /// Weighted sum of one (factor, condition) cell. Zero for conditions no
    /// respondent falls in.
    pub fn weighted_sum(&self, factor: &str, condition: ConditionId) -> RimResult<f64> {
        let sums = self.category_sums(factor)?;
        Ok(sums.get(condition as usize).copied().unwrap_or(0.0))
    }

    /// Rewrite every weight from its current value and the respondent's
    /// condition for `factor`.
    pub(crate) fn map_weights<F>(&mut self, factor: &str, mut f: F) -> RimResult<()>
    where
        F: FnMut(ConditionId, f64) -> f64,
    {
        let Panel { columns, weights } = self;
        let col = columns
            .iter()
            .find(|c| c.name == factor)
            .ok_or_else(|| RimError::UnknownFactor(factor.to_string()))?;
        for (w, &c) in weights.iter_mut().zip(&col.codes) {
            *w = f(c, *w);
        }
        Ok(())
    }
}

// ─── PanelBuilder ────────────────────────────────────────────────────────────

/// Builder for [`Panel`]. Every column must have one value per respondent.
#[derive(Clone, Debug)]
pub struct PanelBuilder {
    columns: Vec<FactorColumn>,
    len: Option<usize>,
}

impl PanelBuilder {
    /// Add a factor column of condition identifiers.
    ///
    /// Identifiers must be below [`MAX_CONDITIONS`].
    pub fn factor(self, name: &str, conditions: &[ConditionId]) -> RimResult<Self> {
        self.push(FactorColumn::from_conditions(name, conditions))
    }

    /// Add a factor column of raw values, coded ascending by value.
    pub fn factor_values(self, name: &str, values: &[i64]) -> RimResult<Self> {
        self.push(FactorColumn::from_values(name, values))
    }

    fn push(mut self, column: FactorColumn) -> RimResult<Self> {
        if self.columns.iter().any(|c| c.name == column.name) {
            return Err(RimError::DuplicateFactor(column.name));
        }
        let len = self.len.unwrap_or(column.codes.len());
        column.check(len)?;
        self.len = Some(len);
        self.columns.push(column);
        Ok(self)
    }

    /// Finish the panel with every weight set to 1.0.
    pub fn build(self) -> RimResult<Panel> {
        let len = match self.len {
            Some(n) if n > 0 => n,
            _ => return Err(RimError::EmptyPanel),
        };
        Ok(Panel {
            columns: self.columns,
            weights: vec![1.0; len],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_panel() -> Panel {
        Panel::builder()
            .factor("Gender", &[1, 0, 1, 1, 0])
            .unwrap()
            .factor("Age_group", &[2, 0, 1, 1, 0])
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn weights_start_at_one() {
        let p = small_panel();
        assert_eq!(p.weights(), &[1.0; 5]);
        assert_eq!(p.total_weight(), 5.0);
    }

    #[test]
    fn raw_values_are_coded_ascending() {
        let p = Panel::builder()
            .factor_values("Region", &[40, -3, 7, 40])
            .unwrap()
            .build()
            .unwrap();
        let col = p.column("Region").unwrap();
        assert_eq!(col.codes(), &[2, 0, 1, 2]);
        assert_eq!(col.value_of(0), Some(-3));
        assert_eq!(col.value_of(2), Some(40));
        assert_eq!(col.value_of(3), None);
        assert_eq!(col.condition_of(7), Some(1));
        assert_eq!(col.condition_of(8), None);
        assert_eq!(col.conditions(), [0, 1, 2]);
    }

    #[test]
    fn supplied_conditions_are_kept_as_keys() {
        // condition 1 has no respondents; 2 must stay 2
        let p = Panel::builder()
            .factor("Age_group", &[0, 2, 2, 0])
            .unwrap()
            .build()
            .unwrap();
        let col = p.column("Age_group").unwrap();
        assert_eq!(col.codes(), &[0, 2, 2, 0]);
        assert_eq!(col.conditions(), [0, 2]);
        assert_eq!(col.span(), 3);
        assert_eq!(col.counts(), [2, 0, 2]);
        assert_eq!(col.value_of(2), Some(2));
        assert_eq!(col.condition_of(-1), None);
        assert_eq!(p.category_sums("Age_group").unwrap(), [2.0, 0.0, 2.0]);
    }

    #[test]
    fn counts_and_sums_per_condition() {
        let mut p = small_panel();
        assert_eq!(p.column("Gender").unwrap().counts(), [2, 3]);
        p.set_weights(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(p.category_sums("Gender").unwrap(), [7.0, 8.0]);
        assert_eq!(p.category_sums("Age_group").unwrap(), [7.0, 7.0, 1.0]);
        assert_eq!(p.weighted_sum("Age_group", 1).unwrap(), 7.0);
        assert_eq!(p.weighted_sum("Age_group", 9).unwrap(), 0.0);
    }

    #[test]
    fn unknown_factor_is_an_error() {
        let p = small_panel();
        assert_eq!(
            p.category_sums("Region").unwrap_err(),
            RimError::UnknownFactor("Region".into())
        );
    }

    #[test]
    fn map_weights_sees_each_condition() {
        let mut p = small_panel();
        p.map_weights("Gender", |c, w| if c == 1 { w * 2.0 } else { w })
            .unwrap();
        assert_eq!(p.weights(), &[2.0, 1.0, 2.0, 2.0, 1.0]);
        assert!(p.map_weights("Region", |_, w| w).is_err());
    }

    #[test]
    fn respondent_view_reads_codes_and_weight() {
        let mut p = small_panel();
        p.weights_mut()[2] = 0.5;
        let r = p.respondent(2).unwrap();
        assert_eq!(r.index(), 2);
        assert_eq!(r.weight(), 0.5);
        assert_eq!(r.condition("Gender"), Some(1));
        assert_eq!(r.condition("Age_group"), Some(1));
        assert_eq!(r.condition("Region"), None);
        assert!(p.respondent(5).is_none());
        assert_eq!(p.respondents().count(), 5);
    }

    #[test]
    fn mismatched_column_length_rejected() {
        let err = Panel::builder()
            .factor("Gender", &[0, 1, 0])
            .unwrap()
            .factor("Age_group", &[0, 1])
            .unwrap_err();
        assert_eq!(
            err,
            RimError::ColumnLength {
                factor: "Age_group".into(),
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn duplicate_column_rejected() {
        let err = Panel::builder()
            .factor("Gender", &[0, 1])
            .unwrap()
            .factor_values("Gender", &[3, 4])
            .unwrap_err();
        assert_eq!(err, RimError::DuplicateFactor("Gender".into()));
    }

    #[test]
    fn empty_panel_rejected() {
        assert_eq!(Panel::builder().build().unwrap_err(), RimError::EmptyPanel);
        assert_eq!(
            Panel::builder().factor("Gender", &[]).unwrap().build().unwrap_err(),
            RimError::EmptyPanel
        );
    }

    #[test]
    fn set_weights_checks_length() {
        let mut p = small_panel();
        assert_eq!(
            p.set_weights(vec![1.0; 3]).unwrap_err(),
            RimError::WeightsLength { expected: 5, actual: 3 }
        );
    }

    #[test]
    fn reset_restores_unit_weights() {
        let mut p = small_panel();
        p.weights_mut().iter_mut().for_each(|w| *w *= 3.0);
        p.reset_weights();
        assert_eq!(p.weights(), &[1.0; 5]);
    }

    #[test]
    fn clones_are_independent() {
        let original = small_panel();
        let mut copy = original.clone();
        copy.weights_mut()[0] = 9.0;
        assert_eq!(original.weights()[0], 1.0);
    }

    #[test]
    fn stray_condition_code_rejected() {
        let err = Panel::builder()
            .factor("Gender", &[0, 1, ConditionId::MAX])
            .unwrap_err();
        assert_eq!(
            err,
            RimError::ConditionOutOfRange {
                factor: "Gender".into(),
                condition: ConditionId::MAX,
                limit: MAX_CONDITIONS
            }
        );
        let last = (MAX_CONDITIONS - 1) as ConditionId;
        assert!(Panel::builder().factor("Gender", &[0, last]).is_ok());
    }

    #[cfg(feature = "serde")]
    mod serde_tests {
        use super::*;

        #[test]
        fn panel_json_round_trip() {
            let mut p = small_panel();
            p.set_weights(vec![0.5, 1.5, 1.0, 2.0, 1.0]).unwrap();
            let json = serde_json::to_string(&p).unwrap();
            let restored: Panel = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, p);
        }

        #[test]
        fn weights_longer_than_columns_rejected() {
            let json = r#"{"columns":[{"name":"Gender","codes":[0,1],"coding":null}],"weights":[1,1,1]}"#;
            let err = serde_json::from_str::<Panel>(json).unwrap_err();
            assert!(err.to_string().contains("weight column has 3 values"), "{err}");
        }

        #[test]
        fn ragged_columns_rejected() {
            let json = r#"{"columns":[
                {"name":"Gender","codes":[0,1],"coding":null},
                {"name":"Age_group","codes":[0],"coding":null}
            ],"weights":[1,1]}"#;
            let err = serde_json::from_str::<Panel>(json).unwrap_err();
            assert!(err.to_string().contains("column \"Age_group\" has 1 values"), "{err}");
        }

        #[test]
        fn empty_panel_rejected() {
            let err = serde_json::from_str::<Panel>(r#"{"columns":[],"weights":[]}"#).unwrap_err();
            assert!(err.to_string().contains("panel has no respondents"), "{err}");
        }

        #[test]
        fn code_outside_coding_rejected() {
            let json = r#"{"columns":[{"name":"Age","codes":[0,2],"coding":[19,34]}],"weights":[1,1]}"#;
            let err = serde_json::from_str::<Panel>(json).unwrap_err();
            assert!(err.to_string().contains("out of range"), "{err}");
        }
    }
}
