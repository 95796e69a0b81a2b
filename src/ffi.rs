//! Python FFI bindings via PyO3.
//!
//! Exposes the fitting engine to Python with plain lists: panel columns as
//! `(name, [condition, ...])` pairs and targets as `(name, [share, ...])` pairs,
//! where the i-th share belongs to condition `i`.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! from rim_weighting import rim, calculate_error
//!
//! columns = [("Gender", gender_codes), ("Age_group", age_codes)]
//! targets = [("Gender", [0.5, 0.5]), ("Age_group", [0.2, 0.6, 0.2])]
//!
//! weights, errors = rim(columns, targets, n_iter=10)
//! weights_dd, errors_dd = rim(columns, targets, n_iter=20, dd=True)
//! print([mae for _, mae in errors])
//! print(calculate_error(columns, weights, targets, "rmse"))
//! ```

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::error::RimError;
use crate::fit::RimWeighting;
use crate::metric::{error, ErrorKind};
use crate::panel::Panel;
use crate::rule::UpdateRuleKind;
use crate::target::{ConditionId, TargetTable};

fn to_py_err(e: RimError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn build_tables(
    columns: &[(String, Vec<ConditionId>)],
    targets: &[(String, Vec<f64>)],
) -> Result<(Panel, TargetTable), RimError> {
    let mut builder = Panel::builder();
    for (name, codes) in columns {
        builder = builder.factor(name, codes)?;
    }
    let panel = builder.build()?;

    let mut table = TargetTable::builder(panel.len());
    for (name, shares) in targets {
        table = table.factor(name, shares)?;
    }
    Ok((panel, table.build()))
}

/// Fit respondent weights to the targets.
///
/// Args:
///     columns: list of (factor name, condition per respondent)
///     targets: list of (factor name, share per condition); fitted in this order
///     n_iter:  iteration budget (default 10)
///     dd:      use the difference-based rule instead of the multiplicative one
///
/// Returns:
///     (weights, [(rmse, mae), ...]) with one error row per completed iteration
#[pyfunction]
#[pyo3(signature = (columns, targets, n_iter=10, dd=false))]
pub fn rim(
    columns: Vec<(String, Vec<ConditionId>)>,
    targets: Vec<(String, Vec<f64>)>,
    n_iter: u32,
    dd: bool,
) -> PyResult<(Vec<f64>, Vec<(f64, f64)>)> {
    let (mut panel, table) = build_tables(&columns, &targets).map_err(to_py_err)?;
    let rule = if dd {
        UpdateRuleKind::Difference
    } else {
        UpdateRuleKind::Multiplicative
    };
    let outcome = RimWeighting::with_rule(n_iter, rule)
        .fit(&mut panel, &table)
        .map_err(to_py_err)?;
    let errors = outcome
        .trace
        .records()
        .iter()
        .map(|r| (r.rmse, r.mae))
        .collect();
    Ok((panel.weights().to_vec(), errors))
}

/// Error between weighted cell totals and targets.
///
/// Args:
///     columns: list of (factor name, condition per respondent)
///     weights: one weight per respondent
///     targets: list of (factor name, share per condition)
///     kind:    "mae", "mse" or "rmse"
///
/// Raises:
///     ValueError: for an unknown `kind` or inconsistent tables
#[pyfunction]
pub fn calculate_error(
    columns: Vec<(String, Vec<ConditionId>)>,
    weights: Vec<f64>,
    targets: Vec<(String, Vec<f64>)>,
    kind: &str,
) -> PyResult<f64> {
    let kind: ErrorKind = kind.parse().map_err(to_py_err)?;
    let (mut panel, table) = build_tables(&columns, &targets).map_err(to_py_err)?;
    panel.set_weights(weights).map_err(to_py_err)?;
    error(&panel, &table, kind).map_err(to_py_err)
}

/// RIM weighting — raking survey panels to population targets.
#[pymodule]
pub fn rim_weighting(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(rim, m)?)?;
    m.add_function(wrap_pyfunction!(calculate_error, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
