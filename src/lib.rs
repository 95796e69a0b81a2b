//! # rim-weighting
//!
//! RIM weighting (random iterative method, also known as raking) for survey
//! panels.
//!
//! ---
//!
//! ## What it does
//!
//! A survey sample rarely mirrors the population it was drawn from: too many
//! women, too few young respondents. RIM weighting corrects this without
//! discarding anybody. Every respondent carries a weight, and the weights are
//! adjusted until the weighted totals of every demographic factor match known
//! population targets.
//!
//! The adjustment works one factor at a time. Fixing gender disturbs the age
//! totals a little, fixing age disturbs gender a little less, and the loop
//! keeps alternating until the remaining error is negligible or the iteration
//! budget runs out.
//!
//! ---
//!
//! ## The pipeline
//!
//! ```text
//! raw columns → Panel ─┐
//!                      ├─→ RimWeighting::fit ─→ weighted Panel + ErrorTrace
//! shares → TargetTable ┘         │
//!                           UpdateRule (multiplicative | dd)
//!                           CellTotals  (mae | mse | rmse)
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`target`] | [`TargetTable`], [`Category`] | Population shares and absolute target counts per (factor, condition) |
//! | [`panel`] | [`Panel`], [`FactorColumn`] | Respondents' condition codes and the mutable weight column |
//! | [`rule`] | [`UpdateRule`], [`Multiplicative`], [`Difference`] | One correction step toward one factor's targets |
//! | [`metric`] | [`ErrorKind`], [`CellTotals`] | Scalar distance between weighted cell totals and targets |
//! | [`fit`] | [`RimWeighting`], [`RimConfig`], [`ErrorTrace`] | Convergence loop over all factors |
//! | [`report`] | [`report::FitReport`] | Serialisable snapshot of a finished fit (requires `serde` feature) |
//!
//! ## Example
//!
//! ```rust
//! use rim_weighting::{Panel, RimWeighting, TargetTable};
//!
//! let gender = [1, 1, 1, 0, 0, 1, 1, 0, 1, 1];
//! let age_group = [0, 1, 2, 1, 1, 1, 0, 2, 1, 1];
//!
//! let mut panel = Panel::builder()
//!     .factor("Gender", &gender).unwrap()
//!     .factor("Age_group", &age_group).unwrap()
//!     .build().unwrap();
//!
//! let targets = TargetTable::builder(panel.len())
//!     .factor("Gender", &[0.5, 0.5]).unwrap()
//!     .factor("Age_group", &[0.2, 0.6, 0.2]).unwrap()
//!     .build();
//!
//! let outcome = RimWeighting::default().fit(&mut panel, &targets).unwrap();
//! assert!(outcome.trace.len() <= 10);
//! ```
//!
//! ## `no_std`
//!
//! This crate is `#![no_std]` (with `alloc`) by default. Enable `std` to let
//! `thiserror` and `tracing` use the standard library, `serde` for
//! serialisation of tables, configuration and [`report::FitReport`], and
//! `python-ffi` for the PyO3 bindings.

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

pub mod error;
pub mod target;
pub mod panel;
pub mod metric;
pub mod rule;
pub mod fit;
#[cfg(feature = "serde")]
pub mod report;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use error::{RimError, RimResult};
pub use fit::{rim, ErrorRecord, ErrorTrace, FitOutcome, FitStatus, RimConfig, RimWeighting};
pub use metric::{error, CellTotals, ErrorKind};
pub use panel::{FactorColumn, Panel};
pub use rule::{Difference, Multiplicative, UpdateRule, UpdateRuleKind};
pub use target::{Category, ConditionId, TargetTable};
