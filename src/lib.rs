//! # diffex
//!
//! A Rust library for flagging differentially expressed features (e.g. proteins) in a
//! features x samples intensity table measured across a small, fixed set of groups.
//!
//! Three interchangeable statistical pipelines share one correction and decision core:
//!
//! - **Omnibus**: one-way ANOVA across all groups, with Tukey HSD pairwise resolution of every
//!   differential feature
//! - **Moderated t-test**: group-means linear model with empirical Bayes variance shrinkage,
//!   for arbitrary zero-sum contrasts
//! - **Two-sample t-tests**: Student's or Welch's test per pairwise contrast
//!
//! P-values are corrected per contrast with Benjamini-Hochberg (failed features are excluded
//! from the number of tests), and a feature is called differential when its adjusted p-value
//! and absolute log2 fold change both pass their inclusive thresholds.
//!
//! ## Quick Start
//!
//! ```
//! use diffex::data::{Contrast, GroupAssignment, IntensityMatrix, Normalization};
//! use diffex::engine::{AnalysisConfig, DifferentialExpression};
//! use diffex::testing::{TTestType, TestMethod};
//!
//! let samples: Vec<String> = (1..=6).map(|i| format!("s{i}")).collect();
//! let matrix = IntensityMatrix::from_rows(
//!     vec![vec![1.0, 2.0, 3.0, 7.0, 8.0, 9.0]],
//!     vec!["P1".to_string()],
//!     samples.clone(),
//! )?;
//! let groups = GroupAssignment::from_ranges(&samples, &[(0..3, "control"), (3..6, "adult")])?;
//! let config = AnalysisConfig::default().with_normalization(Normalization::identity());
//!
//! let engine = DifferentialExpression::new(&matrix, &groups, config)?;
//! let report = engine.contrast(
//!     &Contrast::pairwise("adult", "control"),
//!     TestMethod::TTest(TTestType::Student),
//! )?;
//! assert!(report.table.records[0].is_differential());
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Module Organization
//!
//! - **[`data`]**: Intensity matrix, group assignment, contrasts and normalization
//! - **[`testing`]**: Statistical tests, multiple testing correction and the decision rule
//! - **[`engine`]**: The pipelines and their reports
//! - **[`io`]**: Delimited-text input and TSV output
//! - **[`cli`]**: Command-line argument definitions for the `diffex` binary

pub mod cli;
pub mod data;
pub mod engine;
pub mod error;
pub mod io;
pub mod testing;
