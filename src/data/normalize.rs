//! Intensity normalization applied before testing.
//!
//! Raw intensities are log2-transformed (optionally shifted by a pseudo-count) and may then be
//! centered or standardized per sample column. Which of these stages the fold changes are read
//! from is controlled separately by [`FoldChangeBasis`].

use anyhow::{Result, bail};
use ndarray::{Array2, Axis};
use serde::Serialize;

use crate::data::IntensityMatrix;

/// Per-sample scaling applied after the log transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    #[default]
    None,
    /// Subtract the column mean.
    Center,
    /// Subtract the column mean and divide by the column standard deviation.
    Standardize,
}

/// Which matrix fold changes are computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldChangeBasis {
    /// Log2 values before per-sample scaling.
    #[default]
    Log2,
    /// The fully normalized values the tests run on.
    Normalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Normalization {
    pub log2: bool,
    pub pseudo_count: f64,
    pub scaling: Scaling,
}

impl Default for Normalization {
    fn default() -> Self {
        Normalization {
            log2: true,
            pseudo_count: 0.0,
            scaling: Scaling::None,
        }
    }
}

impl Normalization {
    /// Values are used exactly as given, for input that is already on a log scale.
    pub fn identity() -> Self {
        Normalization {
            log2: false,
            pseudo_count: 0.0,
            scaling: Scaling::None,
        }
    }

    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn with_pseudo_count(mut self, pseudo_count: f64) -> Self {
        self.pseudo_count = pseudo_count;
        self
    }

    /// Apply the transform and return `(log_stage, normalized)`.
    ///
    /// `log_stage` is the matrix after the log transform only; `normalized` additionally has the
    /// per-sample scaling applied.
    pub fn apply(&self, matrix: &IntensityMatrix) -> Result<(IntensityMatrix, IntensityMatrix)> {
        let log_stage = if self.log2 {
            matrix.with_values(self.log_transform(matrix)?)?
        } else {
            matrix.clone()
        };

        let normalized = match self.scaling {
            Scaling::None => log_stage.clone(),
            Scaling::Center | Scaling::Standardize => {
                log_stage.with_values(self.scale_columns(&log_stage)?)?
            }
        };

        Ok((log_stage, normalized))
    }

    fn log_transform(&self, matrix: &IntensityMatrix) -> Result<Array2<f64>> {
        let mut values = matrix.values().to_owned();
        for ((row, col), value) in values.indexed_iter_mut() {
            let shifted = *value + self.pseudo_count;
            if shifted <= 0.0 {
                bail!(
                    "Cannot log2-transform intensity {} (pseudo-count {}) for feature '{}' in sample '{}'",
                    value,
                    self.pseudo_count,
                    matrix.feature_ids()[row],
                    matrix.sample_ids()[col]
                );
            }
            *value = shifted.log2();
        }
        Ok(values)
    }

    fn scale_columns(&self, matrix: &IntensityMatrix) -> Result<Array2<f64>> {
        let mut values = matrix.values().to_owned();
        let n = values.nrows() as f64;
        if self.scaling == Scaling::Standardize && n < 2.0 {
            bail!("Standardization needs at least 2 features per sample");
        }

        for (col, mut column) in values.axis_iter_mut(Axis(1)).enumerate() {
            let mean = column.sum() / n;
            column.mapv_inplace(|v| v - mean);

            if self.scaling == Scaling::Standardize {
                let sd = (column.iter().map(|v| v * v).sum::<f64>() / (n - 1.0)).sqrt();
                if !(sd > 0.0) {
                    bail!(
                        "Sample '{}' has zero variance and cannot be standardized",
                        matrix.sample_ids()[col]
                    );
                }
                column.mapv_inplace(|v| v / sd);
            }
        }
        Ok(values)
    }
}
