use ndarray::ArrayView1;
use num_traits::Float;

use crate::data::GroupLayout;

/// Sample size, mean and sum of squared deviations of one group of values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupSummary {
    pub n: usize,
    pub mean: f64,
    pub sum_squares: f64,
}

impl GroupSummary {
    /// Two-pass summary; the deviations are taken from the computed mean.
    pub fn from_slice<T>(values: &[T]) -> Self
    where
        T: Float,
    {
        let n = values.len();
        if n == 0 {
            return GroupSummary {
                n,
                mean: f64::NAN,
                sum_squares: f64::NAN,
            };
        }

        let as_f64 = |v: &T| v.to_f64().unwrap_or(f64::NAN);
        let mean = values.iter().map(as_f64).sum::<f64>() / n as f64;
        let sum_squares = values
            .iter()
            .map(|v| {
                let d = as_f64(v) - mean;
                d * d
            })
            .sum::<f64>();

        GroupSummary {
            n,
            mean,
            sum_squares,
        }
    }

    /// Unbiased sample variance, `NaN` below two observations.
    pub fn variance(&self) -> f64 {
        if self.n < 2 {
            f64::NAN
        } else {
            self.sum_squares / (self.n - 1) as f64
        }
    }
}

/// Values of one feature split by group, in layout order.
pub fn split_by_group(row: ArrayView1<'_, f64>, layout: &GroupLayout) -> Vec<Vec<f64>> {
    (0..layout.n_groups())
        .map(|g| layout.indices(g).iter().map(|&col| row[col]).collect())
        .collect()
}

/// Per-group means of one feature, in layout order.
pub fn group_means(row: ArrayView1<'_, f64>, layout: &GroupLayout) -> Vec<f64> {
    split_by_group(row, layout)
        .iter()
        .map(|values| GroupSummary::from_slice(values).mean)
        .collect()
}

/// Whether `variance` is indistinguishable from zero at the magnitude of the data.
///
/// `magnitude` is the squared scale of the values (e.g. the largest squared group mean).
/// Constant values deviate from their computed mean by a few ulps, so their variance is of
/// order `EPSILON^2 * magnitude`; anything clearly above that is real spread.
pub fn is_degenerate_variance(variance: f64, magnitude: f64) -> bool {
    const ROUNDING: f64 = 16.0 * f64::EPSILON;
    !(variance > ROUNDING * ROUNDING * magnitude)
}

pub fn largest_squared_mean(summaries: &[GroupSummary]) -> f64 {
    summaries
        .iter()
        .map(|s| s.mean * s.mean)
        .fold(0.0, f64::max)
}
