//! Tukey HSD pairwise comparisons following a one-way ANOVA.
//!
//! Unequal group sizes use the Tukey-Kramer standard error. All pairs of one feature share the
//! family-wise error control of the studentized range distribution.

use serde::Serialize;

use crate::error::TestFailure;
use crate::testing::distributions::{studentized_range_cdf, studentized_range_quantile};
use crate::testing::inference::parametric::AnovaFit;

/// One pairwise comparison, `mean(second) - mean(first)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TukeyComparison {
    /// Group position of the subtracted group.
    pub first: usize,
    /// Group position of the leading group.
    pub second: usize,
    pub difference: f64,
    pub std_err: f64,
    /// Studentized range statistic `|difference| / std_err`.
    pub q_statistic: f64,
    pub lower: f64,
    pub upper: f64,
    pub adjusted_p_value: f64,
}

/// All `k(k-1)/2` comparisons `(i, j)` with `i < j`, in layout order.
///
/// Reuses the within-group mean square and residual degrees of freedom of `fit`. Fewer than two
/// residual degrees of freedom leave the studentized range undefined and fail the feature.
pub fn tukey_hsd(
    fit: &AnovaFit,
    confidence_level: f64,
) -> Result<Vec<TukeyComparison>, TestFailure> {
    let k = fit.n_groups();
    let df = fit.df_within;
    if df < 2.0 {
        return Err(TestFailure::insufficient(format!(
            "Tukey HSD needs at least 2 residual degrees of freedom, got {df}"
        )));
    }

    let critical = studentized_range_quantile(confidence_level, k as f64, df);
    if !critical.is_finite() {
        return Err(TestFailure::undefined(format!(
            "studentized range quantile for k = {k}, df = {df} is {critical}"
        )));
    }

    let mut comparisons = Vec::with_capacity(k * (k - 1) / 2);
    for i in 0..k {
        for j in (i + 1)..k {
            let (a, b) = (&fit.summaries[i], &fit.summaries[j]);
            let difference = b.mean - a.mean;
            let std_err = (fit.ms_within / 2.0 * (1.0 / a.n as f64 + 1.0 / b.n as f64)).sqrt();
            let q_statistic = difference.abs() / std_err;

            let cdf = studentized_range_cdf(q_statistic, k as f64, df);
            if !cdf.is_finite() {
                return Err(TestFailure::undefined(format!(
                    "studentized range probability is {cdf}"
                )));
            }

            comparisons.push(TukeyComparison {
                first: i,
                second: j,
                difference,
                std_err,
                q_statistic,
                lower: difference - critical * std_err,
                upper: difference + critical * std_err,
                adjusted_p_value: (1.0 - cdf).clamp(0.0, 1.0),
            });
        }
    }

    Ok(comparisons)
}
