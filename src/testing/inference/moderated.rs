//! Moderated t-tests with an empirical Bayes variance prior.
//!
//! Every feature gets a group-means linear model whose residual variance is shrunk toward a
//! prior shared by all features. The prior degrees of freedom `d0` and prior variance `s0^2` are
//! estimated by matching the first two moments of the log residual variances, which follow a
//! scaled log F distribution when the prior holds.

use num_traits::Float;
use statrs::function::gamma::digamma;

use crate::error::TestFailure;
use crate::testing::TestResult;
use crate::testing::distributions::{trigamma, trigamma_inverse};
use crate::testing::inference::parametric::students_t_p_value;
use crate::testing::utils::{GroupSummary, is_degenerate_variance, largest_squared_mean};

/// Per-feature fit of a group-means model.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModelFit {
    pub summaries: Vec<GroupSummary>,
    /// Residual variance `s^2`.
    pub residual_variance: f64,
    /// Residual degrees of freedom, `N - k`.
    pub df_residual: f64,
}

impl LinearModelFit {
    pub fn means(&self) -> Vec<f64> {
        self.summaries.iter().map(|s| s.mean).collect()
    }

    /// `sum(c_g * mean_g)` and the unscaled standard error `sqrt(sum(c_g^2 / n_g))`.
    fn contrast(&self, weights: &[f64]) -> (f64, f64) {
        let mut estimate = 0.0;
        let mut unscaled = 0.0;
        for (summary, &w) in self.summaries.iter().zip(weights) {
            if w != 0.0 {
                estimate += w * summary.mean;
                unscaled += w * w / summary.n as f64;
            }
        }
        (estimate, unscaled.sqrt())
    }
}

/// Fit group means and the pooled residual variance of one feature.
///
/// Every group needs at least two samples, also those with a zero weight in later contrasts.
pub fn fit_group_means<T>(groups: &[&[T]]) -> Result<LinearModelFit, TestFailure>
where
    T: Float,
{
    let summaries: Vec<GroupSummary> = groups.iter().map(|g| GroupSummary::from_slice(g)).collect();
    if let Some((g, s)) = summaries.iter().enumerate().find(|(_, s)| s.n < 2) {
        return Err(TestFailure::insufficient(format!(
            "group {} has {} sample(s), at least 2 required",
            g + 1,
            s.n
        )));
    }

    let n_total: usize = summaries.iter().map(|s| s.n).sum();
    let df_residual = n_total as f64 - summaries.len() as f64;
    if df_residual < 1.0 {
        return Err(TestFailure::insufficient(format!(
            "no residual degrees of freedom ({} samples in {} groups)",
            n_total,
            summaries.len()
        )));
    }

    let residual_variance = summaries.iter().map(|s| s.sum_squares).sum::<f64>() / df_residual;
    if is_degenerate_variance(residual_variance, largest_squared_mean(&summaries)) {
        return Err(TestFailure::undefined("zero residual variance"));
    }

    Ok(LinearModelFit {
        summaries,
        residual_variance,
        df_residual,
    })
}

/// Scaled inverse chi-square prior on the feature variances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariancePrior {
    /// Prior degrees of freedom `d0`; infinite when the observed variances are no more
    /// dispersed than sampling noise alone explains, zero when there is nothing to pool.
    pub df: f64,
    /// Prior variance `s0^2`.
    pub variance: f64,
}

impl VariancePrior {
    /// Method-of-moments estimate from residual variances and their degrees of freedom.
    ///
    /// With fewer than two fits there is no spread to estimate; the prior then carries no
    /// weight (`d0 = 0`).
    pub fn estimate(variances: &[f64], dfs: &[f64]) -> Self {
        debug_assert_eq!(variances.len(), dfs.len());
        let n = variances.len();
        if n < 2 {
            return VariancePrior {
                df: 0.0,
                variance: variances.first().copied().unwrap_or(f64::NAN),
            };
        }

        let e: Vec<f64> = variances
            .iter()
            .zip(dfs)
            .map(|(&s2, &d)| s2.ln() - digamma(d / 2.0) + (d / 2.0).ln())
            .collect();
        let e_mean = e.iter().sum::<f64>() / n as f64;
        let e_var = e.iter().map(|x| (x - e_mean).powi(2)).sum::<f64>() / (n - 1) as f64
            - dfs.iter().map(|&d| trigamma(d / 2.0)).sum::<f64>() / n as f64;

        if e_var > 0.0 {
            let df = 2.0 * trigamma_inverse(e_var);
            let variance = (e_mean + digamma(df / 2.0) - (df / 2.0).ln()).exp();
            VariancePrior { df, variance }
        } else {
            VariancePrior {
                df: f64::INFINITY,
                variance: e_mean.exp(),
            }
        }
    }

    /// Posterior variance `(d0 s0^2 + d s^2) / (d0 + d)`.
    pub fn posterior_variance(&self, variance: f64, df: f64) -> f64 {
        if self.df.is_infinite() {
            self.variance
        } else if self.df == 0.0 {
            variance
        } else {
            (self.df * self.variance + df * variance) / (self.df + df)
        }
    }
}

/// Variance prior together with the total residual degrees of freedom it was estimated from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmpiricalBayes {
    pub prior: VariancePrior,
    /// Sum of residual degrees of freedom over the fits; caps the moderated df.
    pub df_pooled: f64,
}

impl EmpiricalBayes {
    /// Estimate the prior from all successful fits of one run.
    pub fn from_fits<'a, I>(fits: I) -> Self
    where
        I: IntoIterator<Item = &'a LinearModelFit>,
    {
        let (variances, dfs): (Vec<f64>, Vec<f64>) = fits
            .into_iter()
            .map(|fit| (fit.residual_variance, fit.df_residual))
            .unzip();
        EmpiricalBayes {
            prior: VariancePrior::estimate(&variances, &dfs),
            df_pooled: dfs.iter().sum(),
        }
    }

    pub fn posterior_variance(&self, fit: &LinearModelFit) -> f64 {
        self.prior
            .posterior_variance(fit.residual_variance, fit.df_residual)
    }

    /// `min(d0 + d, df_pooled)`.
    pub fn posterior_df(&self, fit: &LinearModelFit) -> f64 {
        (self.prior.df + fit.df_residual).min(self.df_pooled)
    }

    /// Moderated t statistic of a contrast given as per-group weights.
    pub fn moderated_t(
        &self,
        fit: &LinearModelFit,
        weights: &[f64],
    ) -> Result<TestResult, TestFailure> {
        let (estimate, unscaled) = fit.contrast(weights);
        let std_err = self.posterior_variance(fit).sqrt() * unscaled;
        if !(std_err > 0.0) {
            return Err(TestFailure::undefined(format!(
                "moderated standard error is {std_err}"
            )));
        }

        let df = self.posterior_df(fit);
        let t_stat = estimate / std_err;
        let p_value = students_t_p_value(t_stat, df)?;

        Ok(TestResult::new(t_stat, p_value)
            .with_degrees_of_freedom(df)
            .with_estimate(estimate, std_err))
    }
}
