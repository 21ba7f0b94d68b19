//! Per-feature statistical tests behind one strategy trait.
//!
//! A [`FeatureTest`] fits every feature independently, optionally pools information across the
//! fits, then tests each fit. The engine drives the three phases and owns everything that
//! follows (correction, decisions, post-hoc).

use crate::error::TestFailure;
use crate::testing::{TTestType, TestMethod, TestResult};

pub mod moderated;
pub mod parametric;
pub mod posthoc;

use moderated::{EmpiricalBayes, LinearModelFit, fit_group_means};
use parametric::{AnovaFit, one_way_anova, t_test};

pub trait FeatureTest: Sync {
    /// Whatever the test keeps per feature between fitting and testing.
    type Fit: Send + Sync;

    fn method(&self) -> TestMethod;

    /// Fit one feature. `groups` holds its values split by group, in layout order.
    fn fit(&self, groups: &[&[f64]]) -> Result<Self::Fit, TestFailure>;

    /// Called once with every successful fit before any feature is tested.
    fn prepare(&mut self, _fits: &[&Self::Fit]) {}

    fn test(&self, fit: &Self::Fit) -> Result<TestResult, TestFailure>;
}

/// One-way ANOVA over all groups.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneWayAnova;

impl FeatureTest for OneWayAnova {
    type Fit = AnovaFit;

    fn method(&self) -> TestMethod {
        TestMethod::OneWayAnova
    }

    fn fit(&self, groups: &[&[f64]]) -> Result<AnovaFit, TestFailure> {
        one_way_anova(groups)
    }

    fn test(&self, fit: &AnovaFit) -> Result<TestResult, TestFailure> {
        Ok(fit.result.clone())
    }
}

/// Two-sample t-test between the groups at positions `up` and `down`, estimate
/// `mean(up) - mean(down)`.
#[derive(Debug, Clone, Copy)]
pub struct TwoSampleT {
    pub up: usize,
    pub down: usize,
    pub test_type: TTestType,
}

impl FeatureTest for TwoSampleT {
    type Fit = TestResult;

    fn method(&self) -> TestMethod {
        TestMethod::TTest(self.test_type)
    }

    fn fit(&self, groups: &[&[f64]]) -> Result<TestResult, TestFailure> {
        t_test(groups[self.up], groups[self.down], self.test_type)
    }

    fn test(&self, fit: &TestResult) -> Result<TestResult, TestFailure> {
        Ok(fit.clone())
    }
}

/// Moderated t-test of an arbitrary contrast.
///
/// The variance prior is estimated in [`FeatureTest::prepare`] from the fits of the same run,
/// so testing before preparing is an error.
#[derive(Debug, Clone)]
pub struct ModeratedContrast {
    weights: Vec<f64>,
    bayes: Option<EmpiricalBayes>,
}

impl ModeratedContrast {
    pub fn new(weights: Vec<f64>) -> Self {
        ModeratedContrast {
            weights,
            bayes: None,
        }
    }

    pub fn empirical_bayes(&self) -> Option<&EmpiricalBayes> {
        self.bayes.as_ref()
    }
}

impl FeatureTest for ModeratedContrast {
    type Fit = LinearModelFit;

    fn method(&self) -> TestMethod {
        TestMethod::ModeratedT
    }

    fn fit(&self, groups: &[&[f64]]) -> Result<LinearModelFit, TestFailure> {
        fit_group_means(groups)
    }

    /// No prior is estimated when every fit failed.
    fn prepare(&mut self, fits: &[&LinearModelFit]) {
        self.bayes = (!fits.is_empty()).then(|| EmpiricalBayes::from_fits(fits.iter().copied()));
    }

    fn test(&self, fit: &LinearModelFit) -> Result<TestResult, TestFailure> {
        let bayes = self
            .bayes
            .as_ref()
            .ok_or_else(|| TestFailure::undefined("variance prior has not been estimated"))?;
        bayes.moderated_t(fit, &self.weights)
    }
}
