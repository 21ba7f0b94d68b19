//! The differential expression engine.
//!
//! A run is a pure map over features (fit and test each one, in parallel), a correction barrier
//! over the complete result set, then the decision rule. The omnibus pipeline additionally
//! resolves its differential features into Tukey pairwise comparisons.

mod config;
mod report;

pub use config::AnalysisConfig;
pub use report::{
    ContrastReport, FeatureRecord, FeatureStatus, OmnibusReport, PairComparison, Pipeline,
    PostHocFailure, PostHocResult, ResultTable,
};

use anyhow::Result;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::data::{Contrast, FoldChangeBasis, GroupAssignment, GroupLayout, IntensityMatrix};
use crate::error::{ConfigError, TestFailure};
use crate::testing::correction::benjamini_hochberg_partial;
use crate::testing::effect::{DecisionRule, contrast_effect, group_range};
use crate::testing::inference::posthoc::{TukeyComparison, tukey_hsd};
use crate::testing::inference::{FeatureTest, ModeratedContrast, OneWayAnova, TwoSampleT};
use crate::testing::utils::{group_means, split_by_group};
use crate::testing::{TestMethod, TestResult};

/// Failed features named individually in the warning before it is summarized.
const LOGGED_FAILURES: usize = 5;

/// Prepared input of one analysis: normalized values, the group layout and the thresholds.
///
/// Construction resolves groups and normalizes once; every pipeline run afterwards is
/// independent and leaves the engine untouched.
pub struct DifferentialExpression {
    layout: GroupLayout,
    normalized: IntensityMatrix,
    fold_change: IntensityMatrix,
    config: AnalysisConfig,
    rule: DecisionRule,
}

impl DifferentialExpression {
    pub fn new(
        matrix: &IntensityMatrix,
        assignment: &GroupAssignment,
        config: AnalysisConfig,
    ) -> Result<Self> {
        config.validate()?;
        let rule = config.decision_rule()?;
        let layout = assignment.resolve(matrix)?;
        let (log_stage, normalized) = config.normalization.apply(matrix)?;
        let fold_change = match config.fold_change_basis {
            FoldChangeBasis::Log2 => log_stage,
            FoldChangeBasis::Normalized => normalized.clone(),
        };

        info!(
            "Prepared {} features x {} samples in {} groups ({})",
            matrix.n_features(),
            matrix.n_samples(),
            layout.n_groups(),
            layout.labels().join(", ")
        );

        Ok(DifferentialExpression {
            layout,
            normalized,
            fold_change,
            config,
            rule,
        })
    }

    pub fn layout(&self) -> &GroupLayout {
        &self.layout
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn feature_ids(&self) -> &[String] {
        self.normalized.feature_ids()
    }

    /// The matrix the tests run on.
    pub fn normalized(&self) -> &IntensityMatrix {
        &self.normalized
    }

    /// One-way ANOVA over all groups, then Tukey HSD for each differential feature.
    pub fn omnibus(&self) -> Result<OmnibusReport> {
        info!(
            "Running one-way ANOVA on {} features",
            self.normalized.n_features()
        );

        let mut strategy = OneWayAnova;
        let outcomes = self.run_features(&mut strategy);
        let (fits, results): (Vec<_>, Vec<_>) = outcomes
            .into_iter()
            .map(|outcome| match outcome {
                Ok((fit, result)) => (Some(fit), Ok(result)),
                Err(failure) => (None, Err(failure)),
            })
            .unzip();

        let table = self.build_table(Pipeline::Omnibus, strategy.method(), results, group_range)?;

        let confidence_level = self.config.confidence_level;
        let post_hoc_outcomes: Vec<(usize, Result<Vec<TukeyComparison>, TestFailure>)> = table
            .records
            .iter()
            .zip(&fits)
            .enumerate()
            .filter(|(_, (record, _))| record.is_differential())
            .filter_map(|(i, (_, fit))| fit.as_ref().map(|fit| (i, fit)))
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(i, fit)| (i, tukey_hsd(fit, confidence_level)))
            .collect();

        let mut post_hoc = Vec::new();
        let mut post_hoc_failures = Vec::new();
        for (i, outcome) in post_hoc_outcomes {
            let feature_id = table.records[i].feature_id.clone();
            match outcome {
                Ok(comparisons) => post_hoc.push(PostHocResult {
                    feature_id,
                    comparisons: comparisons
                        .into_iter()
                        .map(|c| self.label_comparison(c))
                        .collect(),
                }),
                Err(failure) => {
                    warn!("Post-hoc test failed for {}: {}", feature_id, failure);
                    post_hoc_failures.push(PostHocFailure {
                        feature_id,
                        failure,
                    });
                }
            }
        }

        info!(
            "Tukey HSD resolved {} differential features ({} failed)",
            post_hoc.len(),
            post_hoc_failures.len()
        );

        Ok(OmnibusReport {
            table,
            confidence_level,
            post_hoc,
            post_hoc_failures,
        })
    }

    /// Test one contrast with a t-test or the moderated t-test.
    ///
    /// t-tests need a pairwise contrast; the omnibus ANOVA cannot evaluate contrasts at all.
    pub fn contrast(&self, contrast: &Contrast, method: TestMethod) -> Result<ContrastReport> {
        let resolved = contrast.resolve(&self.layout)?;
        let pipeline = Pipeline::Contrast(contrast.name().to_string());
        let effect = |means: &[f64]| contrast_effect(means, &resolved);

        info!("Testing contrast {} with {}", contrast, method);

        let (table, prior) = match method {
            TestMethod::OneWayAnova => {
                return Err(ConfigError::UnsupportedMethod {
                    method: method.to_string(),
                    contrast: contrast.name().to_string(),
                }
                .into());
            }
            TestMethod::TTest(test_type) => {
                let (up, down) = resolved.pair().ok_or_else(|| ConfigError::NotPairwise {
                    contrast: contrast.name().to_string(),
                    method: method.to_string(),
                })?;
                let mut strategy = TwoSampleT {
                    up,
                    down,
                    test_type,
                };
                let results = self.test_features(&mut strategy);
                (self.build_table(pipeline, method, results, effect)?, None)
            }
            TestMethod::ModeratedT => {
                let mut strategy = ModeratedContrast::new(resolved.weights().to_vec());
                let results = self.test_features(&mut strategy);
                let prior = strategy.empirical_bayes().map(|eb| eb.prior);
                if let Some(prior) = &prior {
                    debug!(
                        "Variance prior for {}: d0 = {:.4}, s0^2 = {:.6}",
                        contrast, prior.df, prior.variance
                    );
                }
                (self.build_table(pipeline, method, results, effect)?, prior)
            }
        };

        Ok(ContrastReport {
            contrast: contrast.name().to_string(),
            table,
            prior,
        })
    }

    /// Each contrast is tested and corrected on its own; one failing contrast does not affect
    /// the others.
    pub fn contrasts(
        &self,
        contrasts: &[Contrast],
        method: TestMethod,
    ) -> Vec<Result<ContrastReport>> {
        contrasts
            .iter()
            .map(|contrast| self.contrast(contrast, method))
            .collect()
    }

    /// Fit every feature, let the strategy pool across the fits, then test every fit.
    fn run_features<S: FeatureTest>(
        &self,
        strategy: &mut S,
    ) -> Vec<Result<(S::Fit, TestResult), TestFailure>> {
        let n_features = self.normalized.n_features();

        let fits: Vec<Result<S::Fit, TestFailure>> = {
            let strategy: &S = strategy;
            (0..n_features)
                .into_par_iter()
                .map(|i| {
                    let groups = split_by_group(self.normalized.row(i), &self.layout);
                    let views: Vec<&[f64]> = groups.iter().map(Vec::as_slice).collect();
                    strategy.fit(&views)
                })
                .collect()
        };

        let successful: Vec<&S::Fit> = fits.iter().filter_map(|fit| fit.as_ref().ok()).collect();
        strategy.prepare(&successful);

        let strategy: &S = strategy;
        fits.into_par_iter()
            .map(|fit| -> Result<(S::Fit, TestResult), TestFailure> {
                let fit = fit?;
                let result = strategy.test(&fit)?;
                Ok((fit, result))
            })
            .collect()
    }

    fn test_features<S: FeatureTest>(
        &self,
        strategy: &mut S,
    ) -> Vec<Result<TestResult, TestFailure>> {
        self.run_features(strategy)
            .into_iter()
            .map(|outcome| outcome.map(|(_, result)| result))
            .collect()
    }

    /// Correction barrier and decision rule over one complete result set.
    fn build_table<F>(
        &self,
        pipeline: Pipeline,
        method: TestMethod,
        results: Vec<Result<TestResult, TestFailure>>,
        effect: F,
    ) -> Result<ResultTable>
    where
        F: Fn(&[f64]) -> f64 + Sync,
    {
        let raw: Vec<Option<f64>> = results
            .iter()
            .map(|r| r.as_ref().ok().map(|r| r.p_value))
            .collect();
        let adjusted = benjamini_hochberg_partial(&raw)?;

        let means: Vec<Vec<f64>> = (0..self.fold_change.n_features())
            .into_par_iter()
            .map(|i| group_means(self.fold_change.row(i), &self.layout))
            .collect();

        let records: Vec<FeatureRecord> = results
            .into_iter()
            .zip(adjusted)
            .zip(means)
            .zip(self.fold_change.feature_ids())
            .map(|(((result, adjusted), group_means), feature_id)| {
                let effect = effect(&group_means);
                let status = match (result, adjusted) {
                    (Ok(result), Some(adjusted_p_value)) => FeatureStatus::Tested {
                        decision: self.rule.classify(adjusted_p_value, effect),
                        result,
                        adjusted_p_value,
                    },
                    (Ok(_), None) => FeatureStatus::Failed(TestFailure::undefined(
                        "no adjusted p-value",
                    )),
                    (Err(failure), _) => FeatureStatus::Failed(failure),
                };
                FeatureRecord {
                    feature_id: feature_id.clone(),
                    group_means,
                    effect,
                    status,
                }
            })
            .collect();

        let table = ResultTable {
            pipeline,
            method,
            fold_change_basis: self.config.fold_change_basis,
            group_labels: self.layout.labels().to_vec(),
            records,
        };
        log_summary(&table);
        Ok(table)
    }

    fn label_comparison(&self, comparison: TukeyComparison) -> PairComparison {
        PairComparison {
            first: self.layout.label(comparison.first).to_string(),
            second: self.layout.label(comparison.second).to_string(),
            difference: comparison.difference,
            lower: comparison.lower,
            upper: comparison.upper,
            adjusted_p_value: comparison.adjusted_p_value,
            significant: self.rule.is_significant(comparison.adjusted_p_value),
        }
    }
}

fn log_summary(table: &ResultTable) {
    let n_failed = table.n_failed();
    info!(
        "{} ({}): {} tested, {} failed, {} differential",
        table.pipeline.name(),
        table.method,
        table.n_tested(),
        n_failed,
        table.n_differential()
    );

    if n_failed > 0 {
        let named: Vec<String> = table
            .failed()
            .take(LOGGED_FAILURES)
            .map(|r| r.feature_id.clone())
            .collect();
        warn!(
            "{} features could not be tested in {} (e.g. {})",
            n_failed,
            table.pipeline.name(),
            named.join(", ")
        );
        for record in table.failed() {
            if let Some(failure) = record.failure() {
                debug!("{}: {}", record.feature_id, failure);
            }
        }
    }
}
