use serde::Serialize;

use crate::data::{FoldChangeBasis, Normalization};
use crate::error::ConfigError;
use crate::testing::effect::DecisionRule;

/// Thresholds and normalization choices threaded through every stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalysisConfig {
    /// Adjusted p-value threshold, inclusive.
    pub p_threshold: f64,
    /// Absolute log2 fold change threshold, inclusive.
    pub fold_change_threshold: f64,
    /// Confidence level of the post-hoc intervals.
    pub confidence_level: f64,
    pub normalization: Normalization,
    pub fold_change_basis: FoldChangeBasis,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            p_threshold: 0.05,
            fold_change_threshold: 0.5,
            confidence_level: 0.95,
            normalization: Normalization::default(),
            fold_change_basis: FoldChangeBasis::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn with_thresholds(mut self, p_threshold: f64, fold_change_threshold: f64) -> Self {
        self.p_threshold = p_threshold;
        self.fold_change_threshold = fold_change_threshold;
        self
    }

    pub fn with_confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_fold_change_basis(mut self, basis: FoldChangeBasis) -> Self {
        self.fold_change_basis = basis;
        self
    }

    pub fn decision_rule(&self) -> Result<DecisionRule, ConfigError> {
        DecisionRule::new(self.p_threshold, self.fold_change_threshold)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.decision_rule()?;
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ConfigError::InvalidThreshold {
                reason: format!(
                    "confidence level must lie in (0, 1), got {}",
                    self.confidence_level
                ),
            });
        }
        let pseudo_count = self.normalization.pseudo_count;
        if !(pseudo_count >= 0.0 && pseudo_count.is_finite()) {
            return Err(ConfigError::InvalidThreshold {
                reason: format!("pseudo-count must be finite and non-negative, got {pseudo_count}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.p_threshold, 0.05);
        assert_eq!(config.fold_change_threshold, 0.5);
        assert_eq!(config.confidence_level, 0.95);
        assert_eq!(config.fold_change_basis, FoldChangeBasis::Log2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(AnalysisConfig::default().with_thresholds(0.0, 0.5).validate().is_err());
        assert!(AnalysisConfig::default().with_thresholds(0.05, -0.1).validate().is_err());
        assert!(AnalysisConfig::default().with_confidence_level(1.0).validate().is_err());

        let negative_pseudo = AnalysisConfig::default()
            .with_normalization(Normalization::default().with_pseudo_count(-1.0));
        assert!(matches!(
            negative_pseudo.validate(),
            Err(ConfigError::InvalidThreshold { .. })
        ));
    }
}
