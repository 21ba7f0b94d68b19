//! Effect sizes and the two-criterion decision rule.
//!
//! Effects are differences of group means on a log2 scale, so a value of 1.0 is a two-fold
//! change. The omnibus effect is the spread of the group means, a contrast effect is the
//! contrast applied to the means.

use serde::Serialize;

use crate::data::ResolvedContrast;
use crate::error::ConfigError;

/// Spread of the group means, `max - min`. Zero for a single group.
pub fn group_range(means: &[f64]) -> f64 {
    let (min, max) = means
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &m| {
            (lo.min(m), hi.max(m))
        });
    if means.is_empty() { 0.0 } else { max - min }
}

/// Signed contrast effect, `sum(c_g * mean_g)`.
///
/// For a pairwise contrast `A-B` this is the log2 fold change `mean(A) - mean(B)`.
pub fn contrast_effect(means: &[f64], contrast: &ResolvedContrast) -> f64 {
    contrast.estimate(means)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionLabel {
    Differential,
    NotDifferential,
}

impl DecisionLabel {
    pub fn is_differential(&self) -> bool {
        matches!(self, DecisionLabel::Differential)
    }
}

/// Adjusted p-value and absolute effect thresholds, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecisionRule {
    pub p_threshold: f64,
    pub fold_change_threshold: f64,
}

impl Default for DecisionRule {
    fn default() -> Self {
        DecisionRule {
            p_threshold: 0.05,
            fold_change_threshold: 0.5,
        }
    }
}

impl DecisionRule {
    pub fn new(p_threshold: f64, fold_change_threshold: f64) -> Result<Self, ConfigError> {
        if !(p_threshold > 0.0 && p_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold {
                reason: format!("p-value threshold must lie in (0, 1], got {p_threshold}"),
            });
        }
        if !(fold_change_threshold >= 0.0 && fold_change_threshold.is_finite()) {
            return Err(ConfigError::InvalidThreshold {
                reason: format!(
                    "fold change threshold must be finite and non-negative, got {fold_change_threshold}"
                ),
            });
        }
        Ok(DecisionRule {
            p_threshold,
            fold_change_threshold,
        })
    }

    /// Differential iff `adjusted_p <= p_threshold` and `|effect| >= fold_change_threshold`.
    pub fn classify(&self, adjusted_p: f64, effect: f64) -> DecisionLabel {
        if adjusted_p <= self.p_threshold && effect.abs() >= self.fold_change_threshold {
            DecisionLabel::Differential
        } else {
            DecisionLabel::NotDifferential
        }
    }

    pub fn is_significant(&self, adjusted_p: f64) -> bool {
        adjusted_p <= self.p_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Contrast;
    use crate::data::{GroupAssignment, IntensityMatrix};
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    #[test]
    fn test_group_range() {
        assert_abs_diff_eq!(group_range(&[0.0, 0.0, 0.0, 5.0]), 5.0);
        assert_abs_diff_eq!(group_range(&[-1.5, 2.0, 0.25]), 3.5);
        assert_eq!(group_range(&[3.0]), 0.0);
        assert_eq!(group_range(&[]), 0.0);
    }

    #[test]
    fn test_contrast_effect_is_signed() {
        let samples: Vec<String> = (0..4).map(|i| format!("s{i}")).collect();
        let matrix =
            IntensityMatrix::new(Array2::zeros((1, 4)), vec!["p".to_string()], samples.clone())
                .unwrap();
        let layout = GroupAssignment::from_ranges(&samples, &[(0..2, "a"), (2..4, "b")])
            .unwrap()
            .resolve(&matrix)
            .unwrap();
        let means = [2.0, 8.0];

        let ab = Contrast::pairwise("a", "b").resolve(&layout).unwrap();
        let ba = Contrast::pairwise("b", "a").resolve(&layout).unwrap();
        assert_abs_diff_eq!(contrast_effect(&means, &ab), -6.0);
        assert_abs_diff_eq!(contrast_effect(&means, &ba), 6.0);
    }

    #[test]
    fn test_decision_boundaries_are_inclusive() {
        let rule = DecisionRule::default();

        assert_eq!(rule.classify(0.05, 0.5), DecisionLabel::Differential);
        assert_eq!(rule.classify(0.05, -0.5), DecisionLabel::Differential);
        assert_eq!(rule.classify(0.0501, 0.5), DecisionLabel::NotDifferential);
        assert_eq!(rule.classify(0.05, 0.4999), DecisionLabel::NotDifferential);
        assert_eq!(rule.classify(0.001, 5.0), DecisionLabel::Differential);
        assert_eq!(rule.classify(0.001, 0.0), DecisionLabel::NotDifferential);
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(DecisionRule::new(0.0, 0.5).is_err());
        assert!(DecisionRule::new(1.5, 0.5).is_err());
        assert!(DecisionRule::new(f64::NAN, 0.5).is_err());
        assert!(DecisionRule::new(0.05, -1.0).is_err());
        assert!(DecisionRule::new(0.05, f64::INFINITY).is_err());

        let rule = DecisionRule::new(0.1, 1.0).unwrap();
        assert_eq!(rule.classify(0.1, 1.0), DecisionLabel::Differential);
    }
}
