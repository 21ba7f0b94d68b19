use serde::Serialize;

use crate::data::FoldChangeBasis;
use crate::error::TestFailure;
use crate::testing::effect::DecisionLabel;
use crate::testing::inference::moderated::VariancePrior;
use crate::testing::{TestMethod, TestResult};

/// Which pipeline produced a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    Omnibus,
    Contrast(String),
}

impl Pipeline {
    pub fn name(&self) -> &str {
        match self {
            Pipeline::Omnibus => "omnibus",
            Pipeline::Contrast(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureStatus {
    Tested {
        result: TestResult,
        adjusted_p_value: f64,
        decision: DecisionLabel,
    },
    Failed(TestFailure),
}

/// Outcome for one feature within one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub feature_id: String,
    /// Group means on the fold change basis, in layout order.
    pub group_means: Vec<f64>,
    /// Omnibus range or signed contrast effect, log2 units.
    pub effect: f64,
    pub status: FeatureStatus,
}

impl FeatureRecord {
    pub fn is_differential(&self) -> bool {
        matches!(
            self.status,
            FeatureStatus::Tested {
                decision: DecisionLabel::Differential,
                ..
            }
        )
    }

    pub fn result(&self) -> Option<&TestResult> {
        match &self.status {
            FeatureStatus::Tested { result, .. } => Some(result),
            FeatureStatus::Failed(_) => None,
        }
    }

    pub fn p_value(&self) -> Option<f64> {
        self.result().map(|r| r.p_value)
    }

    pub fn adjusted_p_value(&self) -> Option<f64> {
        match &self.status {
            FeatureStatus::Tested {
                adjusted_p_value, ..
            } => Some(*adjusted_p_value),
            FeatureStatus::Failed(_) => None,
        }
    }

    pub fn decision(&self) -> Option<DecisionLabel> {
        match &self.status {
            FeatureStatus::Tested { decision, .. } => Some(*decision),
            FeatureStatus::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&TestFailure> {
        match &self.status {
            FeatureStatus::Failed(failure) => Some(failure),
            FeatureStatus::Tested { .. } => None,
        }
    }
}

/// Per-feature records of one pipeline run, in matrix row order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub pipeline: Pipeline,
    pub method: TestMethod,
    pub fold_change_basis: FoldChangeBasis,
    pub group_labels: Vec<String>,
    pub records: Vec<FeatureRecord>,
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, feature_id: &str) -> Option<&FeatureRecord> {
        self.records.iter().find(|r| r.feature_id == feature_id)
    }

    pub fn n_tested(&self) -> usize {
        self.records.iter().filter(|r| r.failure().is_none()).count()
    }

    pub fn n_failed(&self) -> usize {
        self.records.len() - self.n_tested()
    }

    pub fn n_differential(&self) -> usize {
        self.records.iter().filter(|r| r.is_differential()).count()
    }

    pub fn differential(&self) -> impl Iterator<Item = &FeatureRecord> {
        self.records.iter().filter(|r| r.is_differential())
    }

    pub fn failed(&self) -> impl Iterator<Item = &FeatureRecord> {
        self.records.iter().filter(|r| r.failure().is_some())
    }
}

/// One Tukey comparison labelled with group names, `mean(second) - mean(first)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairComparison {
    pub first: String,
    pub second: String,
    pub difference: f64,
    pub lower: f64,
    pub upper: f64,
    pub adjusted_p_value: f64,
    pub significant: bool,
}

impl PairComparison {
    /// `second-first`, matching the orientation of `difference`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.second, self.first)
    }

    pub fn involves(&self, group: &str) -> bool {
        self.first == group || self.second == group
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostHocResult {
    pub feature_id: String,
    pub comparisons: Vec<PairComparison>,
}

impl PostHocResult {
    pub fn significant(&self) -> impl Iterator<Item = &PairComparison> {
        self.comparisons.iter().filter(|c| c.significant)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostHocFailure {
    pub feature_id: String,
    pub failure: TestFailure,
}

/// ANOVA table plus Tukey resolution of its differential features.
#[derive(Debug, Clone, PartialEq)]
pub struct OmnibusReport {
    pub table: ResultTable,
    pub confidence_level: f64,
    pub post_hoc: Vec<PostHocResult>,
    pub post_hoc_failures: Vec<PostHocFailure>,
}

impl OmnibusReport {
    pub fn post_hoc_for(&self, feature_id: &str) -> Option<&PostHocResult> {
        self.post_hoc.iter().find(|p| p.feature_id == feature_id)
    }
}

/// Results of one contrast.
#[derive(Debug, Clone, PartialEq)]
pub struct ContrastReport {
    pub contrast: String,
    pub table: ResultTable,
    /// Variance prior of a moderated run.
    pub prior: Option<VariancePrior>,
}
