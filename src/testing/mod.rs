use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub mod correction;
pub mod distributions;
pub mod effect;
pub mod inference;

pub mod utils;

/// Statistical test used to produce the per-feature p-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMethod {
    /// One-way ANOVA F-test across all groups (omnibus).
    OneWayAnova,
    /// Two-sample t-test between the two groups of a pairwise contrast.
    TTest(TTestType),
    /// Linear model t-test with empirical Bayes moderated variances.
    ModeratedT,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TTestType {
    Student, // Equal variance
    Welch,   // Unequal variance
}

impl TestMethod {
    pub fn name(&self) -> &'static str {
        match self {
            TestMethod::OneWayAnova => "one-way ANOVA",
            TestMethod::TTest(TTestType::Student) => "Student's t-test",
            TestMethod::TTest(TTestType::Welch) => "Welch's t-test",
            TestMethod::ModeratedT => "moderated t-test",
        }
    }

    pub fn is_omnibus(&self) -> bool {
        matches!(self, TestMethod::OneWayAnova)
    }
}

impl fmt::Display for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TestMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anova" => Ok(TestMethod::OneWayAnova),
            "student" | "t" | "ttest" => Ok(TestMethod::TTest(TTestType::Student)),
            "welch" => Ok(TestMethod::TTest(TTestType::Welch)),
            "moderated" | "ebayes" => Ok(TestMethod::ModeratedT),
            other => Err(anyhow::anyhow!(
                "Unknown test method '{}' (expected anova, student, welch or moderated)",
                other
            )),
        }
    }
}

/// Outcome of one statistical test on one feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    /// The test statistic value (t or F)
    pub statistic: f64,
    /// The two-sided p-value of the test
    pub p_value: f64,
    /// Residual (denominator) degrees of freedom
    pub degrees_of_freedom: Option<f64>,
    /// Numerator degrees of freedom, F-tests only
    pub numerator_degrees_of_freedom: Option<f64>,
    /// The tested quantity, e.g. a difference of means
    pub estimate: Option<f64>,
    /// Standard error of the estimate
    pub standard_error: Option<f64>,
}

impl TestResult {
    /// Create a new test result with minimal information
    pub fn new(statistic: f64, p_value: f64) -> Self {
        TestResult {
            statistic,
            p_value,
            degrees_of_freedom: None,
            numerator_degrees_of_freedom: None,
            estimate: None,
            standard_error: None,
        }
    }

    pub fn with_degrees_of_freedom(mut self, df: f64) -> Self {
        self.degrees_of_freedom = Some(df);
        self
    }

    pub fn with_numerator_degrees_of_freedom(mut self, df: f64) -> Self {
        self.numerator_degrees_of_freedom = Some(df);
        self
    }

    pub fn with_estimate(mut self, estimate: f64, standard_error: f64) -> Self {
        self.estimate = Some(estimate);
        self.standard_error = Some(standard_error);
        self
    }
}
