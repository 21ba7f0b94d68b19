//! Parametric tests on the values of a single feature.
//!
//! Two-sample t-tests (Student's pooled variance and Welch's unequal variance) and the one-way
//! ANOVA F-test. Inputs are plain slices so the same code serves a matrix row split by group,
//! a simulated sample or a test fixture.

use num_traits::Float;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

use crate::error::TestFailure;
use crate::testing::utils::{GroupSummary, is_degenerate_variance, largest_squared_mean};
use crate::testing::{TTestType, TestResult};

/// Perform a t-test comparing two samples.
///
/// This function performs either Student's t-test (assuming equal variances) or
/// Welch's t-test (allowing unequal variances) on two samples. The estimate is
/// `mean(x) - mean(y)`.
///
/// # Arguments
///
/// * `x` - First sample
/// * `y` - Second sample
/// * `test_type` - Type of t-test to perform
///
/// # Returns
///
/// `TestResult` containing the t-statistic, the two-sided p-value and the degrees of freedom,
/// or the reason the test is undefined for these values.
pub fn t_test<T>(x: &[T], y: &[T], test_type: TTestType) -> Result<TestResult, TestFailure>
where
    T: Float,
{
    t_test_from_summaries(
        &GroupSummary::from_slice(x),
        &GroupSummary::from_slice(y),
        test_type,
    )
}

/// Perform a t-test using precomputed group summaries.
pub fn t_test_from_summaries(
    first: &GroupSummary,
    second: &GroupSummary,
    test_type: TTestType,
) -> Result<TestResult, TestFailure> {
    if first.n < 2 || second.n < 2 {
        return Err(TestFailure::insufficient(format!(
            "t-test needs at least 2 samples per group, got {} and {}",
            first.n, second.n
        )));
    }

    let n1 = first.n as f64;
    let n2 = second.n as f64;
    let var1 = first.variance();
    let var2 = second.variance();
    let magnitude = largest_squared_mean(&[*first, *second]);
    let mean_diff = first.mean - second.mean;

    let (std_err, df) = match test_type {
        TTestType::Student => {
            // Student's t-test (pooled variance)
            let pooled_var = (first.sum_squares + second.sum_squares) / (n1 + n2 - 2.0);
            if is_degenerate_variance(pooled_var, magnitude) {
                return Err(TestFailure::undefined("zero within-group variance"));
            }
            ((pooled_var * (1.0 / n1 + 1.0 / n2)).sqrt(), n1 + n2 - 2.0)
        }
        TTestType::Welch => {
            if is_degenerate_variance(var1.max(var2), magnitude) {
                return Err(TestFailure::undefined("zero within-group variance"));
            }
            let term1 = var1 / n1;
            let term2 = var2 / n2;
            let combined_var = term1 + term2;

            // Welch-Satterthwaite equation for degrees of freedom
            let df = combined_var * combined_var
                / (term1 * term1 / (n1 - 1.0) + term2 * term2 / (n2 - 1.0));
            (combined_var.sqrt(), df)
        }
    };

    let t_stat = mean_diff / std_err;
    let p_value = students_t_p_value(t_stat, df)?;

    Ok(TestResult::new(t_stat, p_value)
        .with_degrees_of_freedom(df)
        .with_estimate(mean_diff, std_err))
}

/// Two-sided p-value of a t statistic.
pub fn students_t_p_value(t_stat: f64, df: f64) -> Result<f64, TestFailure> {
    if !t_stat.is_finite() {
        return Err(TestFailure::undefined(format!("t statistic is {t_stat}")));
    }
    if !(df > 0.0) {
        return Err(TestFailure::undefined(format!(
            "degrees of freedom must be positive, got {df}"
        )));
    }

    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| TestFailure::undefined(format!("t distribution with {df} df: {e}")))?;
    let p_value = (2.0 * dist.sf(t_stat.abs())).min(1.0);
    checked_p_value(p_value)
}

/// Upper-tail p-value of an F statistic.
pub fn f_test_p_value(f_stat: f64, df_between: f64, df_within: f64) -> Result<f64, TestFailure> {
    if !f_stat.is_finite() || f_stat < 0.0 {
        return Err(TestFailure::undefined(format!("F statistic is {f_stat}")));
    }

    let dist = FisherSnedecor::new(df_between, df_within).map_err(|e| {
        TestFailure::undefined(format!(
            "F distribution with ({df_between}, {df_within}) df: {e}"
        ))
    })?;
    checked_p_value(dist.sf(f_stat))
}

fn checked_p_value(p_value: f64) -> Result<f64, TestFailure> {
    if p_value.is_finite() && (0.0..=1.0).contains(&p_value) {
        Ok(p_value)
    } else {
        Err(TestFailure::undefined(format!("p-value is {p_value}")))
    }
}

/// Decomposition of one feature's variance across groups.
///
/// Kept whole because the Tukey post-hoc step reuses the group summaries and the within-group
/// mean square of the omnibus fit.
#[derive(Debug, Clone, PartialEq)]
pub struct AnovaFit {
    pub summaries: Vec<GroupSummary>,
    pub grand_mean: f64,
    pub ss_between: f64,
    pub ss_within: f64,
    pub df_between: f64,
    pub df_within: f64,
    pub ms_between: f64,
    pub ms_within: f64,
    pub result: TestResult,
}

impl AnovaFit {
    pub fn n_groups(&self) -> usize {
        self.summaries.len()
    }

    pub fn means(&self) -> Vec<f64> {
        self.summaries.iter().map(|s| s.mean).collect()
    }
}

/// One-way ANOVA F-test across `groups`.
///
/// Needs at least two groups with two samples each and a positive residual degree of freedom.
pub fn one_way_anova<T>(groups: &[&[T]]) -> Result<AnovaFit, TestFailure>
where
    T: Float,
{
    let k = groups.len();
    if k < 2 {
        return Err(TestFailure::insufficient(format!(
            "ANOVA needs at least 2 groups, got {k}"
        )));
    }

    let summaries: Vec<GroupSummary> = groups.iter().map(|g| GroupSummary::from_slice(g)).collect();
    if let Some((g, s)) = summaries.iter().enumerate().find(|(_, s)| s.n < 2) {
        return Err(TestFailure::insufficient(format!(
            "group {} has {} sample(s), at least 2 required",
            g + 1,
            s.n
        )));
    }

    let n_total: usize = summaries.iter().map(|s| s.n).sum();
    let df_between = (k - 1) as f64;
    let df_within = n_total as f64 - k as f64;
    if df_within < 1.0 {
        return Err(TestFailure::insufficient(format!(
            "no residual degrees of freedom ({n_total} samples in {k} groups)"
        )));
    }

    let grand_mean = summaries.iter().map(|s| s.n as f64 * s.mean).sum::<f64>() / n_total as f64;
    let ss_between = summaries
        .iter()
        .map(|s| s.n as f64 * (s.mean - grand_mean).powi(2))
        .sum::<f64>();
    let ss_within = summaries.iter().map(|s| s.sum_squares).sum::<f64>();

    let ms_between = ss_between / df_between;
    let ms_within = ss_within / df_within;
    if is_degenerate_variance(ms_within, largest_squared_mean(&summaries)) {
        return Err(TestFailure::undefined("zero within-group variance"));
    }

    let f_stat = ms_between / ms_within;
    let p_value = f_test_p_value(f_stat, df_between, df_within)?;
    let result = TestResult::new(f_stat, p_value)
        .with_degrees_of_freedom(df_within)
        .with_numerator_degrees_of_freedom(df_between);

    Ok(AnovaFit {
        summaries,
        grand_mean,
        ss_between,
        ss_within,
        df_between,
        df_within,
        ms_between,
        ms_within,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_student_t_known_values() {
        let x = [1.0, 2.0, 3.0];
        let y = [7.0, 8.0, 9.0];
        let result = t_test(&x, &y, TTestType::Student).unwrap();

        assert_relative_eq!(result.statistic, -7.348469228349534, epsilon = 1e-9);
        assert_abs_diff_eq!(result.p_value, 0.001826, epsilon = 1e-5);
        assert_eq!(result.degrees_of_freedom, Some(4.0));
        assert_relative_eq!(result.estimate.unwrap(), -6.0);
    }

    #[test]
    fn test_welch_matches_student_for_equal_designs() {
        let x = [1.0, 2.0, 3.0];
        let y = [7.0, 8.0, 9.0];
        let student = t_test(&x, &y, TTestType::Student).unwrap();
        let welch = t_test(&x, &y, TTestType::Welch).unwrap();

        assert_relative_eq!(welch.statistic, student.statistic, epsilon = 1e-12);
        assert_relative_eq!(welch.degrees_of_freedom.unwrap(), 4.0, epsilon = 1e-12);
        assert_relative_eq!(welch.p_value, student.p_value, epsilon = 1e-12);
    }

    #[test]
    fn test_welch_degrees_of_freedom_shrink() {
        let x = [10.0, 10.5, 9.5, 10.2, 9.8];
        let y = [1.0, 8.0, 15.0, 3.0, 12.0, 6.0];
        let result = t_test(&x, &y, TTestType::Welch).unwrap();

        let df = result.degrees_of_freedom.unwrap();
        assert!(df > 4.0 && df < 9.0, "df = {df}");
        assert!(result.p_value > 0.0 && result.p_value <= 1.0);
    }

    #[test]
    fn test_t_test_is_antisymmetric() {
        let x = [4.1f32, 3.9, 4.4, 4.0];
        let y = [5.0f32, 5.2, 4.7, 5.5];
        let forward = t_test(&x, &y, TTestType::Welch).unwrap();
        let backward = t_test(&y, &x, TTestType::Welch).unwrap();

        assert_relative_eq!(forward.statistic, -backward.statistic);
        assert_relative_eq!(forward.p_value, backward.p_value);
    }

    #[test]
    fn test_t_test_failures() {
        let err = t_test(&[1.0], &[2.0, 3.0], TTestType::Student).unwrap_err();
        assert!(matches!(err, TestFailure::InsufficientData(_)));

        let err = t_test(&[5.0, 5.0, 5.0], &[10.0, 10.0, 10.0], TTestType::Student).unwrap_err();
        assert!(matches!(err, TestFailure::UndefinedStatistic(_)));

        let err = t_test(&[5.0, 5.0, 5.0], &[10.0, 10.0, 10.0], TTestType::Welch).unwrap_err();
        assert!(matches!(err, TestFailure::UndefinedStatistic(_)));
    }

    #[test]
    fn test_one_way_anova_known_values() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        let c = [7.0, 8.0, 9.0];
        let fit = one_way_anova(&[&a[..], &b[..], &c[..]]).unwrap();

        assert_relative_eq!(fit.grand_mean, 5.0);
        assert_relative_eq!(fit.ss_between, 54.0, epsilon = 1e-12);
        assert_relative_eq!(fit.ss_within, 6.0, epsilon = 1e-12);
        assert_relative_eq!(fit.result.statistic, 27.0, epsilon = 1e-10);
        // F(2, 6) upper tail at 27 is (1 + 2 * 27 / 6)^-3
        assert_relative_eq!(fit.result.p_value, 0.001, epsilon = 1e-9);
        assert_eq!(fit.result.degrees_of_freedom, Some(6.0));
        assert_eq!(fit.result.numerator_degrees_of_freedom, Some(2.0));
    }

    #[test]
    fn test_anova_two_groups_matches_student() {
        let x = [2.0, 2.2, 1.8, 2.1];
        let y = [8.0, 7.5, 8.5, 7.9];
        let fit = one_way_anova(&[&x[..], &y[..]]).unwrap();
        let t = t_test(&x, &y, TTestType::Student).unwrap();

        assert_relative_eq!(fit.result.statistic, t.statistic * t.statistic, epsilon = 1e-8);
        assert_relative_eq!(fit.result.p_value, t.p_value, epsilon = 1e-8);
    }

    #[test]
    fn test_anova_failures() {
        let single: [&[f64]; 1] = [&[1.0, 2.0]];
        assert!(matches!(
            one_way_anova(&single).unwrap_err(),
            TestFailure::InsufficientData(_)
        ));

        let small: [&[f64]; 2] = [&[1.0, 2.0], &[3.0]];
        assert!(matches!(
            one_way_anova(&small).unwrap_err(),
            TestFailure::InsufficientData(_)
        ));

        let flat: [&[f64]; 3] = [&[0.1; 4], &[0.1; 4], &[0.1; 4]];
        assert!(matches!(
            one_way_anova(&flat).unwrap_err(),
            TestFailure::UndefinedStatistic(_)
        ));
    }

    #[test]
    fn test_p_value_helpers_reject_non_finite() {
        assert!(students_t_p_value(f64::NAN, 4.0).is_err());
        assert!(students_t_p_value(1.0, 0.0).is_err());
        assert!(f_test_p_value(f64::INFINITY, 2.0, 6.0).is_err());
        assert_relative_eq!(students_t_p_value(0.0, 10.0).unwrap(), 1.0);
    }
}
