use approx::assert_relative_eq;
use diffex::error::TestFailure;
use diffex::testing::inference::moderated::{EmpiricalBayes, fit_group_means};
use diffex::testing::inference::parametric::{one_way_anova, t_test};
use diffex::testing::inference::posthoc::tukey_hsd;
use diffex::testing::{TTestType, TestResult};

#[cfg(test)]
mod quick_test {
    use super::*;

    fn print_result(name: &str, result: &TestResult) {
        println!("=== {} ===", name);
        println!("Statistic: {}", result.statistic);
        println!("P-value: {}", result.p_value);
        println!("df: {:?}", result.degrees_of_freedom);
    }

    #[test]
    fn check_if_ttest_works() {
        // Group 1: [1, 2, 3] -> mean=2, Group 2: [7, 8, 9] -> mean=8, both variance 1
        let x = [1.0, 2.0, 3.0];
        let y = [7.0, 8.0, 9.0];

        let result = t_test(&x, &y, TTestType::Student).unwrap();
        print_result("Student", &result);

        assert_relative_eq!(result.statistic, -7.348469228, epsilon = 1e-8);
        assert_relative_eq!(result.degrees_of_freedom.unwrap(), 4.0);
        assert!(result.p_value < 0.01);
        assert_relative_eq!(result.estimate.unwrap(), -6.0);

        // equal variances and sizes: Welch collapses onto Student
        let welch = t_test(&x, &y, TTestType::Welch).unwrap();
        assert_relative_eq!(welch.statistic, result.statistic, epsilon = 1e-12);
        assert_relative_eq!(welch.p_value, result.p_value, epsilon = 1e-12);
    }

    #[test]
    fn check_identical_groups() {
        // Identical constant groups: no variance, so no statistic
        let x = [5.0, 5.0, 5.0];
        let y = [5.0, 5.0, 5.0];

        for test_type in [TTestType::Student, TTestType::Welch] {
            let failure = t_test(&x, &y, test_type).unwrap_err();
            println!("{:?}: {}", test_type, failure);
            assert!(matches!(failure, TestFailure::UndefinedStatistic(_)));
        }
    }

    #[test]
    fn test_same_distribution() {
        let x = [4.1, 3.9, 4.3, 3.7];
        let y = [3.9, 4.1, 3.7, 4.3];

        let result = t_test(&x, &y, TTestType::Student).unwrap();
        print_result("Same distribution", &result);
        assert_relative_eq!(result.statistic, 0.0, epsilon = 1e-12);
        assert_relative_eq!(result.p_value, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unequal_sample_sizes() {
        // mean 3, variance 2.5 against mean 7, variance 2
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [6.0, 8.0];

        let student = t_test(&x, &y, TTestType::Student).unwrap();
        print_result("Student, unequal n", &student);
        assert_relative_eq!(student.statistic, -3.086067, epsilon = 1e-6);
        assert_relative_eq!(student.degrees_of_freedom.unwrap(), 5.0);

        let welch = t_test(&x, &y, TTestType::Welch).unwrap();
        print_result("Welch, unequal n", &welch);
        assert_relative_eq!(welch.statistic, -3.265986, epsilon = 1e-6);
        assert_relative_eq!(welch.degrees_of_freedom.unwrap(), 2.117647, epsilon = 1e-6);

        // fewer Welch degrees of freedom make the tail heavier
        assert!(welch.p_value > student.p_value);
    }

    #[test]
    fn test_high_variance_groups() {
        let x = [1.0, 10.0, 2.0, 9.0];
        let y = [3.0, 12.0, 4.0, 11.0];

        let result = t_test(&x, &y, TTestType::Welch).unwrap();
        print_result("High variance", &result);
        assert!(result.p_value > 0.05);
        assert!(result.p_value < 1.0);
    }

    #[test]
    fn test_minimal_sample_size() {
        let x = [1.0];
        let y = [2.0, 3.0];

        for test_type in [TTestType::Student, TTestType::Welch] {
            let failure = t_test(&x, &y, test_type).unwrap_err();
            println!("{:?}: {}", test_type, failure);
            assert!(matches!(failure, TestFailure::InsufficientData(_)));
        }

        // two per group is enough
        assert!(t_test(&[1.0, 2.0], &[3.0, 5.0], TTestType::Student).is_ok());
    }

    #[test]
    fn test_anova_three_groups() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        let c = [7.0, 8.0, 9.0];

        let fit = one_way_anova(&[&a[..], &b[..], &c[..]]).unwrap();
        print_result("ANOVA", &fit.result);

        assert_relative_eq!(fit.ss_between, 54.0, epsilon = 1e-10);
        assert_relative_eq!(fit.ss_within, 6.0, epsilon = 1e-10);
        assert_relative_eq!(fit.result.statistic, 27.0, epsilon = 1e-10);
        assert_relative_eq!(fit.df_between, 2.0);
        assert_relative_eq!(fit.df_within, 6.0);
        assert_relative_eq!(fit.result.p_value, 0.001, epsilon = 1e-6);
    }

    #[test]
    fn test_tukey_after_anova() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        let c = [7.0, 8.0, 9.0];
        let fit = one_way_anova(&[&a[..], &b[..], &c[..]]).unwrap();

        let comparisons = tukey_hsd(&fit, 0.95).unwrap();
        let pairs: Vec<(usize, usize)> = comparisons.iter().map(|c| (c.first, c.second)).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);

        for comparison in &comparisons {
            println!(
                "{}-{}: diff={} q={} [{}, {}] p={}",
                comparison.second,
                comparison.first,
                comparison.difference,
                comparison.q_statistic,
                comparison.lower,
                comparison.upper,
                comparison.adjusted_p_value
            );
            assert!(comparison.lower > 0.0);
            assert!(comparison.adjusted_p_value < 0.05);
        }
        assert_relative_eq!(comparisons[0].difference, 3.0, epsilon = 1e-12);
        assert_relative_eq!(comparisons[1].difference, 6.0, epsilon = 1e-12);
        assert_relative_eq!(comparisons[0].q_statistic, 27.0f64.sqrt(), epsilon = 1e-10);
        assert!(comparisons[1].adjusted_p_value < comparisons[0].adjusted_p_value);
    }

    #[test]
    fn test_moderated_without_pooling_matches_student() {
        // a single fit carries no information about the variance prior
        let x = [2.0, 2.5, 3.5, 4.0];
        let y = [5.0, 6.5, 6.0, 7.5];

        let fit = fit_group_means(&[&x[..], &y[..]]).unwrap();
        let eb = EmpiricalBayes::from_fits([&fit]);
        assert_eq!(eb.prior.df, 0.0);

        let moderated = eb.moderated_t(&fit, &[1.0, -1.0]).unwrap();
        let student = t_test(&x, &y, TTestType::Student).unwrap();
        print_result("Moderated, single feature", &moderated);

        assert_relative_eq!(moderated.statistic, student.statistic, epsilon = 1e-10);
        assert_relative_eq!(moderated.p_value, student.p_value, epsilon = 1e-10);
    }

    #[test]
    fn test_moderated_equal_variances_use_pooled_df() {
        // identical residual variances: the prior takes over and df reaches the pooled total
        let fits: Vec<_> = (0..5)
            .map(|shift| {
                let x: Vec<f64> = [1.0, 2.0, 3.0].iter().map(|v| v + shift as f64).collect();
                let y: Vec<f64> = [2.0, 3.0, 4.0].iter().map(|v| v + 2.0 * shift as f64).collect();
                fit_group_means(&[&x[..], &y[..]]).unwrap()
            })
            .collect();

        let eb = EmpiricalBayes::from_fits(&fits);
        println!("prior: {:?}", eb.prior);
        assert!(eb.prior.df.is_infinite());
        // exp(ln 2 - digamma(2)) for residual variance 1 on 4 df
        assert_relative_eq!(eb.prior.variance, 1.310439851632207, epsilon = 1e-8);
        assert_relative_eq!(eb.posterior_df(&fits[0]), 20.0);

        let result = eb.moderated_t(&fits[3], &[1.0, -1.0]).unwrap();
        assert_relative_eq!(result.degrees_of_freedom.unwrap(), 20.0);
        // means 5 and 9, standard error sqrt(s0^2 * 2/3)
        assert_relative_eq!(result.statistic, -4.279539851333361, epsilon = 1e-7);
    }
}
