//! Multiple testing correction for the p-values of one contrast (or one omnibus run).
//!
//! Correction never mixes contrasts: each call sees the p-values of exactly one family.

use anyhow::{Result, anyhow};

/// Apply Benjamini-Hochberg (BH) procedure for controlling false discovery rate
///
/// The BH procedure controls the false discovery rate (FDR), which is the expected
/// proportion of false positives among all rejected null hypotheses.
///
/// # Arguments
/// * `p_values` - A slice of p-values to adjust
///
/// # Returns
/// * `Result<Vec<f64>>` - Vector of adjusted p-values, in the order of `p_values`
///
/// # Example
/// ```
/// use diffex::testing::correction::benjamini_hochberg_correction;
///
/// let p_values = vec![0.01, 0.03, 0.05];
/// let adjusted = benjamini_hochberg_correction(&p_values).unwrap();
/// for (q, expected) in adjusted.iter().zip([0.03, 0.045, 0.05]) {
///     approx::assert_relative_eq!(*q, expected, epsilon = 1e-12);
/// }
/// ```
pub fn benjamini_hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    let n = p_values.len();
    if n == 0 {
        return Err(anyhow!("Empty p-value array"));
    }

    // Validate p-values
    for (i, &p) in p_values.iter().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(anyhow!("Invalid p-value at index {}: {}", i, p));
        }
    }

    // Create index-value pairs and sort in ascending order
    let mut indexed_p_values: Vec<(usize, f64)> =
        p_values.iter().enumerate().map(|(i, &p)| (i, p)).collect();
    indexed_p_values.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut adjusted_p_values = vec![0.0; n];
    let mut current_min = 1.0;

    // Process from largest to smallest p-value
    for i in (0..n).rev() {
        let (orig_idx, p_val) = indexed_p_values[i];
        let rank = i + 1;

        let adjustment = (p_val * n as f64 / rank as f64).min(1.0);
        current_min = adjustment.min(current_min);
        adjusted_p_values[orig_idx] = current_min;
    }

    Ok(adjusted_p_values)
}

/// Benjamini-Hochberg over the tests that produced a p-value.
///
/// `None` entries are features whose test failed; they are left out of the ranking (the number
/// of tests `m` counts only the `Some` entries) and stay `None` in the output.
pub fn benjamini_hochberg_partial(p_values: &[Option<f64>]) -> Result<Vec<Option<f64>>> {
    let (positions, valid): (Vec<usize>, Vec<f64>) = p_values
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.map(|p| (i, p)))
        .unzip();

    let mut adjusted = vec![None; p_values.len()];
    if valid.is_empty() {
        return Ok(adjusted);
    }

    let corrected = benjamini_hochberg_correction(&valid)?;
    for (position, q) in positions.into_iter().zip(corrected) {
        adjusted[position] = Some(q);
    }
    Ok(adjusted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_benjamini_hochberg_empty_input() {
        // Test with empty input
        let result = benjamini_hochberg_correction(&[]);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().to_string(), "Empty p-value array");
    }

    #[test]
    fn test_benjamini_hochberg_invalid_pvalues() {
        // Test with invalid p-values (negative)
        let result = benjamini_hochberg_correction(&[0.01, -0.5, 0.03]);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid p-value at index 1")
        );

        // NaN is never a valid p-value
        let result = benjamini_hochberg_correction(&[0.01, f64::NAN, 0.03]);
        assert!(result.is_err());
    }

    #[test]
    fn test_benjamini_hochberg_identical_pvalues() {
        let p_values = vec![0.05, 0.05, 0.05];
        let adjusted = benjamini_hochberg_correction(&p_values).unwrap();

        for a in adjusted {
            assert_relative_eq!(a, 0.05, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_benjamini_hochberg_unordered_pvalues() {
        let p_values = vec![0.05, 0.01, 0.1, 0.04, 0.02];
        let expected = vec![0.0625, 0.05, 0.1, 0.0625, 0.05];
        let adjusted = benjamini_hochberg_correction(&p_values).unwrap();

        for (i, (a, e)) in adjusted.iter().zip(expected.iter()).enumerate() {
            if (*a - *e).abs() > 1e-10 {
                panic!(
                    "mismatch at index {}: expected {}, got {}, whole: {:?}",
                    i, *e, *a, adjusted
                );
            }
        }
    }

    #[test]
    fn test_benjamini_hochberg_real_example() {
        let pvalues = vec![0.1, 0.2, 0.3, 0.4, 0.1];
        let expected = [0.25, 0.3333333333333333, 0.375, 0.4, 0.25];
        let adjusted = benjamini_hochberg_correction(&pvalues).unwrap();

        for (a, e) in adjusted.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *e, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_benjamini_hochberg_monotone_and_conservative() {
        let p_values = vec![0.3, 0.001, 0.04, 0.9, 0.02, 0.02, 0.5, 0.0];
        let adjusted = benjamini_hochberg_correction(&p_values).unwrap();

        let mut order: Vec<usize> = (0..p_values.len()).collect();
        order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));
        for pair in order.windows(2) {
            assert!(adjusted[pair[0]] <= adjusted[pair[1]]);
        }
        for (q, p) in adjusted.iter().zip(&p_values) {
            assert!(q >= p);
            assert!(*q <= 1.0);
        }
    }

    #[test]
    fn test_benjamini_hochberg_single_pvalue() {
        let adjusted = benjamini_hochberg_correction(&[0.025]).unwrap();
        assert_relative_eq!(adjusted[0], 0.025, epsilon = 1e-10);
    }

    #[test]
    fn test_partial_excludes_failed_tests() {
        let p_values = vec![Some(0.01), None, Some(0.04), None];
        let adjusted = benjamini_hochberg_partial(&p_values).unwrap();

        // m = 2, not 4
        assert_relative_eq!(adjusted[0].unwrap(), 0.02, epsilon = 1e-12);
        assert_relative_eq!(adjusted[2].unwrap(), 0.04, epsilon = 1e-12);
        assert_eq!(adjusted[1], None);
        assert_eq!(adjusted[3], None);

        let all_failed = benjamini_hochberg_partial(&[None, None]).unwrap();
        assert_eq!(all_failed, vec![None, None]);
    }
}
