use std::collections::HashSet;

use anyhow::{Result, anyhow, bail};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Features × samples table of intensities.
///
/// Rows are features (proteins), columns are samples. Identifiers on both axes are unique and
/// every entry is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityMatrix {
    values: Array2<f64>,
    feature_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl IntensityMatrix {
    pub fn new(
        values: Array2<f64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (n_features, n_samples) = values.dim();
        if feature_ids.len() != n_features {
            bail!(
                "Matrix has {} rows but {} feature ids were given",
                n_features,
                feature_ids.len()
            );
        }
        if sample_ids.len() != n_samples {
            bail!(
                "Matrix has {} columns but {} sample ids were given",
                n_samples,
                sample_ids.len()
            );
        }
        if n_features == 0 || n_samples == 0 {
            return Err(anyhow!("Intensity matrix cannot be empty"));
        }
        ensure_unique("feature", &feature_ids)?;
        ensure_unique("sample", &sample_ids)?;

        if let Some(((row, col), value)) = values.indexed_iter().find(|(_, v)| !v.is_finite()) {
            bail!(
                "Non-finite intensity {} for feature '{}' in sample '{}'",
                value,
                feature_ids[row],
                sample_ids[col]
            );
        }

        Ok(IntensityMatrix {
            values,
            feature_ids,
            sample_ids,
        })
    }

    /// Build a matrix from row vectors, one per feature.
    pub fn from_rows(
        rows: Vec<Vec<f64>>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let n_samples = sample_ids.len();
        let mut flat = Vec::with_capacity(rows.len() * n_samples);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_samples {
                bail!(
                    "Feature row {} has {} values, expected {}",
                    i,
                    row.len(),
                    n_samples
                );
            }
            flat.extend_from_slice(row);
        }
        let values = Array2::from_shape_vec((rows.len(), n_samples), flat)?;
        Self::new(values, feature_ids, sample_ids)
    }

    pub fn n_features(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.values.ncols()
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn row(&self, feature: usize) -> ArrayView1<'_, f64> {
        self.values.row(feature)
    }

    pub fn feature_index(&self, feature_id: &str) -> Option<usize> {
        self.feature_ids.iter().position(|f| f == feature_id)
    }

    /// Replace the values while keeping identifiers; the new array must keep the shape.
    pub(crate) fn with_values(&self, values: Array2<f64>) -> Result<Self> {
        if values.dim() != self.values.dim() {
            bail!(
                "Replacement values have shape {:?}, expected {:?}",
                values.dim(),
                self.values.dim()
            );
        }
        Self::new(values, self.feature_ids.clone(), self.sample_ids.clone())
    }
}

fn ensure_unique(axis: &str, ids: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            bail!("Duplicate {} id '{}'", axis, id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn test_new_checks_dimensions() {
        let values = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert!(IntensityMatrix::new(values.clone(), ids("p", 2), ids("s", 3)).is_ok());
        assert!(IntensityMatrix::new(values.clone(), ids("p", 3), ids("s", 3)).is_err());
        assert!(IntensityMatrix::new(values, ids("p", 2), ids("s", 2)).is_err());
    }

    #[test]
    fn test_rejects_duplicates_and_missing_values() {
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        let dup = vec!["p".to_string(), "p".to_string()];
        let err = IntensityMatrix::new(values, dup, ids("s", 2)).unwrap_err();
        assert!(err.to_string().contains("Duplicate feature id 'p'"));

        let values = array![[1.0, f64::NAN], [3.0, 4.0]];
        let err = IntensityMatrix::new(values, ids("p", 2), ids("s", 2)).unwrap_err();
        assert!(err.to_string().contains("feature 'p0' in sample 's1'"));
    }

    #[test]
    fn test_from_rows() {
        let matrix = IntensityMatrix::from_rows(
            vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
            ids("p", 3),
            ids("s", 2),
        )
        .unwrap();
        assert_eq!(matrix.n_features(), 3);
        assert_eq!(matrix.n_samples(), 2);
        assert_eq!(matrix.row(2).to_vec(), vec![5.0, 6.0]);
        assert_eq!(matrix.feature_index("p1"), Some(1));

        let ragged =
            IntensityMatrix::from_rows(vec![vec![1.0], vec![3.0, 4.0]], ids("p", 2), ids("s", 2));
        assert!(ragged.is_err());
    }
}
