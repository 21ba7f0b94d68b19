use std::collections::HashMap;
use std::ops::Range;

use anyhow::{Result, bail};

use crate::data::IntensityMatrix;
use crate::error::ConfigError;

/// Mapping from sample identifier to group label.
///
/// The mapping does not need to follow the column order of any matrix; it is resolved against a
/// concrete [`IntensityMatrix`] with [`GroupAssignment::resolve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupAssignment {
    labels: HashMap<String, String>,
}

impl GroupAssignment {
    /// Build an assignment from `(sample, label)` pairs.
    ///
    /// A sample listed twice with the same label is accepted, with two different labels it is a
    /// configuration error.
    pub fn from_pairs<I, S, L>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, L)>,
        S: Into<String>,
        L: Into<String>,
    {
        let mut labels: HashMap<String, String> = HashMap::new();
        for (sample, label) in pairs {
            let sample = sample.into();
            let label = label.into();
            if let Some(existing) = labels.get(&sample) {
                if *existing != label {
                    return Err(ConfigError::ConflictingAssignment {
                        sample,
                        first: existing.clone(),
                        second: label,
                    }
                    .into());
                }
                continue;
            }
            labels.insert(sample, label);
        }
        Ok(GroupAssignment { labels })
    }

    /// Build an assignment from column-index ranges over `sample_ids`, e.g. `0..10 => "control"`.
    pub fn from_ranges<L: AsRef<str>>(
        sample_ids: &[String],
        ranges: &[(Range<usize>, L)],
    ) -> Result<Self> {
        let mut pairs = Vec::new();
        for (range, label) in ranges {
            if range.end > sample_ids.len() || range.start >= range.end {
                bail!(
                    "Invalid column range {}..{} for group '{}' ({} samples available)",
                    range.start,
                    range.end,
                    label.as_ref(),
                    sample_ids.len()
                );
            }
            pairs.extend(
                sample_ids[range.clone()]
                    .iter()
                    .map(|sample| (sample.clone(), label.as_ref().to_string())),
            );
        }
        Self::from_pairs(pairs)
    }

    pub fn label_of(&self, sample: &str) -> Option<&str> {
        self.labels.get(sample).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Resolve the assignment against the columns of `matrix`.
    ///
    /// Every sample of the matrix must carry a label. Groups are ordered by first appearance
    /// across the matrix columns. Samples known to the assignment but absent from the matrix are
    /// ignored.
    pub fn resolve(&self, matrix: &IntensityMatrix) -> Result<GroupLayout> {
        let mut labels: Vec<String> = Vec::new();
        let mut members: Vec<Vec<usize>> = Vec::new();

        for (col, sample) in matrix.sample_ids().iter().enumerate() {
            let label = self.label_of(sample).ok_or_else(|| ConfigError::UnassignedSample {
                sample: sample.clone(),
            })?;
            match labels.iter().position(|l| l == label) {
                Some(g) => members[g].push(col),
                None => {
                    labels.push(label.to_string());
                    members.push(vec![col]);
                }
            }
        }

        let unused = self
            .labels
            .keys()
            .filter(|&sample| !matrix.sample_ids().contains(sample))
            .count();
        if unused > 0 {
            log::warn!(
                "{} samples in the group assignment are not present in the intensity table",
                unused
            );
        }

        Ok(GroupLayout { labels, members })
    }
}

/// Group labels resolved to matrix column indices.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupLayout {
    labels: Vec<String>,
    members: Vec<Vec<usize>>,
}

impl GroupLayout {
    pub fn n_groups(&self) -> usize {
        self.labels.len()
    }

    pub fn n_samples(&self) -> usize {
        self.members.iter().map(Vec::len).sum()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, group: usize) -> &str {
        &self.labels[group]
    }

    pub fn indices(&self, group: usize) -> &[usize] {
        &self.members[group]
    }

    pub fn size(&self, group: usize) -> usize {
        self.members[group].len()
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// All unordered group pairs `(i, j)` with `i < j`, in layout order.
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        let k = self.n_groups();
        (0..k)
            .flat_map(|i| (i + 1..k).map(move |j| (i, j)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn matrix(samples: &[&str]) -> IntensityMatrix {
        IntensityMatrix::new(
            Array2::zeros((1, samples.len())),
            vec!["p0".to_string()],
            samples.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_non_contiguous_assignment() {
        let m = matrix(&["a1", "b1", "a2", "c1", "b2", "c2"]);
        let groups = GroupAssignment::from_pairs([
            ("a1", "A"),
            ("a2", "A"),
            ("b1", "B"),
            ("b2", "B"),
            ("c1", "C"),
            ("c2", "C"),
        ])
        .unwrap();

        let layout = groups.resolve(&m).unwrap();
        assert_eq!(layout.labels(), &["A", "B", "C"]);
        assert_eq!(layout.indices(0), &[0, 2]);
        assert_eq!(layout.indices(1), &[1, 4]);
        assert_eq!(layout.indices(2), &[3, 5]);
        assert_eq!(layout.n_samples(), 6);
        assert_eq!(layout.pairs(), vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn test_unassigned_sample_is_config_error() {
        let m = matrix(&["a1", "a2", "x"]);
        let groups = GroupAssignment::from_pairs([("a1", "A"), ("a2", "A")]).unwrap();
        let err = groups.resolve(&m).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::UnassignedSample {
                sample: "x".to_string()
            })
        );
    }

    #[test]
    fn test_conflicting_labels() {
        let result = GroupAssignment::from_pairs([("s1", "A"), ("s1", "B")]);
        assert!(result.is_err());
        let same = GroupAssignment::from_pairs([("s1", "A"), ("s1", "A")]).unwrap();
        assert_eq!(same.len(), 1);
    }

    #[test]
    fn test_from_ranges() {
        let samples: Vec<String> = (0..8).map(|i| format!("s{i}")).collect();
        let groups =
            GroupAssignment::from_ranges(&samples, &[(0..4, "control"), (4..8, "adult")]).unwrap();
        assert_eq!(groups.label_of("s3"), Some("control"));
        assert_eq!(groups.label_of("s4"), Some("adult"));

        assert!(GroupAssignment::from_ranges(&samples, &[(6..10, "adult")]).is_err());
    }
}
