use std::fmt;
use std::str::FromStr;

use crate::data::GroupLayout;
use crate::error::ConfigError;

const ZERO_SUM_TOLERANCE: f64 = 1e-9;
const PAIR_SEPARATOR: &str = " vs ";

/// Signed linear combination of group means.
///
/// `adult-control` is the pairwise contrast `mean(adult) - mean(control)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Contrast {
    name: String,
    coefficients: Vec<(String, f64)>,
}

impl Contrast {
    /// `mean(first) - mean(second)`.
    pub fn pairwise(first: impl Into<String>, second: impl Into<String>) -> Self {
        let first = first.into();
        let second = second.into();
        Contrast {
            name: format!("{first}-{second}"),
            coefficients: vec![(first, 1.0), (second, -1.0)],
        }
    }

    /// Arbitrary contrast; coefficients must sum to zero and name each group at most once.
    pub fn from_coefficients<I, L>(
        name: impl Into<String>,
        coefficients: I,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (L, f64)>,
        L: Into<String>,
    {
        let name = name.into();
        let mut merged: Vec<(String, f64)> = Vec::new();
        for (label, weight) in coefficients {
            let label = label.into();
            if !weight.is_finite() {
                return Err(ConfigError::InvalidContrast {
                    spec: name,
                    reason: format!("coefficient for '{label}' is not finite"),
                });
            }
            if merged.iter().any(|(l, _)| *l == label) {
                return Err(ConfigError::InvalidContrast {
                    spec: name,
                    reason: format!("group '{label}' listed twice"),
                });
            }
            if weight != 0.0 {
                merged.push((label, weight));
            }
        }

        if merged.is_empty() {
            return Err(ConfigError::InvalidContrast {
                spec: name,
                reason: "no non-zero coefficients".to_string(),
            });
        }

        let sum: f64 = merged.iter().map(|(_, w)| w).sum();
        if sum.abs() > ZERO_SUM_TOLERANCE {
            return Err(ConfigError::NonZeroSum {
                contrast: name,
                sum,
            });
        }

        Ok(Contrast {
            name,
            coefficients: merged,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coefficients(&self) -> &[(String, f64)] {
        &self.coefficients
    }

    /// The `(up, down)` labels if this is a `+1 / -1` contrast.
    pub fn as_pair(&self) -> Option<(&str, &str)> {
        match self.coefficients.as_slice() {
            [(a, wa), (b, wb)] if *wa == 1.0 && *wb == -1.0 => Some((a.as_str(), b.as_str())),
            [(a, wa), (b, wb)] if *wa == -1.0 && *wb == 1.0 => Some((b.as_str(), a.as_str())),
            _ => None,
        }
    }

    pub fn is_pairwise(&self) -> bool {
        self.as_pair().is_some()
    }

    /// The contrast with all coefficients sign-flipped (B - A for A - B).
    pub fn negated(&self) -> Self {
        let name = match self.as_pair() {
            Some((up, down)) => format!("{down}-{up}"),
            None => format!("-({})", self.name),
        };
        Contrast {
            name,
            coefficients: self
                .coefficients
                .iter()
                .map(|(label, w)| (label.clone(), -w))
                .collect(),
        }
    }

    /// Map the coefficients onto group positions of `layout`.
    ///
    /// Coefficients naming the same group add up, so `b-b` resolves to no contrast at all and
    /// is rejected.
    pub fn resolve(&self, layout: &GroupLayout) -> Result<ResolvedContrast, ConfigError> {
        let mut weights = vec![0.0; layout.n_groups()];
        for (label, weight) in &self.coefficients {
            let group = layout.position(label).ok_or_else(|| ConfigError::UnknownGroup {
                contrast: self.name.clone(),
                group: label.clone(),
            })?;
            weights[group] += *weight;
        }

        if weights.iter().all(|&w| w == 0.0) {
            return Err(ConfigError::InvalidContrast {
                spec: self.name.clone(),
                reason: "no group keeps a non-zero coefficient".to_string(),
            });
        }
        let sum: f64 = weights.iter().sum();
        if sum.abs() > ZERO_SUM_TOLERANCE {
            return Err(ConfigError::NonZeroSum {
                contrast: self.name.clone(),
                sum,
            });
        }
        Ok(ResolvedContrast { weights })
    }
}

impl fmt::Display for Contrast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for Contrast {
    type Err = ConfigError;

    /// Parses `A-B` into the pairwise contrast `mean(A) - mean(B)`.
    ///
    /// Labels that contain `-` themselves need the `A vs B` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidContrast {
            spec: s.to_string(),
            reason: reason.to_string(),
        };

        let pair = match s.split_once(PAIR_SEPARATOR) {
            Some((a, b)) if !b.contains(PAIR_SEPARATOR) => Some((a, b)),
            Some(_) => return Err(invalid("expected exactly one ' vs ' between two group labels")),
            None => {
                let mut parts = s.split('-');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(a), Some(b), None) => Some((a, b)),
                    _ => None,
                }
            }
        };
        let (a, b) =
            pair.ok_or_else(|| invalid("expected A-B, or A vs B for labels containing '-'"))?;

        let (a, b) = (a.trim(), b.trim());
        if a.is_empty() || b.is_empty() {
            return Err(invalid("group labels cannot be empty"));
        }
        if a == b {
            return Err(invalid("a group cannot be compared with itself"));
        }
        Ok(Contrast::pairwise(a, b))
    }
}

/// Contrast weights indexed by group position in a [`GroupLayout`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedContrast {
    weights: Vec<f64>,
}

impl ResolvedContrast {
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Group positions that take part in the contrast.
    pub fn groups(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w != 0.0)
            .map(|(g, w)| (g, *w))
    }

    /// `(up, down)` group positions for a `+1 / -1` contrast.
    pub fn pair(&self) -> Option<(usize, usize)> {
        let mut up = None;
        let mut down = None;
        for (g, w) in self.groups() {
            match w {
                w if w == 1.0 && up.is_none() => up = Some(g),
                w if w == -1.0 && down.is_none() => down = Some(g),
                _ => return None,
            }
        }
        up.zip(down)
    }

    /// `sum(c_g * means_g)`.
    pub fn estimate(&self, means: &[f64]) -> f64 {
        self.groups().map(|(g, w)| w * means[g]).sum()
    }
}
