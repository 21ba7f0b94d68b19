//! Command-line interface for diffex

use std::ops::Range;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::data::{
    Contrast, FoldChangeBasis, GroupAssignment, IntensityMatrix, Normalization, Scaling,
};
use crate::engine::AnalysisConfig;
use crate::io::read_group_table;
use crate::testing::TestMethod;

#[derive(Parser)]
#[command(name = "diffex")]
#[command(version)]
#[command(about = "Differential expression testing for grouped intensity tables")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// One-way ANOVA across all groups with Tukey HSD post-hoc comparisons
    #[command(after_long_help = "\
Examples:
  diffex omnibus -i intensities.tsv -g groups.csv -o results

  # groups given as column ranges (0-based, end exclusive)
  diffex omnibus -i intensities.tsv --range control=0..10 --range adult=10..20")]
    Omnibus {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Per-contrast t-tests or moderated t-tests
    #[command(after_long_help = "\
Examples:
  diffex contrasts -i intensities.tsv -g groups.csv -c adult-control -c lessone-control

  diffex contrasts -i intensities.tsv -g groups.csv -c adult-control --method welch")]
    Contrasts {
        #[command(flatten)]
        common: CommonArgs,

        /// Pairwise contrast A-B (mean(A) - mean(B)), repeatable; use "A vs B" when a label
        /// contains '-'
        #[arg(
            short,
            long = "contrast",
            value_name = "A-B",
            required = true,
            value_parser = Contrast::from_str
        )]
        contrasts: Vec<Contrast>,

        /// Test: moderated, student or welch
        #[arg(short, long, default_value = "moderated", value_parser = TestMethod::from_str)]
        method: TestMethod,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScalingArg {
    None,
    Center,
    Standardize,
}

impl From<ScalingArg> for Scaling {
    fn from(arg: ScalingArg) -> Self {
        match arg {
            ScalingArg::None => Scaling::None,
            ScalingArg::Center => Scaling::Center,
            ScalingArg::Standardize => Scaling::Standardize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BasisArg {
    Log2,
    Normalized,
}

impl From<BasisArg> for FoldChangeBasis {
    fn from(arg: BasisArg) -> Self {
        match arg {
            BasisArg::Log2 => FoldChangeBasis::Log2,
            BasisArg::Normalized => FoldChangeBasis::Normalized,
        }
    }
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Intensity table (features x samples, tab or comma separated)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Group file with `sample,group` rows and a header
    #[arg(short, long, conflicts_with = "ranges")]
    pub groups: Option<PathBuf>,

    /// Column range of one group, LABEL=START..END (0-based, end exclusive), repeatable
    #[arg(long = "range", value_name = "LABEL=START..END", value_parser = GroupRange::from_str)]
    pub ranges: Vec<GroupRange>,

    /// Output directory
    #[arg(short, long, default_value = "diffex_results")]
    pub output: PathBuf,

    /// Adjusted p-value threshold (inclusive)
    #[arg(short, long, default_value_t = 0.05)]
    pub alpha: f64,

    /// Absolute log2 fold change threshold (inclusive)
    #[arg(long, default_value_t = 0.5)]
    pub fc_threshold: f64,

    /// Confidence level of the Tukey intervals
    #[arg(long, default_value_t = 0.95)]
    pub confidence_level: f64,

    /// Input is already on a log scale; skip the log2 transform
    #[arg(long)]
    pub no_log2: bool,

    /// Added to every intensity before the log2 transform
    #[arg(long, default_value_t = 0.0)]
    pub pseudo_count: f64,

    /// Per-sample scaling after the log transform
    #[arg(long, value_enum, default_value_t = ScalingArg::None)]
    pub scaling: ScalingArg,

    /// Matrix the fold changes are computed from
    #[arg(long, value_enum, default_value_t = BasisArg::Log2)]
    pub fold_change_basis: BasisArg,

    /// Number of worker threads [default: all cores]
    #[arg(short, long)]
    pub threads: Option<usize>,
}

impl CommonArgs {
    pub fn config(&self) -> AnalysisConfig {
        let normalization = Normalization {
            log2: !self.no_log2,
            pseudo_count: self.pseudo_count,
            scaling: self.scaling.into(),
        };
        AnalysisConfig::default()
            .with_thresholds(self.alpha, self.fc_threshold)
            .with_confidence_level(self.confidence_level)
            .with_normalization(normalization)
            .with_fold_change_basis(self.fold_change_basis.into())
    }

    /// Group assignment from the group file or the column ranges.
    pub fn assignment(&self, matrix: &IntensityMatrix) -> Result<GroupAssignment> {
        match &self.groups {
            Some(path) => read_group_table(path),
            None if !self.ranges.is_empty() => {
                let ranges: Vec<(Range<usize>, &str)> = self
                    .ranges
                    .iter()
                    .map(|r| (r.range.clone(), r.label.as_str()))
                    .collect();
                GroupAssignment::from_ranges(matrix.sample_ids(), &ranges)
            }
            None => bail!("Either --groups or at least one --range is required"),
        }
    }
}

/// `label=start..end` on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRange {
    pub label: String,
    pub range: Range<usize>,
}

impl FromStr for GroupRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (label, span) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected LABEL=START..END, got '{}'", s))?;
        let (start, end) = span
            .split_once("..")
            .ok_or_else(|| anyhow!("Expected START..END after '=', got '{}'", span))?;

        let label = label.trim();
        if label.is_empty() {
            bail!("Group label cannot be empty in '{}'", s);
        }
        let start: usize = start
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid range start '{}'", start))?;
        let end: usize = end
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid range end '{}'", end))?;
        if start >= end {
            bail!("Empty range {}..{} for group '{}'", start, end, label);
        }

        Ok(GroupRange {
            label: label.to_string(),
            range: start..end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TTestType;

    #[test]
    fn test_parse_group_range() {
        let range: GroupRange = "control=0..10".parse().unwrap();
        assert_eq!(range.label, "control");
        assert_eq!(range.range, 0..10);

        assert!("control".parse::<GroupRange>().is_err());
        assert!("control=3".parse::<GroupRange>().is_err());
        assert!("control=5..5".parse::<GroupRange>().is_err());
        assert!("=0..2".parse::<GroupRange>().is_err());
    }

    #[test]
    fn test_parse_contrasts_command() {
        let cli = Cli::try_parse_from([
            "diffex",
            "contrasts",
            "-i",
            "table.tsv",
            "--range",
            "control=0..3",
            "--range",
            "adult=3..6",
            "-c",
            "adult-control",
            "--method",
            "welch",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Contrasts {
                common,
                contrasts,
                method,
            } => {
                assert_eq!(contrasts, vec![Contrast::pairwise("adult", "control")]);
                assert_eq!(method, TestMethod::TTest(TTestType::Welch));
                assert_eq!(common.ranges.len(), 2);
                let config = common.config();
                assert_eq!(config.p_threshold, 0.05);
                assert!(config.normalization.log2);
            }
            Commands::Omnibus { .. } => panic!("expected contrasts"),
        }
    }

    #[test]
    fn test_groups_and_ranges_conflict() {
        let parsed = Cli::try_parse_from([
            "diffex", "omnibus", "-i", "t.tsv", "-g", "g.csv", "--range", "a=0..2",
        ]);
        assert!(parsed.is_err());
    }
}
