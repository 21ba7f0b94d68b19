//! Delimited-text adapters: the intensity table and group file in, result tables out.
//!
//! Input tables are tab- or comma-separated, detected from the header line. Output is always
//! tab-separated.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};

use crate::data::{GroupAssignment, IntensityMatrix};
use crate::engine::{FeatureStatus, OmnibusReport, ResultTable};

fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    if header.contains('\t') { b'\t' } else { b',' }
}

fn records(text: &str) -> Result<(StringRecord, Vec<StringRecord>)> {
    let mut reader = ReaderBuilder::new()
        .delimiter(detect_delimiter(text))
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let header = reader.headers().context("Failed to read header row")?.clone();
    let rows = reader
        .records()
        .enumerate()
        .map(|(i, record)| record.with_context(|| format!("Malformed row {}", i + 2)))
        .collect::<Result<Vec<_>>>()?;
    Ok((header, rows))
}

/// Read a features x samples intensity table.
///
/// The header holds the sample ids (its first cell is ignored), the first column the feature
/// ids and every other cell a number.
pub fn read_intensity_table<P: AsRef<Path>>(path: P) -> Result<IntensityMatrix> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read intensity table {}", path.display()))?;
    parse_intensity_table(&text)
        .with_context(|| format!("Invalid intensity table {}", path.display()))
}

pub fn parse_intensity_table(text: &str) -> Result<IntensityMatrix> {
    let (header, rows) = records(text)?;
    if header.len() < 2 {
        bail!("Header needs a feature column and at least one sample column");
    }
    let sample_ids: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

    let mut feature_ids = Vec::with_capacity(rows.len());
    let mut values = Vec::with_capacity(rows.len());
    for row in &rows {
        let feature = row.get(0).unwrap_or_default().to_string();
        let parsed = row
            .iter()
            .skip(1)
            .zip(&sample_ids)
            .map(|(cell, sample)| {
                if cell.is_empty() {
                    return Err(anyhow!(
                        "Missing value for feature '{}' in sample '{}'",
                        feature,
                        sample
                    ));
                }
                cell.parse::<f64>().map_err(|_| {
                    anyhow!(
                        "Non-numeric value '{}' for feature '{}' in sample '{}'",
                        cell,
                        feature,
                        sample
                    )
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        feature_ids.push(feature);
        values.push(parsed);
    }

    if feature_ids.is_empty() {
        bail!("No features found");
    }
    IntensityMatrix::from_rows(values, feature_ids, sample_ids)
}

/// Read a two-column `sample,group` file with a header row.
pub fn read_group_table<P: AsRef<Path>>(path: P) -> Result<GroupAssignment> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read group file {}", path.display()))?;
    parse_group_table(&text).with_context(|| format!("Invalid group file {}", path.display()))
}

pub fn parse_group_table(text: &str) -> Result<GroupAssignment> {
    let (header, rows) = records(text)?;
    if header.len() != 2 {
        bail!("Expected 2 columns (sample, group), found {}", header.len());
    }

    let pairs: Vec<(String, String)> = rows
        .iter()
        .map(|row| (row[0].to_string(), row[1].to_string()))
        .collect();
    if let Some((sample, _)) = pairs.iter().find(|(s, g)| s.is_empty() || g.is_empty()) {
        bail!("Empty sample or group in group file (sample '{}')", sample);
    }
    GroupAssignment::from_pairs(pairs)
}

/// Write one result table as TSV.
///
/// Columns: `feature_id`, one `mean_<group>` per group, `effect`, `statistic`, `p_value`,
/// `adjusted_p_value`, `differential`, `status`, `reason`.
pub fn write_result_table<W: Write>(writer: W, table: &ResultTable) -> Result<()> {
    let mut wtr = WriterBuilder::new().delimiter(b'\t').from_writer(writer);

    let mut header = vec!["feature_id".to_string()];
    header.extend(table.group_labels.iter().map(|label| format!("mean_{label}")));
    header.extend(
        [
            "effect",
            "statistic",
            "p_value",
            "adjusted_p_value",
            "differential",
            "status",
            "reason",
        ]
        .map(str::to_string),
    );
    wtr.write_record(&header)?;

    for record in &table.records {
        let mut row = vec![record.feature_id.clone()];
        row.extend(record.group_means.iter().map(f64::to_string));
        row.push(record.effect.to_string());
        match &record.status {
            FeatureStatus::Tested {
                result,
                adjusted_p_value,
                decision,
            } => {
                row.push(result.statistic.to_string());
                row.push(result.p_value.to_string());
                row.push(adjusted_p_value.to_string());
                row.push(decision.is_differential().to_string());
                row.push("tested".to_string());
                row.push(String::new());
            }
            FeatureStatus::Failed(failure) => {
                row.extend([String::new(), String::new(), String::new()]);
                row.push(false.to_string());
                row.push(failure.code().to_string());
                row.push(failure.reason().to_string());
            }
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

const POST_HOC_COLUMNS: [&str; 7] = [
    "feature_id",
    "comparison",
    "difference",
    "lower",
    "upper",
    "adjusted_p_value",
    "significant",
];

/// Write the Tukey comparisons of every differential omnibus feature as TSV.
///
/// The header is written even when no feature reached the post-hoc stage.
pub fn write_post_hoc<W: Write>(writer: W, report: &OmnibusReport) -> Result<()> {
    let mut wtr = WriterBuilder::new().delimiter(b'\t').from_writer(writer);
    wtr.write_record(POST_HOC_COLUMNS)?;

    for result in &report.post_hoc {
        for comparison in &result.comparisons {
            wtr.write_record([
                result.feature_id.clone(),
                comparison.label(),
                comparison.difference.to_string(),
                comparison.lower.to_string(),
                comparison.upper.to_string(),
                comparison.adjusted_p_value.to_string(),
                comparison.significant.to_string(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
