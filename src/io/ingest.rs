//! CSV ingest of photometric time series.
//!
//! Turns a photometry table into a clean, time-sorted `LightCurve`.
//!
//! Design goals:
//! - **Columns by name** (case-insensitive, BOM-tolerant headers)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior**: rows are stably sorted by time and later
//!   duplicates of a timestamp are dropped
//! - **Separation of concerns**: no segmentation or fitting here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use log::warn;

use crate::domain::{CovariateNames, LightCurve};
use crate::error::DecorError;

/// Names of the columns to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub time: String,
    pub flux: String,
    pub drift: String,
    /// First covariate; `None` for drift-only runs.
    pub a: Option<String>,
    /// Second covariate; `None` for drift-only runs.
    pub b: Option<String>,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        let names = CovariateNames::default();
        Self {
            time: "time".to_string(),
            flux: "flux".to_string(),
            drift: names.drift,
            a: Some(names.a),
            b: Some(names.b),
        }
    }
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Summary stats about the samples actually used.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub n_samples: usize,
    pub t_min: f64,
    pub t_max: f64,
    pub flux_mean: f64,
}

/// Ingest output: clean light curve + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedCurve {
    pub curve: LightCurve,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load a photometry CSV file.
pub fn load_light_curve(path: &Path, columns: &ColumnSpec) -> Result<IngestedCurve, DecorError> {
    let file = File::open(path)
        .map_err(|e| DecorError::io(format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_light_curve(file, columns)
}

/// Parse photometry CSV from any reader.
pub fn read_light_curve<R: Read>(input: R, columns: &ColumnSpec) -> Result<IngestedCurve, DecorError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| DecorError::parse(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let time_idx = require_column(&header_map, &columns.time)?;
    let flux_idx = require_column(&header_map, &columns.flux)?;
    let drift_idx = require_column(&header_map, &columns.drift)?;
    let a_idx = columns.a.as_deref().map(|c| require_column(&header_map, c)).transpose()?;
    let b_idx = columns.b.as_deref().map(|c| require_column(&header_map, c)).transpose()?;

    let mut rows: Vec<(usize, [f64; 5])> = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header, CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let parsed = (|| -> Result<[f64; 5], String> {
            Ok([
                parse_field(&record, time_idx, &columns.time)?,
                parse_field(&record, flux_idx, &columns.flux)?,
                parse_field(&record, drift_idx, &columns.drift)?,
                match a_idx {
                    Some(i) => parse_field(&record, i, columns.a.as_deref().unwrap_or_default())?,
                    None => 0.0,
                },
                match b_idx {
                    Some(i) => parse_field(&record, i, columns.b.as_deref().unwrap_or_default())?,
                    None => 0.0,
                },
            ])
        })();

        match parsed {
            Ok(values) => rows.push((line, values)),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    rows.sort_by(|a, b| a.1[0].total_cmp(&b.1[0]));
    let mut deduped: Vec<[f64; 5]> = Vec::with_capacity(rows.len());
    for (line, values) in rows {
        if deduped.last().is_some_and(|prev| prev[0] == values[0]) {
            row_errors.push(RowError {
                line,
                message: format!("Duplicate timestamp {}", values[0]),
            });
            continue;
        }
        deduped.push(values);
    }

    let rows_used = deduped.len();
    if rows_used == 0 {
        return Err(DecorError::invalid_input("No valid rows remain after parsing."));
    }
    if !row_errors.is_empty() {
        warn!("{} of {rows_read} rows skipped during ingest", row_errors.len());
    }

    let column = |k: usize| -> Vec<f64> { deduped.iter().map(|r| r[k]).collect() };
    let names = CovariateNames {
        drift: columns.drift.clone(),
        a: columns.a.clone().unwrap_or_else(|| CovariateNames::default().a),
        b: columns.b.clone().unwrap_or_else(|| CovariateNames::default().b),
    };
    let curve = LightCurve {
        time: column(0),
        flux: column(1),
        drift: column(2),
        covariate_a: if a_idx.is_some() { column(3) } else { Vec::new() },
        covariate_b: if b_idx.is_some() { column(4) } else { Vec::new() },
        names,
    };
    curve.validate()?;

    let stats = DatasetStats {
        n_samples: rows_used,
        t_min: curve.time[0],
        t_max: curve.time[rows_used - 1],
        flux_mean: curve.flux.iter().sum::<f64>() / rows_used as f64,
    };
    Ok(IngestedCurve {
        curve,
        stats,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Strip a UTF-8 BOM on the first header, otherwise it never matches.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, DecorError> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| DecorError::invalid_input(format!("Missing required column: `{name}`")))
}

fn parse_field(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing `{name}` value."))?;
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("Invalid `{name}` value: {raw:?}"))?;
    if !value.is_finite() {
        return Err(format!("Non-finite `{name}` value."));
    }
    Ok(value)
}
