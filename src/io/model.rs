//! Read/write model files.
//!
//! A model file is the portable record of a correction run:
//! - the configuration it ran with
//! - every segment's boundaries, status and diagnostic code
//! - the spline models selected in each stage
//!
//! Single spline models also have a compact one-line text form:
//!
//! ```text
//! SPLINE/1 k=3 t[8]=0.0,0.0,0.0,0.0,1.0,1.0,1.0,1.0 c[4]=1.5,-2.0,0.25,3.0
//! ```
//!
//! Values are written with Rust's shortest round-trip float formatting, so
//! decoding gives back the exact same `f64`s.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::pipeline::{RunOutput, SegmentOutcome};
use crate::domain::{CovariateNames, CovariateSlot, DecorConfig, Segment, SplineModel};
use crate::error::DecorError;
use crate::fit::{Decision, DiagnosticCode, StageResult};

pub const MODEL_FORMAT_VERSION: u32 = 1;

const SPLINE_TAG: &str = "SPLINE/1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub format_version: u32,
    pub tool: String,
    pub created_at: DateTime<Utc>,
    pub config: DecorConfig,
    pub names: CovariateNames,
    pub n_samples: usize,
    pub segments: Vec<SegmentRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    Corrected,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub index: usize,
    pub segment: Segment,
    pub t_start: f64,
    pub t_end: f64,
    pub status: SegmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_code: Option<DiagnosticCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flux_mean: Option<f64>,
    #[serde(default)]
    pub stages: Vec<StageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub covariate: String,
    pub slot: CovariateSlot,
    pub knot_spacing: f64,
    pub phase_shift: f64,
    pub order: usize,
    pub aic: f64,
    pub bic: f64,
    pub likelihood: f64,
    pub decision: Decision,
    pub widened: bool,
    pub model: SplineModel,
}

impl StageRecord {
    fn from_stage(stage: &StageResult) -> Self {
        let s = &stage.selected;
        Self {
            covariate: s.covariate.clone(),
            slot: s.slot,
            knot_spacing: s.knot_spacing,
            phase_shift: s.phase_shift,
            order: s.order,
            aic: s.aic,
            bic: s.bic,
            likelihood: s.likelihood,
            decision: s.decision,
            widened: stage.widened,
            model: s.model.clone(),
        }
    }
}

impl ModelFile {
    pub fn from_run(
        config: &DecorConfig,
        names: &CovariateNames,
        n_samples: usize,
        output: &RunOutput,
        created_at: DateTime<Utc>,
    ) -> Self {
        let segments = output
            .outcomes
            .iter()
            .map(|outcome| match outcome {
                SegmentOutcome::Corrected(c) => SegmentRecord {
                    index: c.index,
                    segment: c.segment,
                    t_start: c.t_start,
                    t_end: c.t_end,
                    status: SegmentStatus::Corrected,
                    diagnostic_code: Some(c.correction.diagnostic_code),
                    flux_mean: Some(c.correction.flux_mean),
                    stages: std::iter::once(&c.correction.first)
                        .chain(c.correction.second.as_ref())
                        .map(StageRecord::from_stage)
                        .collect(),
                    error: None,
                },
                SegmentOutcome::Failed(f) => SegmentRecord {
                    index: f.index,
                    segment: f.segment,
                    t_start: f.t_start,
                    t_end: f.t_end,
                    status: SegmentStatus::Failed,
                    diagnostic_code: None,
                    flux_mean: None,
                    stages: Vec::new(),
                    error: Some(f.error.to_string()),
                },
            })
            .collect();

        Self {
            format_version: MODEL_FORMAT_VERSION,
            tool: "decor".to_string(),
            created_at,
            config: config.clone(),
            names: names.clone(),
            n_samples,
            segments,
        }
    }

    /// Check version and the bookkeeping of every stored spline.
    pub fn validate(&self) -> Result<(), DecorError> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(DecorError::parse(format!(
                "unsupported model file version {} (expected {MODEL_FORMAT_VERSION})",
                self.format_version
            )));
        }
        for record in &self.segments {
            for stage in &record.stages {
                stage
                    .model
                    .validate()
                    .map_err(|e| DecorError::parse(format!("segment {}: {e}", record.index)))?;
            }
        }
        Ok(())
    }
}

/// Write a model file as pretty JSON.
pub fn write_model_json(path: &Path, model: &ModelFile) -> Result<(), DecorError> {
    let file = File::create(path)
        .map_err(|e| DecorError::io(format!("Failed to create model JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, model)
        .map_err(|e| DecorError::io(format!("Failed to write model JSON: {e}")))?;
    Ok(())
}

/// Read and validate a model file.
pub fn read_model_json(path: &Path) -> Result<ModelFile, DecorError> {
    let file = File::open(path)
        .map_err(|e| DecorError::io(format!("Failed to open model JSON '{}': {e}", path.display())))?;
    parse_model_json(file)
}

pub fn parse_model_json<R: Read>(input: R) -> Result<ModelFile, DecorError> {
    let model: ModelFile =
        serde_json::from_reader(input).map_err(|e| DecorError::parse(format!("Invalid model JSON: {e}")))?;
    model.validate()?;
    Ok(model)
}

/// Encode one spline in the `SPLINE/1` text form.
pub fn format_spline(model: &SplineModel) -> String {
    format!(
        "{SPLINE_TAG} k={} t[{}]={} c[{}]={}",
        model.degree,
        model.knots.len(),
        join_values(&model.knots),
        model.coefficients.len(),
        join_values(&model.coefficients)
    )
}

/// Decode a `SPLINE/1` record.
pub fn parse_spline(text: &str) -> Result<SplineModel, DecorError> {
    let mut fields = text.split_whitespace();
    match fields.next() {
        Some(SPLINE_TAG) => {}
        Some(other) => return Err(DecorError::parse(format!("unknown spline record tag {other:?}"))),
        None => return Err(DecorError::parse("empty spline record")),
    }

    let degree = fields
        .next()
        .and_then(|f| f.strip_prefix("k="))
        .ok_or_else(|| DecorError::parse("spline record is missing `k=`"))?;
    let degree: usize = degree
        .parse()
        .map_err(|_| DecorError::parse(format!("invalid spline degree {degree:?}")))?;

    let knots = parse_counted(fields.next(), "t")?;
    let coefficients = parse_counted(fields.next(), "c")?;
    if let Some(extra) = fields.next() {
        return Err(DecorError::parse(format!("trailing field in spline record: {extra:?}")));
    }

    let model = SplineModel {
        knots,
        coefficients,
        degree,
    };
    model.validate().map_err(|e| DecorError::parse(e.to_string()))?;
    Ok(model)
}

fn join_values(values: &[f64]) -> String {
    values.iter().map(|v| format!("{v:?}")).collect::<Vec<_>>().join(",")
}

/// Parse `<name>[<count>]=v1,v2,...` and check the count.
fn parse_counted(field: Option<&str>, name: &str) -> Result<Vec<f64>, DecorError> {
    let field = field.ok_or_else(|| DecorError::parse(format!("spline record is missing `{name}[..]=`")))?;
    let rest = field
        .strip_prefix(name)
        .and_then(|r| r.strip_prefix('['))
        .ok_or_else(|| DecorError::parse(format!("expected `{name}[..]=`, got {field:?}")))?;
    let (count, values) = rest
        .split_once("]=")
        .ok_or_else(|| DecorError::parse(format!("malformed field {field:?}")))?;
    let count: usize = count
        .parse()
        .map_err(|_| DecorError::parse(format!("invalid count in {field:?}")))?;

    let values: Vec<f64> = if values.is_empty() {
        Vec::new()
    } else {
        values
            .split(',')
            .map(|v| {
                v.parse::<f64>()
                    .ok()
                    .filter(|x| x.is_finite())
                    .ok_or_else(|| DecorError::parse(format!("invalid value {v:?} in `{name}`")))
            })
            .collect::<Result<_, _>>()?
    };
    if values.len() != count {
        return Err(DecorError::parse(format!(
            "`{name}` declares {count} values but has {}",
            values.len()
        )));
    }
    Ok(values)
}
