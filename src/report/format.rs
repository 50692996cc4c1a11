//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting and segmentation code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::{RunOutput, SegmentOutcome};
use crate::domain::{CorrectionMode, DecorConfig, LightCurve};
use crate::fit::SelectedModel;
use crate::io::{ModelFile, SegmentStatus};
use crate::report::RunStats;
use crate::segment::{SegmentWarning, Segmentation};

/// Table of segment boundaries with their reasons and drift change.
pub fn format_segment_table(curve: &LightCurve, segmentation: &Segmentation) -> String {
    let mut out = String::new();
    out.push_str(&format!("Segments: {}\n", segmentation.segments.len()));
    out.push_str("   #    start      end        t_start        t_end  reason   d_drift\n");
    for (i, s) in segmentation.segments.iter().enumerate() {
        let d_drift = segmentation.drift_long[s.end] - segmentation.drift_long[s.start];
        out.push_str(&format!(
            "{:>4} {:>8} {:>8} {:>14.6} {:>12.6}  {:<6} {:>+9.3}\n",
            i,
            s.start,
            s.end,
            curve.time[s.start],
            curve.time[s.end],
            s.reason.label(),
            d_drift,
        ));
    }
    if !segmentation.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for w in &segmentation.warnings {
            out.push_str(&format!("  - {}\n", describe_warning(w)));
        }
    }
    out
}

/// Full run summary: configuration, per-segment models, scatter before/after.
pub fn format_run_summary(curve: &LightCurve, config: &DecorConfig, output: &RunOutput, stats: &RunStats) -> String {
    let mut out = String::new();

    out.push_str("=== decor - photometric detrending ===\n");
    out.push_str(&format!(
        "Samples: n={} | time=[{:.5}, {:.5}]\n",
        curve.len(),
        curve.time.first().copied().unwrap_or(0.0),
        curve.time.last().copied().unwrap_or(0.0),
    ));
    let mode = match config.mode {
        CorrectionMode::Bivariate => format!("bivariate ({}, {})", curve.names.a, curve.names.b),
        CorrectionMode::Univariate => format!("univariate ({})", curve.names.drift),
    };
    out.push_str(&format!("Mode: {mode}\n"));
    out.push_str(&format!(
        "Grid: spacings={:?} | phase_step={} | orders={:?}{}\n",
        config.search.spacings,
        config.search.phase_step,
        config.search.orders,
        if config.search.periodic { " | periodic" } else { "" },
    ));

    out.push_str("\nSegments:\n");
    out.push_str("   #  samples  reason    code   models\n");
    for outcome in &output.outcomes {
        let seg = outcome.segment();
        match outcome {
            SegmentOutcome::Corrected(c) => {
                let mut models = describe_stage(&c.correction.first.selected);
                if let Some(second) = &c.correction.second {
                    models.push_str(" + ");
                    models.push_str(&describe_stage(&second.selected));
                }
                out.push_str(&format!(
                    "{:>4} {:>8}  {:<6} {:>7}   {}\n",
                    c.index,
                    seg.len(),
                    seg.reason.label(),
                    c.correction.diagnostic_code.0,
                    models,
                ));
            }
            SegmentOutcome::Failed(f) => {
                out.push_str(&format!(
                    "{:>4} {:>8}  {:<6} {:>7}   FAILED: {}\n",
                    f.index,
                    seg.len(),
                    seg.reason.label(),
                    "-",
                    f.error,
                ));
            }
        }
    }

    out.push_str(&format!(
        "\nCorrected: {}/{} segments",
        stats.corrected, stats.segments
    ));
    if stats.failed > 0 {
        out.push_str(&format!(" ({} left uncorrected)", stats.failed));
    }
    out.push('\n');
    out.push_str(&format!(
        "Scatter: rms {:.4} -> {:.4} | point-to-point {:.4} -> {:.4}\n",
        stats.rms_before, stats.rms_after, stats.p2p_before, stats.p2p_after
    ));
    out
}

/// Segments and stored spline models of a model file.
pub fn format_model_file(model: &ModelFile) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Model file v{} ({}), created {}\n",
        model.format_version,
        model.tool,
        model.created_at.to_rfc3339()
    ));
    out.push_str(&format!(
        "Samples: n={} | mode={:?} | covariates: {}, {} | drift: {}\n",
        model.n_samples, model.config.mode, model.names.a, model.names.b, model.names.drift
    ));
    out.push_str("   #    start      end        t_start        t_end  status        code\n");
    for r in &model.segments {
        let status = match r.status {
            SegmentStatus::Corrected => "corrected",
            SegmentStatus::Failed => "failed",
        };
        let code = r.diagnostic_code.map_or_else(|| "-".to_string(), |c| c.0.to_string());
        out.push_str(&format!(
            "{:>4} {:>8} {:>8} {:>14.6} {:>12.6}  {:<9} {:>8}\n",
            r.index, r.segment.start, r.segment.end, r.t_start, r.t_end, status, code
        ));
        for stage in &r.stages {
            out.push_str(&format!(
                "       {}[s={}, p={:.3}, k={}] {:?}{}\n",
                stage.covariate,
                stage.knot_spacing,
                stage.phase_shift,
                stage.order,
                stage.decision,
                if stage.widened { " (widened)" } else { "" }
            ));
        }
        if let Some(err) = &r.error {
            out.push_str(&format!("       error: {err}\n"));
        }
    }
    out
}

fn describe_stage(selected: &SelectedModel) -> String {
    format!(
        "{}[s={}, p={:.3}, k={}]",
        selected.covariate, selected.knot_spacing, selected.phase_shift, selected.order
    )
}

fn describe_warning(warning: &SegmentWarning) -> String {
    match warning {
        SegmentWarning::ShortBin { segment, length } => {
            format!("segment {segment} spans only {length:.3}")
        }
        SegmentWarning::InteriorMaximum { index } => {
            format!("long-term drift peaks inside the run (index {index})")
        }
        SegmentWarning::InteriorMinimum { index } => {
            format!("long-term drift bottoms out inside the run (index {index})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CovariateNames, CovariateSlot, Segment, SegmentReason, SplineModel};
    use crate::fit::{Decision, DiagnosticCode};
    use crate::io::{MODEL_FORMAT_VERSION, SegmentRecord, StageRecord};
    use chrono::{TimeZone, Utc};

    #[test]
    fn model_file_summary_lists_stages_and_failures() {
        let stage = StageRecord {
            covariate: "xpos".to_string(),
            slot: CovariateSlot::A,
            knot_spacing: 0.5,
            phase_shift: 0.02,
            order: 3,
            aic: 10.0,
            bic: 12.0,
            likelihood: 3.0,
            decision: Decision::Agreed,
            widened: true,
            model: SplineModel {
                knots: vec![0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0],
                coefficients: vec![0.0; 5],
                degree: 3,
            },
        };
        let model = ModelFile {
            format_version: MODEL_FORMAT_VERSION,
            tool: "decor".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            config: DecorConfig::default(),
            names: CovariateNames::default(),
            n_samples: 20,
            segments: vec![
                SegmentRecord {
                    index: 0,
                    segment: Segment {
                        start: 0,
                        end: 9,
                        reason: SegmentReason::Drift,
                    },
                    t_start: 0.0,
                    t_end: 0.9,
                    status: SegmentStatus::Corrected,
                    diagnostic_code: Some(DiagnosticCode(100_200)),
                    flux_mean: Some(1000.0),
                    stages: vec![stage],
                    error: None,
                },
                SegmentRecord {
                    index: 1,
                    segment: Segment {
                        start: 10,
                        end: 19,
                        reason: SegmentReason::End,
                    },
                    t_start: 1.0,
                    t_end: 1.9,
                    status: SegmentStatus::Failed,
                    diagnostic_code: None,
                    flux_mean: None,
                    stages: Vec::new(),
                    error: Some("no valid model".to_string()),
                },
            ],
        };
        let text = format_model_file(&model);
        assert!(text.starts_with("Model file v1 (decor), created 2024-03-01T12:00:00+00:00\n"));
        assert!(text.contains("100200"));
        assert!(text.contains("xpos[s=0.5, p=0.020, k=3] Agreed (widened)"));
        assert!(text.contains("failed"));
        assert!(text.contains("error: no valid model"));
    }

    #[test]
    fn segment_table_lists_every_segment() {
        let curve = LightCurve {
            time: vec![0.0, 1.0, 2.0, 3.0],
            flux: vec![1.0; 4],
            drift: vec![0.0, 1.0, 2.0, 3.0],
            ..LightCurve::default()
        };
        let segmentation = Segmentation {
            segments: vec![
                Segment {
                    start: 0,
                    end: 1,
                    reason: SegmentReason::Drift,
                },
                Segment {
                    start: 2,
                    end: 3,
                    reason: SegmentReason::End,
                },
            ],
            drift_long: curve.drift.clone(),
            warnings: vec![SegmentWarning::ShortBin {
                segment: 1,
                length: 1.0,
            }],
        };
        let text = format_segment_table(&curve, &segmentation);
        assert!(text.starts_with("Segments: 2\n"));
        assert!(text.contains("drift"));
        assert!(text.contains("end"));
        assert!(text.contains("segment 1 spans only 1.000"));
    }
}
