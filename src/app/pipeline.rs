//! Shared "segment then correct" pipeline used by the CLI subcommands.
//!
//! Keeping the workflow in one place avoids duplicating it between the
//! `segment`, `correct` and `simulate` commands:
//! drift segmentation -> per-segment correction (parallel) -> stitching
//!
//! The commands then only deal with presentation and file output.

use std::ops::RangeInclusive;

use log::{info, warn};
use rayon::prelude::*;

use crate::domain::{CorrectionMode, DecorConfig, LightCurve, Segment};
use crate::error::DecorError;
use crate::fit::{CancelToken, CorrectionResult, correct, correct_single};
use crate::segment::{Segmentation, segment};

/// A segment whose correction succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedSegment {
    pub index: usize,
    pub segment: Segment,
    pub t_start: f64,
    pub t_end: f64,
    pub correction: CorrectionResult,
}

/// A segment left uncorrected because no model could be fitted.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentFailure {
    pub index: usize,
    pub segment: Segment,
    pub t_start: f64,
    pub t_end: f64,
    pub error: DecorError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentOutcome {
    Corrected(CorrectedSegment),
    Failed(SegmentFailure),
}

impl SegmentOutcome {
    pub fn index(&self) -> usize {
        match self {
            SegmentOutcome::Corrected(c) => c.index,
            SegmentOutcome::Failed(f) => f.index,
        }
    }

    pub fn segment(&self) -> Segment {
        match self {
            SegmentOutcome::Corrected(c) => c.segment,
            SegmentOutcome::Failed(f) => f.segment,
        }
    }

    pub fn correction(&self) -> Option<&CorrectionResult> {
        match self {
            SegmentOutcome::Corrected(c) => Some(&c.correction),
            SegmentOutcome::Failed(_) => None,
        }
    }
}

/// All computed outputs of a single `decor correct` run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub segmentation: Segmentation,
    pub outcomes: Vec<SegmentOutcome>,
    /// Stitched correction over the whole run; zero on failed segments.
    pub correction: Vec<f64>,
    pub corrected_flux: Vec<f64>,
}

impl RunOutput {
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SegmentOutcome::Failed(_)))
            .count()
    }
}

/// Segment a light curve on its drift series.
pub fn run_segmentation(curve: &LightCurve, config: &DecorConfig) -> Result<Segmentation, DecorError> {
    curve.validate()?;
    let segmentation = segment(&curve.time, &curve.drift, &config.segment)?;
    info!(
        "segmented {} samples into {} bins ({} warnings)",
        curve.len(),
        segmentation.segments.len(),
        segmentation.warnings.len()
    );
    Ok(segmentation)
}

/// Segment a light curve and correct every segment independently.
///
/// A segment that cannot be fitted is reported and gets a zero correction;
/// cancellation aborts the whole run.
pub fn run_correction(
    curve: &LightCurve,
    config: &DecorConfig,
    cancel: &CancelToken,
) -> Result<RunOutput, DecorError> {
    config.validate()?;
    if config.mode == CorrectionMode::Bivariate
        && (curve.covariate_a.is_empty() || curve.covariate_b.is_empty())
    {
        return Err(DecorError::invalid_input(format!(
            "bivariate correction needs both '{}' and '{}' columns",
            curve.names.a, curve.names.b
        )));
    }

    let segmentation = run_segmentation(curve, config)?;
    cancel.check()?;

    let outcomes = segmentation
        .segments
        .par_iter()
        .enumerate()
        .map(|(index, &seg)| correct_segment(curve, config, cancel, index, seg))
        .collect::<Result<Vec<_>, DecorError>>()?;

    let mut correction = vec![0.0; curve.len()];
    for outcome in &outcomes {
        if let Some(result) = outcome.correction() {
            let range = outcome.segment().range();
            correction[range].copy_from_slice(&result.combined_correction);
        }
    }
    let corrected_flux = curve
        .flux
        .iter()
        .zip(&correction)
        .map(|(f, c)| f - c)
        .collect();

    let output = RunOutput {
        segmentation,
        outcomes,
        correction,
        corrected_flux,
    };
    let failed = output.failed_count();
    if failed > 0 {
        warn!("{failed} of {} segments left uncorrected", output.outcomes.len());
    }
    info!("corrected {} segments", output.outcomes.len() - failed);
    Ok(output)
}

fn correct_segment(
    curve: &LightCurve,
    config: &DecorConfig,
    cancel: &CancelToken,
    index: usize,
    seg: Segment,
) -> Result<SegmentOutcome, DecorError> {
    let range: RangeInclusive<usize> = seg.range();
    let flux = &curve.flux[range.clone()];
    let t_start = curve.time[seg.start];
    let t_end = curve.time[seg.end];

    let result = match config.mode {
        CorrectionMode::Bivariate => correct(
            flux,
            &curve.covariate_a[range.clone()],
            &curve.covariate_b[range],
            &config.search,
            &curve.names,
            cancel,
        ),
        CorrectionMode::Univariate => correct_single(
            flux,
            &curve.drift[range],
            &curve.names.drift,
            &config.search,
            cancel,
        ),
    };

    match result {
        Ok(correction) => Ok(SegmentOutcome::Corrected(CorrectedSegment {
            index,
            segment: seg,
            t_start,
            t_end,
            correction,
        })),
        Err(err @ DecorError::Cancelled(_)) => Err(err),
        Err(error) => {
            warn!("segment {index} [{}..={}]: {error}", seg.start, seg.end);
            Ok(SegmentOutcome::Failed(SegmentFailure {
                index,
                segment: seg,
                t_start,
                t_end,
                error,
            }))
        }
    }
}
