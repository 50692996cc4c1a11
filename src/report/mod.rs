//! Reporting utilities: run statistics and formatted terminal output.

pub mod format;

pub use format::*;

use crate::app::pipeline::RunOutput;
use crate::domain::LightCurve;
use crate::math::stats::mean;

/// Scatter of a run before and after correction.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub segments: usize,
    pub corrected: usize,
    pub failed: usize,
    /// RMS of the flux about its mean.
    pub rms_before: f64,
    pub rms_after: f64,
    /// RMS of consecutive in-run differences, less sensitive to the star's own variability.
    pub p2p_before: f64,
    pub p2p_after: f64,
}

impl RunStats {
    pub fn from_run(curve: &LightCurve, output: &RunOutput) -> Self {
        let failed = output.failed_count();
        Self {
            segments: output.outcomes.len(),
            corrected: output.outcomes.len() - failed,
            failed,
            rms_before: rms_about_mean(&curve.flux),
            rms_after: rms_about_mean(&output.corrected_flux),
            p2p_before: point_to_point(&curve.flux),
            p2p_after: point_to_point(&output.corrected_flux),
        }
    }
}

fn rms_about_mean(values: &[f64]) -> f64 {
    let Some(m) = mean(values) else {
        return 0.0;
    };
    (values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64).sqrt()
}

fn point_to_point(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum: f64 = values.windows(2).map(|w| (w[1] - w[0]) * (w[1] - w[0])).sum();
    (sum / (values.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_is_zero() {
        assert_eq!(rms_about_mean(&[3.0, 3.0, 3.0]), 0.0);
        assert!((rms_about_mean(&[1.0, -1.0]) - 1.0).abs() < 1e-12);
        assert_eq!(point_to_point(&[5.0]), 0.0);
        assert!((point_to_point(&[0.0, 2.0, 0.0]) - 2.0).abs() < 1e-12);
    }
}
