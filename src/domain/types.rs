//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during segmentation and fitting
//! - exported to JSON/CSV
//! - reloaded later for audits of a correction run

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::DecorError;
use crate::math::bspline::{BasisScratch, evaluate};

/// Why a segment was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentReason {
    /// Drift exceeded the threshold or reversed past the bin-start value.
    Drift,
    /// The next sample lies beyond a timing gap.
    Gap,
    /// Last segment of the run.
    End,
}

impl SegmentReason {
    pub fn label(self) -> &'static str {
        match self {
            SegmentReason::Drift => "drift",
            SegmentReason::Gap => "gap",
            SegmentReason::End => "end",
        }
    }
}

/// A contiguous index range `[start, end]` (inclusive) of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    pub reason: SegmentReason,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn range(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Which information criterion a decision refers to.
///
/// The labels follow the scoring formulas in `fit::spline::score` exactly,
/// including their unconventional pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Aic,
    Bic,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Aic => write!(f, "AIC"),
            Criterion::Bic => write!(f, "BIC"),
        }
    }
}

/// One of the two contaminating covariates of a bivariate correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CovariateSlot {
    A,
    B,
}

impl CovariateSlot {
    pub fn other(self) -> Self {
        match self {
            CovariateSlot::A => CovariateSlot::B,
            CovariateSlot::B => CovariateSlot::A,
        }
    }

    /// Digit used in diagnostic codes (`1` for A, `2` for B).
    pub fn digit(self) -> u32 {
        match self {
            CovariateSlot::A => 1,
            CovariateSlot::B => 2,
        }
    }

    pub fn from_digit(digit: u32) -> Option<Self> {
        match digit {
            1 => Some(CovariateSlot::A),
            2 => Some(CovariateSlot::B),
            _ => None,
        }
    }
}

/// A fitted spline in `(knots, coefficients, degree)` form.
///
/// `knots` is the full knot vector including boundary knots; there are
/// `knots.len() - degree - 1` coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplineModel {
    pub knots: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub degree: usize,
}

impl SplineModel {
    /// Check the knot/coefficient bookkeeping of a model built elsewhere
    /// (e.g. decoded from a file).
    pub fn validate(&self) -> Result<(), DecorError> {
        if self.degree == 0 {
            return Err(DecorError::invalid_input("spline degree must be >= 1"));
        }
        if self.knots.len() < 2 * (self.degree + 1) {
            return Err(DecorError::invalid_input(format!(
                "spline of degree {} needs at least {} knots, got {}",
                self.degree,
                2 * (self.degree + 1),
                self.knots.len()
            )));
        }
        let expected = self.knots.len() - self.degree - 1;
        if self.coefficients.len() != expected {
            return Err(DecorError::invalid_input(format!(
                "expected {expected} coefficients for {} knots, got {}",
                self.knots.len(),
                self.coefficients.len()
            )));
        }
        if self.knots.windows(2).any(|w| !(w[0] <= w[1])) {
            return Err(DecorError::invalid_input("spline knots must be non-decreasing"));
        }
        Ok(())
    }

    /// Number of knots strictly between the boundary knot groups.
    pub fn interior_knot_count(&self) -> usize {
        self.knots.len().saturating_sub(2 * (self.degree + 1))
    }

    /// Evaluate at a single point.
    pub fn evaluate(&self, x: f64) -> f64 {
        let mut scratch = BasisScratch::new(self.degree);
        evaluate(&self.knots, &self.coefficients, self.degree, x, &mut scratch)
    }

    /// Evaluate at many points, keeping the input order.
    pub fn evaluate_many(&self, xs: &[f64]) -> Vec<f64> {
        let mut scratch = BasisScratch::new(self.degree);
        xs.iter()
            .map(|&x| evaluate(&self.knots, &self.coefficients, self.degree, x, &mut scratch))
            .collect()
    }
}

/// Photometry of one observing run, already cleaned and time-sorted.
///
/// `drift` drives the segmentation (usually the detector temperature); the
/// covariates are what the correction is fitted against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightCurve {
    pub time: Vec<f64>,
    pub flux: Vec<f64>,
    pub drift: Vec<f64>,
    pub covariate_a: Vec<f64>,
    pub covariate_b: Vec<f64>,
    pub names: CovariateNames,
}

/// Human-readable names of the series in a `LightCurve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovariateNames {
    pub drift: String,
    pub a: String,
    pub b: String,
}

impl Default for CovariateNames {
    fn default() -> Self {
        Self {
            drift: "temperature".to_string(),
            a: "xpos".to_string(),
            b: "ypos".to_string(),
        }
    }
}

impl CovariateNames {
    pub fn slot(&self, slot: CovariateSlot) -> &str {
        match slot {
            CovariateSlot::A => &self.a,
            CovariateSlot::B => &self.b,
        }
    }
}

impl LightCurve {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn covariate(&self, slot: CovariateSlot) -> &[f64] {
        match slot {
            CovariateSlot::A => &self.covariate_a,
            CovariateSlot::B => &self.covariate_b,
        }
    }

    /// Check the run-level preconditions: equal lengths, finite values,
    /// strictly increasing time.
    ///
    /// Covariate columns may be empty when the run is only segmented or
    /// corrected against the drift series.
    pub fn validate(&self) -> Result<(), DecorError> {
        validate_time(&self.time)?;
        let n = self.time.len();
        for (name, values, required) in [
            ("flux", &self.flux, true),
            (self.names.drift.as_str(), &self.drift, true),
            (self.names.a.as_str(), &self.covariate_a, false),
            (self.names.b.as_str(), &self.covariate_b, false),
        ] {
            if values.is_empty() && !required {
                continue;
            }
            if values.len() != n {
                return Err(DecorError::invalid_input(format!(
                    "column '{name}' has {} values, time has {n}",
                    values.len()
                )));
            }
            if let Some(i) = values.iter().position(|v| !v.is_finite()) {
                return Err(DecorError::invalid_input(format!(
                    "column '{name}' has a non-finite value at index {i}"
                )));
            }
        }
        Ok(())
    }
}

/// Time stamps must be finite, non-empty and strictly increasing.
pub fn validate_time(time: &[f64]) -> Result<(), DecorError> {
    if time.is_empty() {
        return Err(DecorError::invalid_input("time series is empty"));
    }
    if let Some(i) = time.iter().position(|t| !t.is_finite()) {
        return Err(DecorError::invalid_input(format!("non-finite time at index {i}")));
    }
    if let Some(i) = time.windows(2).position(|w| w[1] <= w[0]) {
        return Err(DecorError::invalid_input(format!(
            "time is not strictly increasing at index {} ({} -> {})",
            i + 1,
            time[i],
            time[i + 1]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_time_rejects_duplicates_and_reversals() {
        assert!(validate_time(&[0.0, 1.0, 2.0]).is_ok());
        assert!(validate_time(&[]).is_err());
        assert!(validate_time(&[0.0, 1.0, 1.0]).is_err());
        let err = validate_time(&[0.0, 2.0, 1.0]).unwrap_err();
        assert!(err.to_string().contains("index 2"));
    }

    #[test]
    fn segment_length_is_inclusive() {
        let s = Segment {
            start: 3,
            end: 7,
            reason: SegmentReason::Drift,
        };
        assert_eq!(s.len(), 5);
        assert_eq!(s.range().count(), 5);
    }

    #[test]
    fn covariate_slots_swap_and_encode() {
        assert_eq!(CovariateSlot::A.other(), CovariateSlot::B);
        assert_eq!(CovariateSlot::from_digit(CovariateSlot::B.digit()), Some(CovariateSlot::B));
        assert_eq!(CovariateSlot::from_digit(3), None);
    }

    #[test]
    fn spline_model_validation_checks_counts() {
        let model = SplineModel {
            knots: vec![0.0, 0.0, 0.5, 1.0, 1.0],
            coefficients: vec![1.0, 2.0, 3.0],
            degree: 1,
        };
        assert!(model.validate().is_ok());
        assert_eq!(model.interior_knot_count(), 1);
        assert!((model.evaluate(0.25) - 1.5).abs() < 1e-12);

        let bad = SplineModel {
            coefficients: vec![1.0],
            ..model
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn light_curve_allows_missing_covariates() {
        let lc = LightCurve {
            time: vec![0.0, 1.0],
            flux: vec![1.0, 2.0],
            drift: vec![10.0, 10.5],
            ..LightCurve::default()
        };
        assert!(lc.validate().is_ok());

        let short = LightCurve {
            covariate_a: vec![0.1],
            ..lc
        };
        assert!(short.validate().is_err());
    }
}
