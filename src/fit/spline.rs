//! Least-squares spline fits on explicit knots and their information scores.
//!
//! A fit solves `min Σ (y_i − Σ_j c_j B_j(x_i))²` over the B-spline basis of
//! a clamped (or periodic) knot vector built around the given interior knots.
//! Failures are returned as `DegenerateFit` so grid searches can record them
//! per cell instead of aborting.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::SplineModel;
use crate::math::bspline::{BasisScratch, basis_funs, clamped_knots, find_span, periodic_knots, schoenberg_whitney};
use crate::math::solve_least_squares;

/// Why a single spline fit could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateFit {
    /// The knot layout for this spacing is empty.
    NoInteriorKnots,
    /// An interior knot lies on or outside the data span.
    KnotOutsideSpan,
    /// Interior knots are not strictly increasing.
    KnotsNotIncreasing,
    /// Too few distinct samples between knots (Schoenberg–Whitney).
    TooFewPoints,
    /// The design matrix is rank deficient.
    Singular,
    /// Input or solution contained NaN/inf.
    NonFinite,
    /// A periodic spline needs at least `degree − 1` interior knots.
    PeriodicTooFewKnots,
}

impl fmt::Display for DegenerateFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            DegenerateFit::NoInteriorKnots => "no interior knots",
            DegenerateFit::KnotOutsideSpan => "knot outside data span",
            DegenerateFit::KnotsNotIncreasing => "knots not increasing",
            DegenerateFit::TooFewPoints => "too few points between knots",
            DegenerateFit::Singular => "singular design",
            DegenerateFit::NonFinite => "non-finite values",
            DegenerateFit::PeriodicTooFewKnots => "too few knots for a periodic spline",
        };
        write!(f, "{msg}")
    }
}

/// Fit a spline of `degree` to `(x, y)` with the given interior knots.
///
/// `x` must be sorted ascending (ties allowed). With `periodic` the spline and
/// its first `degree − 1` derivatives wrap around `[min(x), max(x)]`.
pub fn fit_spline(
    x: &[f64],
    y: &[f64],
    interior: &[f64],
    degree: usize,
    periodic: bool,
) -> Result<SplineModel, DegenerateFit> {
    if x.len() != y.len() || x.is_empty() || degree == 0 {
        return Err(DegenerateFit::TooFewPoints);
    }
    if x.iter().chain(y).chain(interior).any(|v| !v.is_finite()) {
        return Err(DegenerateFit::NonFinite);
    }
    if interior.is_empty() {
        return Err(DegenerateFit::NoInteriorKnots);
    }

    let x_min = x[0];
    let x_max = x[x.len() - 1];
    if interior.iter().any(|&k| k <= x_min || k >= x_max) {
        return Err(DegenerateFit::KnotOutsideSpan);
    }
    if interior.windows(2).any(|w| w[1] <= w[0]) {
        return Err(DegenerateFit::KnotsNotIncreasing);
    }

    if periodic {
        fit_periodic(x, y, interior, degree, x_min, x_max)
    } else {
        fit_clamped(x, y, interior, degree, x_min, x_max)
    }
}

fn fit_clamped(
    x: &[f64],
    y: &[f64],
    interior: &[f64],
    degree: usize,
    x_min: f64,
    x_max: f64,
) -> Result<SplineModel, DegenerateFit> {
    let knots = clamped_knots(x_min, x_max, interior, degree);
    if !schoenberg_whitney(x, &knots, degree) {
        return Err(DegenerateFit::TooFewPoints);
    }
    let n_coef = knots.len() - degree - 1;
    let design = design_matrix(x, &knots, degree, n_coef, n_coef);
    let coefficients = solve(design, y)?;
    Ok(SplineModel {
        knots,
        coefficients,
        degree,
    })
}

fn fit_periodic(
    x: &[f64],
    y: &[f64],
    interior: &[f64],
    degree: usize,
    x_min: f64,
    x_max: f64,
) -> Result<SplineModel, DegenerateFit> {
    let knots = periodic_knots(x_min, x_max, interior, degree).ok_or(DegenerateFit::PeriodicTooFewKnots)?;
    let n_coef = knots.len() - degree - 1;
    // The last `degree` coefficients repeat the first ones.
    let n_free = n_coef - degree;
    if x.len() < n_free {
        return Err(DegenerateFit::TooFewPoints);
    }
    let design = design_matrix(x, &knots, degree, n_coef, n_free);
    let free = solve(design, y)?;
    let coefficients = (0..n_coef).map(|j| free[j % n_free]).collect();
    Ok(SplineModel {
        knots,
        coefficients,
        degree,
    })
}

/// Dense design matrix; basis column `j` is accumulated into `j % n_cols`.
fn design_matrix(x: &[f64], knots: &[f64], degree: usize, n_coef: usize, n_cols: usize) -> DMatrix<f64> {
    let mut design = DMatrix::zeros(x.len(), n_cols);
    let mut scratch = BasisScratch::new(degree);
    for (row, &xi) in x.iter().enumerate() {
        let span = find_span(knots, degree, n_coef, xi);
        basis_funs(knots, degree, span, xi, &mut scratch);
        let offset = span - degree;
        for (j, b) in scratch.values().iter().enumerate() {
            design[(row, (offset + j) % n_cols)] += b;
        }
    }
    design
}

fn solve(design: DMatrix<f64>, y: &[f64]) -> Result<Vec<f64>, DegenerateFit> {
    let rhs = DVector::from_column_slice(y);
    let beta = solve_least_squares(&design, &rhs).ok_or(DegenerateFit::Singular)?;
    if beta.iter().any(|v| !v.is_finite()) {
        return Err(DegenerateFit::NonFinite);
    }
    Ok(beta.iter().copied().collect())
}

/// Goodness of fit of one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InformationScores {
    pub aic: f64,
    pub bic: f64,
    pub likelihood: f64,
    /// `false` when the likelihood was non-positive or non-finite and both
    /// scores were replaced by the sentinel.
    pub defined: bool,
}

/// Parameter count used when the caller gives none:
/// `(interior + 1) · (degree + 1)`.
pub fn estimated_params(interior_knots: usize, degree: usize) -> usize {
    (interior_knots + 1) * (degree + 1)
}

/// Score `model` against `(x, y)`.
///
/// The likelihood is `L = Σ ln|f(x_i)| + |y_i / f(x_i)|`, tolerant of sign
/// changes in the flux. With `k` estimated parameters and `n` samples:
///
/// ```text
/// aic = k·ln(n) + n·ln(L)
/// bic = 2k      + n·ln(L)
/// ```
///
/// Undefined scores (`L ≤ 0`, NaN, inf) are replaced by `sentinel`.
pub fn score(x: &[f64], y: &[f64], model: &SplineModel, estimated: Option<usize>, sentinel: f64) -> InformationScores {
    let k = estimated.unwrap_or_else(|| estimated_params(model.interior_knot_count(), model.degree)) as f64;
    let fitted = model.evaluate_many(x);
    let likelihood: f64 = fitted
        .iter()
        .zip(y)
        .map(|(f, yi)| f.abs().ln() + (yi / f).abs())
        .sum();

    let n = x.len() as f64;
    if !(likelihood.is_finite() && likelihood > 0.0) || x.is_empty() {
        return InformationScores {
            aic: sentinel,
            bic: sentinel,
            likelihood: if likelihood.is_finite() { likelihood } else { 0.0 },
            defined: false,
        };
    }

    let log_l = likelihood.ln();
    let aic = k * n.ln() + n * log_l;
    let bic = 2.0 * k + n * log_l;
    if !(aic.is_finite() && bic.is_finite()) {
        return InformationScores {
            aic: sentinel,
            bic: sentinel,
            likelihood,
            defined: false,
        };
    }
    InformationScores {
        aic,
        bic,
        likelihood,
        defined: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize, lo: f64, hi: f64) -> Vec<f64> {
        (0..n).map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64).collect()
    }

    #[test]
    fn cubic_fit_reproduces_a_cubic() {
        let x = grid(200, 0.0, 4.0);
        let y: Vec<f64> = x.iter().map(|v| 1.0 + v - 0.5 * v * v + 0.1 * v * v * v).collect();
        let model = fit_spline(&x, &y, &[1.0, 2.0, 3.0], 3, false).unwrap();
        assert_eq!(model.interior_knot_count(), 3);
        assert_eq!(model.coefficients.len(), model.knots.len() - 4);
        for (xi, yi) in x.iter().zip(&y) {
            assert!((model.evaluate(*xi) - yi).abs() < 1e-8);
        }
    }

    #[test]
    fn knot_on_the_boundary_is_degenerate() {
        let x = grid(50, 0.0, 1.0);
        let y = vec![1.0; 50];
        assert_eq!(fit_spline(&x, &y, &[0.0, 0.5], 3, false), Err(DegenerateFit::KnotOutsideSpan));
        assert_eq!(fit_spline(&x, &y, &[0.6, 0.5], 3, false), Err(DegenerateFit::KnotsNotIncreasing));
        assert_eq!(fit_spline(&x, &y, &[], 3, false), Err(DegenerateFit::NoInteriorKnots));
    }

    #[test]
    fn empty_knot_interval_is_degenerate() {
        // No samples between 0.4 and 0.6 besides the knots' neighbours.
        let mut x = grid(20, 0.0, 0.3);
        x.extend(grid(20, 0.7, 1.0));
        let y = vec![2.0; x.len()];
        let res = fit_spline(&x, &y, &[0.4, 0.45, 0.5, 0.55, 0.6], 3, false);
        assert_eq!(res, Err(DegenerateFit::TooFewPoints));
    }

    #[test]
    fn periodic_fit_wraps_around() {
        let x = grid(400, 0.0, 1.0);
        let y: Vec<f64> = x.iter().map(|v| (2.0 * std::f64::consts::PI * v).sin() + 3.0).collect();
        let interior = grid(9, 0.1, 0.9);
        let model = fit_spline(&x, &y, &interior, 3, true).unwrap();
        let n = model.coefficients.len();
        assert_eq!(&model.coefficients[..3], &model.coefficients[n - 3..]);
        assert!((model.evaluate(0.0) - model.evaluate(1.0)).abs() < 1e-9);
        assert!((model.evaluate(0.25) - 4.0).abs() < 1e-2);
    }

    #[test]
    fn periodic_fit_needs_enough_knots() {
        let x = grid(40, 0.0, 1.0);
        let y = vec![1.0; 40];
        assert_eq!(fit_spline(&x, &y, &[0.5], 3, true), Err(DegenerateFit::PeriodicTooFewKnots));
    }

    #[test]
    fn scores_follow_the_documented_formulas() {
        let x = grid(100, 0.0, 2.0);
        let y: Vec<f64> = x.iter().map(|v| 10.0 + v).collect();
        let model = fit_spline(&x, &y, &[0.5, 1.0, 1.5], 3, false).unwrap();
        let s = score(&x, &y, &model, None, 1e75);
        assert!(s.defined);

        let l: f64 = y.iter().map(|yi| yi.ln() + 1.0).sum();
        assert!((s.likelihood - l).abs() < 1e-6);
        let k = estimated_params(3, 3) as f64;
        assert_eq!(k, 16.0);
        let n = 100.0_f64;
        assert!((s.aic - (k * n.ln() + n * l.ln())).abs() < 1e-6);
        assert!((s.bic - (2.0 * k + n * l.ln())).abs() < 1e-6);
    }

    #[test]
    fn undefined_likelihood_maps_to_sentinel() {
        // A spline that is zero everywhere has ln|f| = -inf.
        let model = SplineModel {
            knots: vec![0.0, 0.0, 1.0, 1.0],
            coefficients: vec![0.0, 0.0],
            degree: 1,
        };
        let x = grid(10, 0.0, 1.0);
        let y = vec![1.0; 10];
        let s = score(&x, &y, &model, Some(4), 1e75);
        assert!(!s.defined);
        assert_eq!(s.aic, 1e75);
        assert_eq!(s.bic, 1e75);
        assert!(!s.likelihood.is_nan());
    }
}
