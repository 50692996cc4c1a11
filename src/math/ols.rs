//! Least squares solver for the spline design matrices.
//!
//! Each grid cell solves one problem of the form:
//!
//! ```text
//! minimize Σ (y_i - B(x_i)^T c)^2
//! ```
//!
//! where `B(x_i)` is the row of B-spline basis values at `x_i`.
//!
//! Implementation choices:
//! - SVD, because the design matrix is tall (many samples, a handful of
//!   coefficients) and nalgebra's `QR::solve` only handles square systems.
//! - A numerical rank check before solving. A rank-deficient design means
//!   some basis function has no support in the data, which makes the fit
//!   degenerate rather than merely ill-conditioned.

use nalgebra::{DMatrix, DVector};

/// Singular values below `max_sv * RANK_RTOL` count as zero.
const RANK_RTOL: f64 = 1e-10;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the design is rank deficient or no finite solution exists.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() < x.ncols() || x.ncols() == 0 || x.nrows() != y.len() {
        return None;
    }

    let svd = x.clone().svd(true, true);
    let max_sv = svd.singular_values.max();
    if !(max_sv.is_finite() && max_sv > 0.0) {
        return None;
    }
    if svd.rank(max_sv * RANK_RTOL) < x.ncols() {
        return None;
    }

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol * max_sv) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn rank_deficient_design_is_rejected() {
        // Second column is identically zero: no information about beta[1].
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert!(solve_least_squares(&x, &y).is_none());
    }

    #[test]
    fn underdetermined_design_is_rejected() {
        let x = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        let y = DVector::from_row_slice(&[1.0]);
        assert!(solve_least_squares(&x, &y).is_none());
    }
}
