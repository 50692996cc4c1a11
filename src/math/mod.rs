//! Numerical building blocks: B-splines, least squares, statistics.

pub mod bspline;
pub mod ols;
pub mod stats;

pub use ols::solve_least_squares;
