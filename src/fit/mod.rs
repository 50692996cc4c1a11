//! Spline model search and flux correction.
//!
//! Responsibilities:
//!
//! - lay out interior knots per spacing and phase shift
//! - fit and score one spline per grid cell (parallel)
//! - select across grids with AIC/BIC plus the likelihood tie-break
//! - apply one- or two-stage corrections

pub mod cancel;
pub mod correct;
pub mod grid;
pub mod knots;
pub mod selection;
pub mod spline;

pub use cancel::CancelToken;
pub use correct::*;
pub use grid::*;
pub use selection::*;
pub use spline::*;
