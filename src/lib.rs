//! `decor` library crate.
//!
//! Segmented spline decorrelation of satellite photometry: a run is cut into
//! bins on its long-term drift, and each bin's flux is corrected against one
//! or two instrumental covariates with splines chosen over a knot grid.
//!
//! The binary (`decor`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable from other pipelines

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod report;
pub mod segment;
