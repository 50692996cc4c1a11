//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - corrected flux and segment table exports (`export`)
//! - model file JSON and spline text records (`model`)

pub mod export;
pub mod ingest;
pub mod model;

pub use export::*;
pub use ingest::*;
pub use model::*;
