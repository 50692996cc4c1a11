//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the run configuration (`DecorConfig`, `SegmentCriteria`, `SearchConfig`)
//! - light-curve input (`LightCurve`) and segments (`Segment`, `SegmentReason`)
//! - fitted spline models (`SplineModel`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
