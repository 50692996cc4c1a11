//! Adaptive time segmentation.
//!
//! A run is cut into bins over which the long-term drift stays within a
//! threshold, the drift trend does not reverse, and (optionally) no timing
//! gap occurs. Each bin is later corrected independently.

pub mod segmenter;
pub mod snap;

pub use segmenter::*;
pub use snap::{SnapParams, snap_to_orbit_end};
