//! Data sources that are not files on disk.

pub mod synthetic;

pub use synthetic::{SyntheticCurve, SyntheticSpec, generate, generate_light_curve};
