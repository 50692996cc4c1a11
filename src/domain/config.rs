//! Run configuration.
//!
//! Every tunable of the segmenter and of the model search lives here with its
//! default. A config file only needs to name the fields it changes:
//!
//! ```json
//! { "segment": { "drift_threshold": 1.5, "include_gaps": true },
//!   "search": { "spacings": [0.5, 1.0], "orders": [3, 5] } }
//! ```

use std::fs;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DecorError;

/// Upper bound on LOWESS robustifying passes.
pub const MAX_SMOOTHING_ITERATIONS: usize = 1000;

/// Largest number of cells one model grid may hold, counted over every
/// spacing, shift and order.
pub const MAX_GRID_CELLS: usize = 100_000;

/// How many covariates are corrected per segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionMode {
    /// Two covariates, corrected sequentially.
    #[default]
    Bivariate,
    /// The drift series only.
    Univariate,
}

/// Parameters of the adaptive segmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentCriteria {
    /// Drift (in drift units) since the bin start that closes a bin. Default 2.5.
    pub drift_threshold: f64,
    /// LOWESS neighbour fraction for the long-term trend. Default 0.2.
    pub smoothing_fraction: f64,
    /// LOWESS robustifying passes. Default 3.
    pub smoothing_iterations: usize,
    /// LOWESS interpolation distance in time units. Default 0.1.
    pub smoothing_delta: f64,
    /// Width `W` (samples) of the slope window. Default 100.
    pub slope_window: usize,
    /// Close bins at timing gaps. Default false.
    pub include_gaps: bool,
    /// Time step treated as a gap. Default 0.3.
    pub gap_size: f64,
    /// Bins shorter than this (time units) are reported. Default 1.0.
    pub min_bin_length: f64,
    /// Samples searched on either side of a drift boundary when snapping. Default 200.
    pub snap_search: usize,
    /// Cadence multiple that marks the edge of an orbit pass. Default 25.
    pub snap_sigma: f64,
}

impl Default for SegmentCriteria {
    fn default() -> Self {
        Self {
            drift_threshold: 2.5,
            smoothing_fraction: 0.2,
            smoothing_iterations: 3,
            smoothing_delta: 0.1,
            slope_window: 100,
            include_gaps: false,
            gap_size: 0.3,
            min_bin_length: 1.0,
            snap_search: 200,
            snap_sigma: 25.0,
        }
    }
}

impl SegmentCriteria {
    pub fn validate(&self) -> Result<(), DecorError> {
        if !(self.drift_threshold.is_finite() && self.drift_threshold > 0.0) {
            return Err(DecorError::config("drift_threshold must be finite and > 0"));
        }
        if !(self.smoothing_fraction > 0.0 && self.smoothing_fraction <= 1.0) {
            return Err(DecorError::config("smoothing_fraction must be in (0, 1]"));
        }
        if self.smoothing_iterations > MAX_SMOOTHING_ITERATIONS {
            return Err(DecorError::config(format!(
                "smoothing_iterations must be <= {MAX_SMOOTHING_ITERATIONS}"
            )));
        }
        if !(self.smoothing_delta.is_finite() && self.smoothing_delta >= 0.0) {
            return Err(DecorError::config("smoothing_delta must be finite and >= 0"));
        }
        if self.slope_window < 2 {
            return Err(DecorError::config("slope_window must be >= 2"));
        }
        if !(self.gap_size.is_finite() && self.gap_size > 0.0) {
            return Err(DecorError::config("gap_size must be finite and > 0"));
        }
        if !(self.min_bin_length.is_finite() && self.min_bin_length >= 0.0) {
            return Err(DecorError::config("min_bin_length must be finite and >= 0"));
        }
        if !(self.snap_sigma.is_finite() && self.snap_sigma > 0.0) {
            return Err(DecorError::config("snap_sigma must be finite and > 0"));
        }
        Ok(())
    }
}

/// Parameters of the spline model grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Knot spacings in covariate units. Default `[1/3, 0.5, 1.0, 2.0]`.
    pub spacings: Vec<f64>,
    /// Smallest knot phase shift. Default 0.01.
    pub phase_step: f64,
    /// Spline degrees. Default `[3]`.
    pub orders: Vec<usize>,
    /// Fit periodic splines over the covariate span. Default false.
    pub periodic: bool,
    /// Score given to cells whose likelihood is undefined. Default 1e75.
    pub sentinel: f64,
    /// Spacing multiplier for one retry when a grid has no valid cell.
    /// Default `Some(2.0)`; `None` fails straight away.
    pub widen_factor: Option<f64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            spacings: vec![1.0 / 3.0, 0.5, 1.0, 2.0],
            phase_step: 0.01,
            orders: vec![3],
            periodic: false,
            sentinel: 1e75,
            widen_factor: Some(2.0),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), DecorError> {
        if self.spacings.is_empty() {
            return Err(DecorError::invalid_input("spacing list is empty"));
        }
        if let Some(s) = self.spacings.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(DecorError::invalid_input(format!("knot spacing must be finite and > 0, got {s}")));
        }
        if !(self.phase_step.is_finite() && self.phase_step > 0.0) {
            return Err(DecorError::invalid_input(format!(
                "phase_step must be finite and > 0, got {}",
                self.phase_step
            )));
        }
        if self.orders.is_empty() {
            return Err(DecorError::invalid_input("order list is empty"));
        }
        if self.orders.contains(&0) {
            return Err(DecorError::invalid_input("spline order must be >= 1"));
        }
        if !(self.sentinel.is_finite() && self.sentinel > 0.0) {
            return Err(DecorError::invalid_input("sentinel score must be finite and > 0"));
        }
        if let Some(f) = self.widen_factor {
            if !(f.is_finite() && f > 1.0) {
                return Err(DecorError::invalid_input(format!("widen_factor must be > 1, got {f}")));
            }
        }
        self.check_grid_size()?;
        if let Some(f) = self.widen_factor {
            self.widened(f).check_grid_size()?;
        }
        Ok(())
    }

    /// Number of cells in the grid, `None` when it does not fit a `usize`.
    ///
    /// A spacing contributes `⌊s / phase_step⌋` shifts (at least one).
    pub fn cell_count(&self) -> Option<usize> {
        let shifts = self.spacings.iter().try_fold(0usize, |acc, &s| {
            let ratio = (s / self.phase_step).floor();
            if !(ratio.is_finite() && ratio < MAX_GRID_CELLS as f64) {
                return None;
            }
            acc.checked_add((ratio as usize).max(1))
        })?;
        shifts.checked_mul(self.orders.len())
    }

    fn check_grid_size(&self) -> Result<(), DecorError> {
        match self.cell_count() {
            Some(cells) if cells <= MAX_GRID_CELLS => Ok(()),
            _ => Err(DecorError::invalid_input(format!(
                "model grid exceeds {MAX_GRID_CELLS} cells (spacings {:?}, phase_step {}); raise phase_step",
                self.spacings, self.phase_step
            ))),
        }
    }

    /// Same grid with every spacing multiplied by `factor`.
    pub fn widened(&self, factor: f64) -> Self {
        Self {
            spacings: self.spacings.iter().map(|s| s * factor).collect(),
            ..self.clone()
        }
    }
}

/// Complete configuration of a detrending run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorConfig {
    pub segment: SegmentCriteria,
    pub search: SearchConfig,
    pub mode: CorrectionMode,
}

impl DecorConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, DecorError> {
        let text = fs::read_to_string(path)
            .map_err(|e| DecorError::io(format!("Failed to read config '{}': {e}", path.display())))?;
        let config: DecorConfig = serde_json::from_str(&text)
            .map_err(|e| DecorError::config(format!("Invalid config '{}': {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DecorError> {
        self.segment.validate()?;
        self.search.validate().map_err(|e| match e {
            DecorError::InvalidInput(msg) => DecorError::Config(msg),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DecorConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: DecorConfig =
            serde_json::from_str(r#"{"segment":{"include_gaps":true},"search":{"orders":[3,5]}}"#).unwrap();
        assert!(cfg.segment.include_gaps);
        assert_eq!(cfg.segment.slope_window, 100);
        assert_eq!(cfg.search.orders, vec![3, 5]);
        assert_eq!(cfg.search.sentinel, 1e75);
        assert_eq!(cfg.mode, CorrectionMode::Bivariate);
    }

    #[test]
    fn rejects_non_positive_spacing() {
        let search = SearchConfig {
            spacings: vec![0.5, 0.0],
            ..SearchConfig::default()
        };
        assert!(matches!(search.validate(), Err(DecorError::InvalidInput(_))));

        let cfg = DecorConfig {
            search,
            ..DecorConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(DecorError::Config(_))));
    }

    #[test]
    fn tiny_phase_step_is_rejected_before_any_fit() {
        let search = SearchConfig {
            spacings: vec![1.0],
            phase_step: 1e-300,
            ..SearchConfig::default()
        };
        assert_eq!(search.cell_count(), None);
        assert!(matches!(search.validate(), Err(DecorError::InvalidInput(_))));
    }

    #[test]
    fn grid_limit_covers_the_widened_retry() {
        // 80_000 shifts fit the limit, the doubled spacing does not.
        let search = SearchConfig {
            spacings: vec![0.8],
            phase_step: 1e-5,
            ..SearchConfig::default()
        };
        assert!(search.cell_count().is_some_and(|n| n <= MAX_GRID_CELLS));
        assert!(search.validate().is_err());
        let no_retry = SearchConfig {
            widen_factor: None,
            ..search
        };
        assert!(no_retry.validate().is_ok());
        assert_eq!(SearchConfig::default().cell_count(), Some(33 + 50 + 100 + 200));
    }

    #[test]
    fn widening_scales_every_spacing() {
        let search = SearchConfig {
            spacings: vec![0.5, 1.0],
            ..SearchConfig::default()
        };
        assert_eq!(search.widened(2.0).spacings, vec![1.0, 2.0]);
    }
}
