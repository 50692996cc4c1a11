//! Adaptive segmentation of a run on its long-term drift.
//!
//! The drift series (detector temperature) is smoothed with LOWESS. A scan
//! then walks the smoothed series, comparing the local slope sign (fitted in
//! a window of `W` samples around the scan index) with the sign at the start
//! of the current bin. A bin is closed when:
//!
//! - the slope kept its sign and the drift since the bin start reached `Δ`
//! - the slope flipped and the drift came back past the bin-start value
//! - gap closing is enabled and the next sample lies beyond `gap_size`
//!
//! Drift boundaries are snapped to the nearest orbit-pass end. The scan stops
//! within `W/2` of the end of the run and closes the last bin there.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::domain::{Segment, SegmentCriteria, SegmentReason, validate_time};
use crate::error::DecorError;
use crate::math::stats::{linear_slope, median_cadence};
use crate::segment::snap::{SnapParams, snap_to_orbit_end};

/// Advisory findings of a segmentation. None of them change the segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentWarning {
    /// A bin spans less time than `min_bin_length`.
    ShortBin { segment: usize, length: f64 },
    /// The global maximum of the smoothed drift is not at either end.
    InteriorMaximum { index: usize },
    /// The global minimum of the smoothed drift is not at either end.
    InteriorMinimum { index: usize },
}

/// Segments of one run plus the smoothed drift they were derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    pub segments: Vec<Segment>,
    pub drift_long: Vec<f64>,
    pub warnings: Vec<SegmentWarning>,
}

/// Runs shorter than this are used unsmoothed.
const MIN_SMOOTHED_SAMPLES: usize = 4;

/// Long-term drift trend: robust LOWESS of the drift over time.
fn smooth_drift(time: &[f64], drift: &[f64], criteria: &SegmentCriteria) -> Result<Vec<f64>, DecorError> {
    use lowess::prelude::*;

    if time.len() < MIN_SMOOTHED_SAMPLES {
        return Ok(drift.to_vec());
    }
    let smoother = Lowess::new()
        .fraction(criteria.smoothing_fraction)
        .iterations(criteria.smoothing_iterations)
        .delta(criteria.smoothing_delta)
        .adapter(Batch)
        .build()
        .map_err(|e| DecorError::invalid_input(format!("drift smoothing: {e}")))?;
    let trend = smoother
        .fit(time, drift)
        .map_err(|e| DecorError::invalid_input(format!("drift smoothing: {e}")))?;
    Ok(trend.y)
}

/// Sign of a slope; flat or undefined slopes count as rising.
fn slope_sign(time: &[f64], values: &[f64]) -> i8 {
    match linear_slope(time, values) {
        Some(s) if s < 0.0 => -1,
        _ => 1,
    }
}

struct BinStart {
    index: usize,
    value: f64,
    sign: i8,
}

impl BinStart {
    fn at(index: usize, time: &[f64], long: &[f64], window: usize) -> Self {
        let end = (index + window).min(long.len());
        Self {
            index,
            value: long[index],
            sign: slope_sign(&time[index..end], &long[index..end]),
        }
    }
}

/// Split a run into segments on its drift series.
pub fn segment(time: &[f64], drift: &[f64], criteria: &SegmentCriteria) -> Result<Segmentation, DecorError> {
    validate_time(time)?;
    if drift.len() != time.len() {
        return Err(DecorError::invalid_input(format!(
            "drift has {} values, time has {}",
            drift.len(),
            time.len()
        )));
    }
    if drift.iter().any(|v| !v.is_finite()) {
        return Err(DecorError::invalid_input("drift contains non-finite values"));
    }
    criteria
        .validate()
        .map_err(|e| DecorError::invalid_input(e.to_string()))?;

    let n = time.len();
    let long = smooth_drift(time, drift, criteria)?;
    let mut warnings = extremum_warnings(&long);

    let window = criteria.slope_window;
    let half = window / 2;
    let snap = SnapParams {
        search: criteria.snap_search,
        threshold: criteria.snap_sigma * median_cadence(time).unwrap_or(0.0),
    };

    let mut segments = Vec::new();
    let mut bin = BinStart::at(0, time, &long, window);
    let mut tt = half + 1;

    while tt < n {
        if tt + 1 + half >= n {
            break;
        }

        // A backward snap can restart the scan closer than W/2 to the run start.
        let lo = tt.saturating_sub(half);
        let hi = tt + half;
        let sign = slope_sign(&time[lo..hi], &long[lo..hi]);
        let value = long[tt];

        let drifted = match (bin.sign, sign) {
            (1, 1) => value - bin.value >= criteria.drift_threshold,
            (-1, -1) => bin.value - value >= criteria.drift_threshold,
            (1, -1) => bin.value >= value,
            _ => value >= bin.value,
        };

        if drifted {
            let end = snap_to_orbit_end(time, tt, bin.index, snap);
            if end + 1 >= n {
                break;
            }
            debug!(
                "drift boundary at index {tt} snapped to {end} (drift {:+.3} since bin start)",
                value - bin.value
            );
            segments.push(Segment {
                start: bin.index,
                end,
                reason: SegmentReason::Drift,
            });
            bin = BinStart::at(end + 1, time, &long, window);
            tt = end + 2;
        } else if criteria.include_gaps && time[tt + 1] - time[tt] > criteria.gap_size {
            debug!("gap boundary at index {tt} ({:.3} to next sample)", time[tt + 1] - time[tt]);
            segments.push(Segment {
                start: bin.index,
                end: tt,
                reason: SegmentReason::Gap,
            });
            bin = BinStart::at(tt + 1, time, &long, window);
            tt += 1;
        } else {
            tt += 1;
        }
    }

    segments.push(Segment {
        start: bin.index,
        end: n - 1,
        reason: SegmentReason::End,
    });

    for (i, s) in segments.iter().enumerate() {
        let length = time[s.end] - time[s.start];
        if length < criteria.min_bin_length {
            warn!(
                "segment {i} [{}..={}] spans {length:.3}, below the minimum bin length {:.3}",
                s.start, s.end, criteria.min_bin_length
            );
            warnings.push(SegmentWarning::ShortBin { segment: i, length });
        }
    }

    Ok(Segmentation {
        segments,
        drift_long: long,
        warnings,
    })
}

fn extremum_warnings(long: &[f64]) -> Vec<SegmentWarning> {
    let n = long.len();
    let mut out = Vec::new();
    if n < 3 {
        return out;
    }
    let mut max_i = 0;
    let mut min_i = 0;
    for (i, &v) in long.iter().enumerate() {
        if v > long[max_i] {
            max_i = i;
        }
        if v < long[min_i] {
            min_i = i;
        }
    }
    if max_i != 0 && max_i != n - 1 {
        warn!("global maximum of the long-term drift is inside the run (index {max_i})");
        out.push(SegmentWarning::InteriorMaximum { index: max_i });
    }
    if min_i != 0 && min_i != n - 1 {
        warn!("global minimum of the long-term drift is inside the run (index {min_i})");
        out.push(SegmentWarning::InteriorMinimum { index: min_i });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> SegmentCriteria {
        SegmentCriteria {
            drift_threshold: 1.0,
            slope_window: 20,
            min_bin_length: 0.0,
            ..SegmentCriteria::default()
        }
    }

    fn assert_partition(segments: &[Segment], n: usize) {
        assert_eq!(segments[0].start, 0);
        assert_eq!(segments.last().map(|s| s.end), Some(n - 1));
        assert_eq!(segments.last().map(|s| s.reason), Some(SegmentReason::End));
        for w in segments.windows(2) {
            assert_eq!(w[0].end + 1, w[1].start);
        }
        assert!(segments.iter().all(|s| s.start <= s.end));
    }

    #[test]
    fn straight_line_trend_is_exact() {
        let time: Vec<f64> = (0..400).map(|i| i as f64 * 0.01 + if i >= 200 { 0.5 } else { 0.0 }).collect();
        let drift: Vec<f64> = time.iter().map(|t| 18.0 + 0.7 * t).collect();
        let seg = segment(&time, &drift, &criteria()).unwrap();
        for (smoothed, raw) in seg.drift_long.iter().zip(&drift) {
            assert!((smoothed - raw).abs() < 1e-8, "{smoothed} vs {raw}");
        }
    }

    #[test]
    fn slow_drift_is_one_segment() {
        let time: Vec<f64> = (0..300).map(|i| i as f64 * 0.01).collect();
        let drift: Vec<f64> = time.iter().map(|t| 20.0 + 0.05 * t).collect();
        let seg = segment(&time, &drift, &criteria()).unwrap();
        assert_eq!(seg.segments.len(), 1);
        assert_partition(&seg.segments, 300);
    }

    #[test]
    fn steady_rise_closes_bins_every_threshold() {
        // Uniform cadence, so snapping leaves boundaries in place.
        let time: Vec<f64> = (0..1000).map(|i| i as f64 * 0.01).collect();
        let drift: Vec<f64> = time.iter().map(|t| 0.5 * t).collect();
        let seg = segment(&time, &drift, &criteria()).unwrap();
        assert_partition(&seg.segments, 1000);

        let first = seg.segments[0];
        assert_eq!(first.reason, SegmentReason::Drift);
        // 0.5 per unit time reaches 1.0 after 2.0 time units = 200 samples.
        assert!((first.end as i64 - 200).abs() <= 2, "first boundary at {}", first.end);
        assert!(seg.segments.iter().filter(|s| s.reason == SegmentReason::Drift).count() >= 3);
    }

    #[test]
    fn reversal_closes_a_bin_when_drift_returns() {
        let time: Vec<f64> = (0..1200).map(|i| i as f64 * 0.01).collect();
        // Rises by 0.6 (below threshold), then falls back through its start.
        let drift: Vec<f64> = time
            .iter()
            .map(|&t| if t < 3.0 { 0.2 * t } else { 0.6 - 0.2 * (t - 3.0) })
            .collect();
        let seg = segment(&time, &drift, &criteria()).unwrap();
        assert_partition(&seg.segments, 1200);
        assert_eq!(seg.segments[0].reason, SegmentReason::Drift);
        assert!(seg.segments[0].end > 450 && seg.segments[0].end < 700);
        assert!(
            seg.warnings
                .iter()
                .any(|w| matches!(w, SegmentWarning::InteriorMaximum { .. }))
        );
    }

    #[test]
    fn gap_closes_a_bin_at_the_sample_before_it() {
        let mut time: Vec<f64> = (0..200).map(|i| i as f64 * 0.01).collect();
        time.extend((0..200).map(|i| 5.0 + i as f64 * 0.01));
        let drift: Vec<f64> = time.iter().map(|t| 10.0 + 0.01 * t).collect();
        let cfg = SegmentCriteria {
            include_gaps: true,
            ..criteria()
        };
        let seg = segment(&time, &drift, &cfg).unwrap();
        assert_partition(&seg.segments, 400);
        assert_eq!(seg.segments[0].reason, SegmentReason::Gap);
        assert_eq!(seg.segments[0].end, 199);
    }

    #[test]
    fn short_run_is_a_single_end_segment() {
        let time = [0.0, 0.1, 0.2];
        let drift = [1.0, 2.0, 3.0];
        let seg = segment(&time, &drift, &criteria()).unwrap();
        assert_eq!(
            seg.segments,
            vec![Segment {
                start: 0,
                end: 2,
                reason: SegmentReason::End
            }]
        );
    }

    #[test]
    fn rejects_unsorted_time() {
        let err = segment(&[0.0, 2.0, 1.0], &[1.0, 1.0, 1.0], &criteria()).unwrap_err();
        assert!(matches!(err, DecorError::InvalidInput(_)));
    }
}
