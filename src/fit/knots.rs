//! Interior knot layouts for the model grid.
//!
//! For a spacing `s` and shift index `p` the base layout is the arithmetic
//! sequence `min+s, min+2s, …` strictly below `max`, moved right by
//! `p · phase_step`. Two edge rules keep the layout covering the data:
//!
//! - if the last knot is more than one spacing short of `max`, one knot is
//!   appended; if it sits at or past `max`, it is dropped
//! - if the first knot is more than `s + phase_step` away from `min`, one knot
//!   is prepended one spacing earlier
//!
//! An empty layout means the spacing does not fit in the data span; the grid
//! records such cells as degenerate.

/// Number of phase shifts evaluated for one spacing: `⌊s / phase_step⌋`,
/// at least one.
pub fn shift_count(spacing: f64, phase_step: f64) -> usize {
    ((spacing / phase_step) as usize).max(1)
}

/// Arithmetic sequence `start, start+step, …` strictly below `stop`.
fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let len = ((stop - start) / step).ceil();
    if !(len.is_finite() && len > 0.0) {
        return Vec::new();
    }
    (0..len as usize).map(|i| start + i as f64 * step).collect()
}

/// Interior knots for spacing `spacing` and shift index `shift` over the
/// covariate range `[min, max]`.
pub fn knot_layout(min: f64, max: f64, spacing: f64, shift: usize, phase_step: f64) -> Vec<f64> {
    let offset = shift as f64 * phase_step;
    let mut knots: Vec<f64> = arange(min + spacing, max, spacing)
        .into_iter()
        .map(|k| k + offset)
        .collect();

    let Some(&last) = knots.last() else {
        return knots;
    };
    if max - last > spacing {
        knots.push(last + spacing);
    } else if max - last <= 0.0 {
        knots.pop();
    }

    if let Some(&first) = knots.first() {
        if (min - first).abs() > spacing + phase_step {
            knots.insert(0, first - spacing);
        }
    }
    knots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-12)
    }

    #[test]
    fn unshifted_layout_stays_below_max() {
        let k = knot_layout(0.0, 2.2, 0.5, 0, 0.01);
        assert!(close(&k, &[0.5, 1.0, 1.5, 2.0]));
    }

    #[test]
    fn shift_that_reaches_max_drops_the_last_knot() {
        // 0.5, 1.0, 1.5, 2.0 shifted by 0.01 puts the last knot past max.
        let k = knot_layout(0.0, 2.005, 0.5, 1, 0.01);
        assert!(close(&k, &[0.51, 1.01, 1.51]));
    }

    #[test]
    fn large_shift_prepends_a_knot() {
        // First knot at 0.5 + 0.3 = 0.8 is more than 0.51 away from min.
        let k = knot_layout(0.0, 2.2, 0.5, 30, 0.01);
        assert!(close(&k, &[0.3, 0.8, 1.3, 1.8]));
    }

    #[test]
    fn spacing_wider_than_span_gives_no_knots() {
        assert!(knot_layout(0.0, 0.4, 0.5, 0, 0.01).is_empty());
        assert!(knot_layout(1.0, 1.0, 0.5, 0, 0.01).is_empty());
    }

    #[test]
    fn shift_counts_truncate() {
        assert_eq!(shift_count(0.5, 0.01), 50);
        assert_eq!(shift_count(1.0 / 3.0, 0.01), 33);
        assert_eq!(shift_count(0.005, 0.01), 1);
    }
}
