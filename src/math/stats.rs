//! Small descriptive statistics used by the segmenter and the correctors.

use std::cmp::Ordering;

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median of a slice (the slice is reordered).
pub fn median_mut(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Median spacing between consecutive samples.
pub fn median_cadence(time: &[f64]) -> Option<f64> {
    let mut diffs: Vec<f64> = time.windows(2).map(|w| w[1] - w[0]).collect();
    median_mut(&mut diffs)
}

/// Slope of an ordinary least-squares line through `(x, y)`.
///
/// Returns `None` when fewer than two points are given or `x` has no spread.
pub fn linear_slope(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let xbar = x[..n].iter().sum::<f64>() / n as f64;
    let ybar = y[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var = 0.0;
    for i in 0..n {
        let dx = x[i] - xbar;
        cov += dx * (y[i] - ybar);
        var += dx * dx;
    }
    if var <= 0.0 || !cov.is_finite() {
        return None;
    }
    Some(cov / var)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median_mut(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median_mut(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median_mut(&mut Vec::new()), None);
    }

    #[test]
    fn slope_of_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let slope = linear_slope(&x, &y).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
    }

    #[test]
    fn slope_needs_spread() {
        assert!(linear_slope(&[1.0, 1.0], &[0.0, 1.0]).is_none());
        assert!(linear_slope(&[1.0], &[0.0]).is_none());
    }

    #[test]
    fn cadence_is_median_step() {
        let t = [0.0, 1.0, 2.0, 10.0, 11.0];
        assert_eq!(median_cadence(&t), Some(1.0));
    }
}
