//! Snapping drift boundaries to the end of an orbit pass.
//!
//! Satellite photometry arrives in passes separated by gaps much longer than
//! the in-pass cadence. A boundary placed mid-pass is moved to the nearest
//! sample that ends a pass, searching a bounded index window both ways.

/// Sample gaps at least `sigma · cadence` long mark a pass edge.
#[derive(Debug, Clone, Copy)]
pub struct SnapParams {
    pub search: usize,
    pub threshold: f64,
}

/// Closest pass end to `index`, never below `lower_bound`.
///
/// Forward the candidate is the first `ii` with `t[ii+1] − t[ii] ≥ threshold`;
/// backward the first `ii − 1` with `t[ii] − t[ii−1] ≥ threshold`. The side
/// closer in time wins, ties go forward. Without any pass edge in reach the
/// index is returned unchanged.
pub fn snap_to_orbit_end(time: &[f64], index: usize, lower_bound: usize, params: SnapParams) -> usize {
    let n = time.len();
    if n < 2 || index >= n {
        return index.min(n.saturating_sub(1));
    }

    let up_end = (index + params.search).min(n - 1);
    let up = (index..up_end).find(|&ii| time[ii + 1] - time[ii] >= params.threshold);

    let down_start = (index + 1).saturating_sub(params.search).max(1);
    let down = (down_start..=index)
        .rev()
        .find(|&ii| time[ii] - time[ii - 1] >= params.threshold)
        .map(|ii| ii - 1)
        .filter(|&d| d >= lower_bound);

    match (up, down) {
        (Some(u), Some(d)) => {
            let dt_up = (time[index] - time[u]).abs();
            let dt_down = (time[index] - time[d]).abs();
            if dt_down < dt_up { d } else { u }
        }
        (Some(u), None) => u,
        (None, Some(d)) => d,
        (None, None) => index,
    }
}
