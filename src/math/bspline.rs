//! B-spline primitives: knot vectors, basis evaluation, and the
//! Schoenberg–Whitney feasibility check for least-squares fits.
//!
//! Conventions follow the FITPACK `(t, c, k)` representation:
//! - `t` is the *full* knot vector (boundary knots included),
//! - `c` holds `t.len() - k - 1` coefficients,
//! - `k` is the polynomial degree.
//!
//! Outside `[t[k], t[n-k-1]]` the end polynomials are extrapolated.

/// Scratch buffers for Cox–de Boor evaluation, reused across many points.
#[derive(Debug, Clone)]
pub struct BasisScratch {
    left: Vec<f64>,
    right: Vec<f64>,
    values: Vec<f64>,
}

impl BasisScratch {
    pub fn new(degree: usize) -> Self {
        Self {
            left: vec![0.0; degree + 1],
            right: vec![0.0; degree + 1],
            values: vec![0.0; degree + 1],
        }
    }

    /// Non-zero basis values from the last `basis_funs` call.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Clamped knot vector: `k+1` copies of each boundary around the interior knots.
pub fn clamped_knots(x_min: f64, x_max: f64, interior: &[f64], degree: usize) -> Vec<f64> {
    let mut t = Vec::with_capacity(interior.len() + 2 * (degree + 1));
    t.extend(std::iter::repeat_n(x_min, degree + 1));
    t.extend_from_slice(interior);
    t.extend(std::iter::repeat_n(x_max, degree + 1));
    t
}

/// Periodic knot vector over `[x_min, x_max]`.
///
/// The `k` knots on either side of the base interval are copies of the
/// interior layout shifted by one period. Returns `None` when there are not
/// enough interior knots to wrap `k` of them.
pub fn periodic_knots(x_min: f64, x_max: f64, interior: &[f64], degree: usize) -> Option<Vec<f64>> {
    let period = x_max - x_min;
    let mut core = Vec::with_capacity(interior.len() + 2);
    core.push(x_min);
    core.extend_from_slice(interior);
    core.push(x_max);

    let last = core.len() - 1;
    if degree > last {
        return None;
    }

    let mut t = Vec::with_capacity(core.len() + 2 * degree);
    for j in (1..=degree).rev() {
        t.push(core[last - j] - period);
    }
    t.extend_from_slice(&core);
    for j in 1..=degree {
        t.push(core[j] + period);
    }
    Some(t)
}

/// Index `l` of the knot span with `t[l] <= x < t[l+1]`, clamped to the
/// valid spans `[degree, n_coef - 1]`.
pub fn find_span(knots: &[f64], degree: usize, n_coef: usize, x: f64) -> usize {
    let lo = degree;
    let hi = n_coef - 1;
    if x >= knots[hi + 1] {
        return hi;
    }
    if x <= knots[lo] {
        return lo;
    }

    // Invariant: knots[low] <= x < knots[high].
    let mut low = lo;
    let mut high = hi + 1;
    while high - low > 1 {
        let mid = (low + high) / 2;
        if x < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
    }
    low
}

/// Evaluate the `degree + 1` non-zero basis functions on `span` at `x`.
///
/// Results are left in `scratch.values()`; entry `j` belongs to coefficient
/// `span - degree + j`.
pub fn basis_funs(knots: &[f64], degree: usize, span: usize, x: f64, scratch: &mut BasisScratch) {
    let BasisScratch { left, right, values } = scratch;
    values[0] = 1.0;
    for j in 1..=degree {
        left[j] = x - knots[span + 1 - j];
        right[j] = knots[span + j] - x;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            let temp = if denom != 0.0 { values[r] / denom } else { 0.0 };
            values[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        values[j] = saved;
    }
}

/// Evaluate the spline `(knots, coefficients, degree)` at `x`.
pub fn evaluate(knots: &[f64], coefficients: &[f64], degree: usize, x: f64, scratch: &mut BasisScratch) -> f64 {
    let n_coef = coefficients.len();
    let span = find_span(knots, degree, n_coef, x);
    basis_funs(knots, degree, span, x, scratch);
    let offset = span - degree;
    scratch
        .values()
        .iter()
        .enumerate()
        .map(|(j, b)| coefficients[offset + j] * b)
        .sum()
}

/// Schoenberg–Whitney conditions for a least-squares fit of sorted `x` on a
/// clamped knot vector (the FITPACK `fpchec` rules).
///
/// `true` means every coefficient is supported by at least one distinct sample
/// in the right order, so the normal equations are non-singular.
pub fn schoenberg_whitney(x: &[f64], knots: &[f64], degree: usize) -> bool {
    let m = x.len();
    let n = knots.len();
    let k1 = degree + 1;
    if n < 2 * k1 {
        return false;
    }
    let nk1 = n - k1;
    if nk1 < k1 || nk1 > m {
        return false;
    }

    // Boundary knots must be ordered, interior knots strictly increasing.
    for j in 0..degree {
        if knots[j] > knots[j + 1] || knots[n - 1 - j] < knots[n - 2 - j] {
            return false;
        }
    }
    for j in degree..nk1 {
        if knots[j] >= knots[j + 1] {
            return false;
        }
    }

    // Data must lie inside the base interval.
    if x[0] < knots[degree] || x[m - 1] > knots[nk1] {
        return false;
    }
    if x[0] >= knots[k1] || x[m - 1] <= knots[nk1 - 1] {
        return false;
    }

    // Walk the samples and require one strictly inside each support interval.
    // `i` and `l` are 1-based like the reference formulation.
    let mut i = 1usize;
    let mut l = k1 + 1;
    if nk1 < 3 {
        return true;
    }
    for j in 2..nk1 {
        let tj = knots[j - 1];
        l += 1;
        let tl = knots[l - 1];
        loop {
            i += 1;
            if i >= m {
                return false;
            }
            if x[i - 1] > tj {
                break;
            }
        }
        if x[i - 1] >= tl {
            return false;
        }
    }
    true
}
