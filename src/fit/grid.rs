//! Model grid search over knot spacing × phase shift × spline order.
//!
//! Every cell of the grid is an independent least-squares fit, so cells are
//! evaluated in parallel and written once. Degenerate cells are kept in the
//! grid with sentinel scores; they never win an `argmin` while any valid
//! cell exists.

use std::cmp::Ordering;

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{Criterion, MAX_GRID_CELLS, SearchConfig, SplineModel};
use crate::error::DecorError;
use crate::fit::cancel::CancelToken;
use crate::fit::knots::{knot_layout, shift_count};
use crate::fit::selection::first_minimum;
use crate::fit::spline::{DegenerateFit, estimated_params, fit_spline, score};

/// Position of a cell: `(spacing index, shift index, order index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCoord {
    pub spacing: usize,
    pub shift: usize,
    pub order: usize,
}

/// Outcome of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Fitted,
    Degenerate(DegenerateFit),
    /// The fit succeeded but its likelihood was undefined.
    ScoreUndefined,
}

/// One evaluated grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateModel {
    pub coord: GridCoord,
    pub knot_spacing: f64,
    pub phase_shift: f64,
    pub order: usize,
    pub model: Option<SplineModel>,
    pub aic: f64,
    pub bic: f64,
    pub likelihood: f64,
    pub status: CellStatus,
}

impl CandidateModel {
    /// Usable for selection: fitted with defined, below-sentinel scores.
    pub fn valid(&self) -> bool {
        self.status == CellStatus::Fitted && self.model.is_some()
    }

    pub fn criterion(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Aic => self.aic,
            Criterion::Bic => self.bic,
        }
    }
}

/// Fully evaluated grid for one covariate.
///
/// Cells are stored in enumeration order: spacing outermost, then shift,
/// then order. The number of shifts differs per spacing.
#[derive(Debug, Clone)]
pub struct ModelGrid {
    shift_counts: Vec<usize>,
    order_count: usize,
    cells: Vec<CandidateModel>,
}

impl ModelGrid {
    pub fn shift_counts(&self) -> &[usize] {
        &self.shift_counts
    }

    pub fn cells(&self) -> &[CandidateModel] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, coord: GridCoord) -> Option<&CandidateModel> {
        self.index_of(coord).map(|i| &self.cells[i])
    }

    /// Flat index of `coord` in enumeration order.
    pub fn index_of(&self, coord: GridCoord) -> Option<usize> {
        if coord.spacing >= self.shift_counts.len()
            || coord.shift >= self.shift_counts[coord.spacing]
            || coord.order >= self.order_count
        {
            return None;
        }
        let before: usize = self.shift_counts[..coord.spacing].iter().sum();
        Some((before + coord.shift) * self.order_count + coord.order)
    }

    pub fn valid_count(&self) -> usize {
        self.cells.iter().filter(|c| c.valid()).count()
    }

    pub fn degenerate_count(&self) -> usize {
        self.cells.len() - self.valid_count()
    }

    pub fn has_valid(&self) -> bool {
        self.cells.iter().any(CandidateModel::valid)
    }

    /// Coordinate of the first strict minimum under `criterion`.
    ///
    /// Only points at an invalid cell when every cell is invalid.
    pub fn argmin(&self, criterion: Criterion) -> GridCoord {
        let idx = first_minimum(self.cells.iter().map(|c| c.criterion(criterion))).unwrap_or(0);
        self.cells[idx].coord
    }
}

#[cfg(test)]
impl ModelGrid {
    /// Grid with one spacing whose shifts are `cells`, one order each.
    pub(crate) fn from_cells(cells: Vec<CandidateModel>) -> Self {
        Self {
            shift_counts: vec![cells.len()],
            order_count: 1,
            cells,
        }
    }
}

fn coords(config: &SearchConfig) -> Result<(Vec<usize>, Vec<GridCoord>), DecorError> {
    let shift_counts: Vec<usize> = config
        .spacings
        .iter()
        .map(|&s| shift_count(s, config.phase_step))
        .collect();
    let total = shift_counts
        .iter()
        .try_fold(0usize, |acc, &n| acc.checked_add(n))
        .and_then(|n| n.checked_mul(config.orders.len()))
        .filter(|&n| n <= MAX_GRID_CELLS)
        .ok_or_else(|| DecorError::invalid_input(format!("model grid exceeds {MAX_GRID_CELLS} cells")))?;
    let mut out = Vec::with_capacity(total);
    for (spacing, &shifts) in shift_counts.iter().enumerate() {
        for shift in 0..shifts {
            for order in 0..config.orders.len() {
                out.push(GridCoord { spacing, shift, order });
            }
        }
    }
    Ok((shift_counts, out))
}

/// Evaluate the whole grid for `y` as a function of `x`.
///
/// `x` does not need to be sorted. The token is checked before each cell; a
/// cancelled search returns `DecorError::Cancelled` and no grid.
pub fn search(x: &[f64], y: &[f64], config: &SearchConfig, cancel: &CancelToken) -> Result<ModelGrid, DecorError> {
    config.validate()?;
    if x.len() != y.len() {
        return Err(DecorError::invalid_input(format!(
            "covariate has {} values, flux has {}",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(DecorError::invalid_input("cannot search a model grid on an empty series"));
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(DecorError::invalid_input("covariate or flux contains non-finite values"));
    }

    let mut order: Vec<usize> = (0..x.len()).collect();
    order.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap_or(Ordering::Equal));
    let xs: Vec<f64> = order.iter().map(|&i| x[i]).collect();
    let ys: Vec<f64> = order.iter().map(|&i| y[i]).collect();
    let x_min = xs[0];
    let x_max = xs[xs.len() - 1];

    let (shift_counts, grid_coords) = coords(config)?;

    let cells: Vec<CandidateModel> = grid_coords
        .par_iter()
        .map(|&coord| {
            cancel.check()?;
            Ok(evaluate_cell(&xs, &ys, x_min, x_max, coord, config))
        })
        .collect::<Result<_, DecorError>>()?;

    let grid = ModelGrid {
        shift_counts,
        order_count: config.orders.len(),
        cells,
    };
    debug!(
        "model grid: {} cells, {} valid, covariate range [{x_min:.4}, {x_max:.4}]",
        grid.len(),
        grid.valid_count()
    );
    Ok(grid)
}

fn evaluate_cell(
    x: &[f64],
    y: &[f64],
    x_min: f64,
    x_max: f64,
    coord: GridCoord,
    config: &SearchConfig,
) -> CandidateModel {
    let spacing = config.spacings[coord.spacing];
    let order = config.orders[coord.order];
    let phase_shift = coord.shift as f64 * config.phase_step;
    let interior = knot_layout(x_min, x_max, spacing, coord.shift, config.phase_step);

    let degenerate = |reason| CandidateModel {
        coord,
        knot_spacing: spacing,
        phase_shift,
        order,
        model: None,
        aic: config.sentinel,
        bic: config.sentinel,
        likelihood: 0.0,
        status: CellStatus::Degenerate(reason),
    };

    let model = match fit_spline(x, y, &interior, order, config.periodic) {
        Ok(model) => model,
        Err(reason) => return degenerate(reason),
    };

    let scores = score(
        x,
        y,
        &model,
        Some(estimated_params(interior.len(), order)),
        config.sentinel,
    );
    let status = if scores.defined && scores.aic < config.sentinel && scores.bic < config.sentinel {
        CellStatus::Fitted
    } else {
        CellStatus::ScoreUndefined
    };
    CandidateModel {
        coord,
        knot_spacing: spacing,
        phase_shift,
        order,
        model: Some(model),
        aic: scores.aic,
        bic: scores.bic,
        likelihood: scores.likelihood,
        status,
    }
}
