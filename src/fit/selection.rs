//! Model selection across one or more grids.
//!
//! Selection rules:
//! 1. Take the first strict minimum of each criterion over the grids, in
//!    `(grid, spacing, shift, order)` enumeration order.
//! 2. If both criteria land on the same cell, that cell wins.
//! 3. Otherwise the pick with the larger likelihood wins. Equal likelihoods
//!    keep the AIC pick.
//!
//! The path taken is recorded in a three-digit stage code (see
//! `DiagnosticCode`).

use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::domain::{CovariateSlot, Criterion};
use crate::fit::grid::{CandidateModel, GridCoord, ModelGrid};

/// Index of the first strict minimum. `None` for an empty sequence.
pub fn first_minimum(values: impl IntoIterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        match best {
            Some((_, b)) if !(v < b) => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// How the winning cell of a stage was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Both criteria chose the same cell.
    Agreed,
    /// Criteria disagreed; the AIC pick had the larger likelihood.
    AicByLikelihood,
    /// Criteria disagreed; the BIC pick had the larger likelihood.
    BicByLikelihood,
}

impl Decision {
    pub fn digit(self) -> u32 {
        match self {
            Decision::Agreed => 0,
            Decision::AicByLikelihood => 1,
            Decision::BicByLikelihood => 2,
        }
    }

    pub fn from_digit(digit: u32) -> Option<Self> {
        match digit {
            0 => Some(Decision::Agreed),
            1 => Some(Decision::AicByLikelihood),
            2 => Some(Decision::BicByLikelihood),
            _ => None,
        }
    }
}

/// A cell addressed across several grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pick {
    pub slot: CovariateSlot,
    pub coord: GridCoord,
}

/// Result of selecting one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub chosen: Pick,
    pub aic_pick: Pick,
    pub bic_pick: Pick,
    pub decision: Decision,
    /// Any cell of the searched grids was not valid.
    pub degenerate_cells: bool,
}

/// Choose the winning cell across `grids`.
///
/// Returns `None` when no grid has a valid cell.
pub fn select(grids: &[(CovariateSlot, &ModelGrid)]) -> Option<Selection> {
    if !grids.iter().any(|(_, g)| g.has_valid()) {
        return None;
    }

    let flat: Vec<(CovariateSlot, &CandidateModel)> = grids
        .iter()
        .flat_map(|(slot, grid)| grid.cells().iter().map(move |c| (*slot, c)))
        .collect();
    let argmin = |criterion: Criterion| {
        first_minimum(flat.iter().map(|(_, c)| c.criterion(criterion))).map(|i| flat[i])
    };
    let (aic_slot, aic_cell) = argmin(Criterion::Aic)?;
    let (bic_slot, bic_cell) = argmin(Criterion::Bic)?;
    let aic_pick = Pick {
        slot: aic_slot,
        coord: aic_cell.coord,
    };
    let bic_pick = Pick {
        slot: bic_slot,
        coord: bic_cell.coord,
    };

    let decision = if aic_pick == bic_pick {
        Decision::Agreed
    } else {
        warn!(
            "AIC and BIC disagree: AIC picks {:?} spacing={} shift={} order={} (L={:.5e}), BIC picks {:?} spacing={} shift={} order={} (L={:.5e})",
            aic_slot,
            aic_cell.knot_spacing,
            aic_cell.phase_shift,
            aic_cell.order,
            aic_cell.likelihood,
            bic_slot,
            bic_cell.knot_spacing,
            bic_cell.phase_shift,
            bic_cell.order,
            bic_cell.likelihood,
        );
        if bic_cell.likelihood > aic_cell.likelihood {
            Decision::BicByLikelihood
        } else {
            Decision::AicByLikelihood
        }
    };
    let chosen = match decision {
        Decision::BicByLikelihood => bic_pick,
        Decision::Agreed | Decision::AicByLikelihood => aic_pick,
    };
    let degenerate_cells = grids.iter().any(|(_, g)| g.degenerate_count() > 0);
    debug!("selected {chosen:?} ({decision:?})");

    Some(Selection {
        chosen,
        aic_pick,
        bic_pick,
        decision,
        degenerate_cells,
    })
}

/// Three-digit code of one correction stage.
///
/// Hundreds: covariate corrected (1 = A, 2 = B). Tens: 1 when any grid cell
/// was degenerate. Units: the `Decision` digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCode {
    pub slot: CovariateSlot,
    pub degenerate_cells: bool,
    pub decision: Decision,
}

impl StageCode {
    pub fn from_selection(selection: &Selection) -> Self {
        Self {
            slot: selection.chosen.slot,
            degenerate_cells: selection.degenerate_cells,
            decision: selection.decision,
        }
    }

    pub fn value(&self) -> u32 {
        self.slot.digit() * 100 + u32::from(self.degenerate_cells) * 10 + self.decision.digit()
    }

    pub fn decode(value: u32) -> Option<Self> {
        if value >= 1000 {
            return None;
        }
        let slot = CovariateSlot::from_digit(value / 100)?;
        let degenerate_cells = match (value / 10) % 10 {
            0 => false,
            1 => true,
            _ => return None,
        };
        let decision = Decision::from_digit(value % 10)?;
        Some(Self {
            slot,
            degenerate_cells,
            decision,
        })
    }
}

/// Audit code of a whole correction: `first × 1000 + second`, or just the
/// stage code for single-stage corrections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagnosticCode(pub u32);

impl DiagnosticCode {
    pub fn single(stage: StageCode) -> Self {
        Self(stage.value())
    }

    pub fn combined(first: StageCode, second: StageCode) -> Self {
        Self(first.value() * 1000 + second.value())
    }

    /// Split back into `(first, second)` stage codes.
    pub fn decode(self) -> Option<(StageCode, Option<StageCode>)> {
        if self.0 < 1000 {
            return StageCode::decode(self.0).map(|s| (s, None));
        }
        let first = StageCode::decode(self.0 / 1000)?;
        let second = StageCode::decode(self.0 % 1000)?;
        Some((first, Some(second)))
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SplineModel;
    use crate::fit::grid::CellStatus;
    use crate::fit::spline::DegenerateFit;

    fn fitted(shift: usize, aic: f64, bic: f64, likelihood: f64) -> CandidateModel {
        CandidateModel {
            coord: GridCoord {
                spacing: 0,
                shift,
                order: 0,
            },
            knot_spacing: 0.5,
            phase_shift: shift as f64 * 0.01,
            order: 3,
            model: Some(SplineModel {
                knots: vec![0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0],
                coefficients: vec![0.0; 5],
                degree: 3,
            }),
            aic,
            bic,
            likelihood,
            status: CellStatus::Fitted,
        }
    }

    fn degenerate(shift: usize) -> CandidateModel {
        CandidateModel {
            model: None,
            aic: 1e75,
            bic: 1e75,
            likelihood: 0.0,
            status: CellStatus::Degenerate(DegenerateFit::NoInteriorKnots),
            ..fitted(shift, 0.0, 0.0, 0.0)
        }
    }

    fn at(shift: usize) -> GridCoord {
        GridCoord {
            spacing: 0,
            shift,
            order: 0,
        }
    }

    /// AIC prefers shift 0, BIC prefers shift 1.
    fn split_grid(l0: f64, l1: f64) -> ModelGrid {
        ModelGrid::from_cells(vec![
            fitted(0, 10.0, 30.0, l0),
            fitted(1, 20.0, 15.0, l1),
            fitted(2, 25.0, 25.0, 100.0),
        ])
    }

    #[test]
    fn agreeing_criteria_pick_the_shared_minimum() {
        let grid = ModelGrid::from_cells(vec![fitted(0, 5.0, 6.0, 1.0), fitted(1, 4.0, 3.0, 2.0)]);
        let sel = select(&[(CovariateSlot::A, &grid)]).unwrap();
        assert_eq!(sel.decision, Decision::Agreed);
        assert_eq!(sel.chosen.coord, at(1));
        assert!(!sel.degenerate_cells);
        assert_eq!(StageCode::from_selection(&sel).value(), 100);
    }

    #[test]
    fn disagreement_goes_to_the_bic_pick_with_larger_likelihood() {
        let grid = split_grid(5.0, 8.0);
        let sel = select(&[(CovariateSlot::A, &grid)]).unwrap();
        assert_eq!(sel.aic_pick.coord, at(0));
        assert_eq!(sel.bic_pick.coord, at(1));
        assert_eq!(sel.decision, Decision::BicByLikelihood);
        assert_eq!(sel.chosen, sel.bic_pick);
        assert_eq!(StageCode::from_selection(&sel).value(), 102);
    }

    #[test]
    fn disagreement_goes_to_the_aic_pick_with_larger_likelihood() {
        let grid = split_grid(8.0, 5.0);
        let sel = select(&[(CovariateSlot::A, &grid)]).unwrap();
        assert_eq!(sel.decision, Decision::AicByLikelihood);
        assert_eq!(sel.chosen.coord, at(0));
        assert_eq!(StageCode::from_selection(&sel).value(), 101);
    }

    #[test]
    fn equal_likelihoods_keep_the_aic_pick() {
        let grid = split_grid(6.0, 6.0);
        let sel = select(&[(CovariateSlot::A, &grid)]).unwrap();
        assert_eq!(sel.decision, Decision::AicByLikelihood);
        assert_eq!(sel.chosen, sel.aic_pick);
    }

    #[test]
    fn picks_span_grids_and_flag_degenerate_cells() {
        let a = ModelGrid::from_cells(vec![fitted(0, 10.0, 30.0, 4.0), degenerate(1)]);
        let b = ModelGrid::from_cells(vec![fitted(0, 20.0, 15.0, 9.0)]);
        let sel = select(&[(CovariateSlot::A, &a), (CovariateSlot::B, &b)]).unwrap();
        assert_eq!(sel.aic_pick.slot, CovariateSlot::A);
        assert_eq!(sel.bic_pick.slot, CovariateSlot::B);
        assert_eq!(sel.chosen.slot, CovariateSlot::B);
        assert!(sel.degenerate_cells);
        assert_eq!(StageCode::from_selection(&sel).value(), 212);
    }

    #[test]
    fn all_degenerate_grids_select_nothing() {
        let grid = ModelGrid::from_cells(vec![degenerate(0), degenerate(1)]);
        assert!(select(&[(CovariateSlot::A, &grid)]).is_none());
    }

    #[test]
    fn first_minimum_breaks_ties_by_index() {
        assert_eq!(first_minimum([3.0, 1.0, 2.0, 1.0]), Some(1));
        assert_eq!(first_minimum([1e75, 1e75]), Some(0));
        assert_eq!(first_minimum(Vec::<f64>::new()), None);
    }

    #[test]
    fn stage_code_digits() {
        let code = StageCode {
            slot: CovariateSlot::B,
            degenerate_cells: true,
            decision: Decision::AicByLikelihood,
        };
        assert_eq!(code.value(), 211);
        assert_eq!(StageCode::decode(211), Some(code));
        assert_eq!(StageCode::decode(311), None);
        assert_eq!(StageCode::decode(131), None);
    }

    #[test]
    fn combined_code_decodes_both_stages() {
        let first = StageCode {
            slot: CovariateSlot::A,
            degenerate_cells: false,
            decision: Decision::BicByLikelihood,
        };
        let second = StageCode {
            slot: CovariateSlot::B,
            degenerate_cells: false,
            decision: Decision::Agreed,
        };
        let code = DiagnosticCode::combined(first, second);
        assert_eq!(code.0, 102_200);
        assert_eq!(code.decode(), Some((first, Some(second))));
        assert_eq!(DiagnosticCode::single(first).decode(), Some((first, None)));
    }
}
