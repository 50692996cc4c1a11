//! Flux corrections against one or two covariates.
//!
//! A bivariate correction runs two stages:
//!
//! 1. search both covariates against the mean-centred flux and select one
//!    cell across the two grids
//! 2. search the other covariate against the flux left after stage 1
//!
//! The combined correction is the sum of both stage curves. A univariate
//! correction is stage 1 on a single covariate.
//!
//! When a stage has no valid cell at all, its search is repeated once with
//! wider knot spacings (`SearchConfig::widen_factor`) before giving up.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::domain::{CovariateNames, CovariateSlot, SearchConfig, SplineModel};
use crate::error::{DecorError, Stage};
use crate::fit::cancel::CancelToken;
use crate::fit::grid::{GridCoord, ModelGrid, search};
use crate::fit::selection::{Decision, DiagnosticCode, Selection, StageCode, select};
use crate::math::stats::mean;

/// The model chosen in one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedModel {
    pub slot: CovariateSlot,
    pub covariate: String,
    pub coord: GridCoord,
    pub knot_spacing: f64,
    pub phase_shift: f64,
    pub order: usize,
    pub aic: f64,
    pub bic: f64,
    pub likelihood: f64,
    pub decision: Decision,
    pub model: SplineModel,
}

/// Bookkeeping of one correction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub selected: SelectedModel,
    pub code: StageCode,
    /// Cells evaluated over all grids of the stage.
    pub cells: usize,
    pub valid_cells: usize,
    /// The stage only succeeded after widening the spacings.
    pub widened: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionResult {
    pub first: StageResult,
    pub second: Option<StageResult>,
    /// Mean removed from the flux before fitting.
    pub flux_mean: f64,
    pub first_correction: Vec<f64>,
    pub second_correction: Option<Vec<f64>>,
    pub combined_correction: Vec<f64>,
    pub diagnostic_code: DiagnosticCode,
}

impl CorrectionResult {
    /// `flux − combined_correction`; the flux mean is kept.
    pub fn apply(&self, flux: &[f64]) -> Vec<f64> {
        flux.iter()
            .zip(&self.combined_correction)
            .map(|(f, c)| f - c)
            .collect()
    }
}

/// Sequential two-covariate correction of `flux`.
pub fn correct(
    flux: &[f64],
    covariate_a: &[f64],
    covariate_b: &[f64],
    config: &SearchConfig,
    names: &CovariateNames,
    cancel: &CancelToken,
) -> Result<CorrectionResult, DecorError> {
    check_inputs(flux, &[(names.a.as_str(), covariate_a), (names.b.as_str(), covariate_b)])?;
    config.validate()?;

    let flux_mean = mean(flux).unwrap_or(0.0);
    let centred: Vec<f64> = flux.iter().map(|f| f - flux_mean).collect();
    let covariate = |slot: CovariateSlot| match slot {
        CovariateSlot::A => covariate_a,
        CovariateSlot::B => covariate_b,
    };

    let first = run_stage(
        Stage::First,
        &[CovariateSlot::A, CovariateSlot::B],
        &covariate,
        &centred,
        config,
        names,
        cancel,
    )?;
    let first_correction = first.selected.model.evaluate_many(covariate(first.selected.slot));
    debug!(
        "first correction on '{}' (spacing={}, shift={}, order={}, code={})",
        first.selected.covariate,
        first.selected.knot_spacing,
        first.selected.phase_shift,
        first.selected.order,
        first.code.value()
    );

    let residual: Vec<f64> = centred.iter().zip(&first_correction).map(|(f, c)| f - c).collect();
    let second_slot = first.selected.slot.other();
    let second = run_stage(Stage::Second, &[second_slot], &covariate, &residual, config, names, cancel)?;
    let second_correction = second.selected.model.evaluate_many(covariate(second_slot));
    debug!(
        "second correction on '{}' (spacing={}, shift={}, order={}, code={})",
        second.selected.covariate,
        second.selected.knot_spacing,
        second.selected.phase_shift,
        second.selected.order,
        second.code.value()
    );

    let combined_correction = first_correction
        .iter()
        .zip(&second_correction)
        .map(|(a, b)| a + b)
        .collect();
    let diagnostic_code = DiagnosticCode::combined(first.code, second.code);

    Ok(CorrectionResult {
        first,
        second: Some(second),
        flux_mean,
        first_correction,
        second_correction: Some(second_correction),
        combined_correction,
        diagnostic_code,
    })
}

/// Single-covariate correction of `flux` (e.g. against detector temperature).
pub fn correct_single(
    flux: &[f64],
    covariate: &[f64],
    name: &str,
    config: &SearchConfig,
    cancel: &CancelToken,
) -> Result<CorrectionResult, DecorError> {
    check_inputs(flux, &[(name, covariate)])?;
    config.validate()?;

    let names = CovariateNames {
        a: name.to_string(),
        ..CovariateNames::default()
    };
    let flux_mean = mean(flux).unwrap_or(0.0);
    let centred: Vec<f64> = flux.iter().map(|f| f - flux_mean).collect();
    let lookup = |_: CovariateSlot| covariate;

    let first = run_stage(Stage::First, &[CovariateSlot::A], &lookup, &centred, config, &names, cancel)?;
    let first_correction = first.selected.model.evaluate_many(covariate);
    let diagnostic_code = DiagnosticCode::single(first.code);

    Ok(CorrectionResult {
        first,
        second: None,
        flux_mean,
        combined_correction: first_correction.clone(),
        first_correction,
        second_correction: None,
        diagnostic_code,
    })
}

fn check_inputs(flux: &[f64], covariates: &[(&str, &[f64])]) -> Result<(), DecorError> {
    if flux.is_empty() {
        return Err(DecorError::invalid_input("flux is empty"));
    }
    if flux.iter().any(|v| !v.is_finite()) {
        return Err(DecorError::invalid_input("flux contains non-finite values"));
    }
    for (name, values) in covariates {
        if values.len() != flux.len() {
            return Err(DecorError::invalid_input(format!(
                "covariate '{name}' has {} values, flux has {}",
                values.len(),
                flux.len()
            )));
        }
    }
    Ok(())
}

fn search_all<'a>(
    slots: &[CovariateSlot],
    covariate: &impl Fn(CovariateSlot) -> &'a [f64],
    y: &[f64],
    config: &SearchConfig,
    cancel: &CancelToken,
) -> Result<Vec<(CovariateSlot, ModelGrid)>, DecorError> {
    slots
        .iter()
        .map(|&slot| search(covariate(slot), y, config, cancel).map(|g| (slot, g)))
        .collect()
}

fn run_stage<'a>(
    stage: Stage,
    slots: &[CovariateSlot],
    covariate: &impl Fn(CovariateSlot) -> &'a [f64],
    y: &[f64],
    config: &SearchConfig,
    names: &CovariateNames,
    cancel: &CancelToken,
) -> Result<StageResult, DecorError> {
    let mut grids = search_all(slots, covariate, y, config, cancel)?;
    let mut widened = false;
    let mut selection = select_owned(&grids);

    if selection.is_none() {
        if let Some(factor) = config.widen_factor {
            warn!(
                "{stage} correction: no valid model for {}; retrying with spacings x{factor}",
                describe(slots, names)
            );
            grids = search_all(slots, covariate, y, &config.widened(factor), cancel)?;
            widened = true;
            selection = select_owned(&grids);
        }
    }

    let cells = grids.iter().map(|(_, g)| g.len()).sum();
    let Some(selection) = selection else {
        return Err(DecorError::NoValidModel {
            stage,
            covariate: describe(slots, names),
            cells,
        });
    };
    let valid_cells = grids.iter().map(|(_, g)| g.valid_count()).sum();
    let selected = selected_model(&grids, &selection, names)?;

    Ok(StageResult {
        code: StageCode::from_selection(&selection),
        selected,
        cells,
        valid_cells,
        widened,
    })
}

fn select_owned(grids: &[(CovariateSlot, ModelGrid)]) -> Option<Selection> {
    let borrowed: Vec<(CovariateSlot, &ModelGrid)> = grids.iter().map(|(s, g)| (*s, g)).collect();
    select(&borrowed)
}

fn selected_model(
    grids: &[(CovariateSlot, ModelGrid)],
    selection: &Selection,
    names: &CovariateNames,
) -> Result<SelectedModel, DecorError> {
    let pick = selection.chosen;
    let cell = grids
        .iter()
        .find(|(slot, _)| *slot == pick.slot)
        .and_then(|(_, grid)| grid.cell(pick.coord))
        .ok_or_else(|| DecorError::invalid_input("selected grid cell is missing"))?;
    let model = cell
        .model
        .clone()
        .ok_or_else(|| DecorError::invalid_input("selected grid cell has no model"))?;
    Ok(SelectedModel {
        slot: pick.slot,
        covariate: names.slot(pick.slot).to_string(),
        coord: pick.coord,
        knot_spacing: cell.knot_spacing,
        phase_shift: cell.phase_shift,
        order: cell.order,
        aic: cell.aic,
        bic: cell.bic,
        likelihood: cell.likelihood,
        decision: selection.decision,
        model,
    })
}

fn describe(slots: &[CovariateSlot], names: &CovariateNames) -> String {
    slots
        .iter()
        .map(|&s| names.slot(s))
        .collect::<Vec<_>>()
        .join(", ")
}
