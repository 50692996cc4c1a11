//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and initialises logging
//! - parses CLI arguments and builds the run configuration
//! - ingests or simulates photometry, or reads back a model file
//! - runs segmentation and correction
//! - prints reports and writes optional exports

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use log::{debug, info};

use crate::cli::{
    Cli, Command, CorrectArgs, InspectArgs, SearchOverrides, SegmentArgs, SegmentOverrides, SimulateArgs,
};
use crate::data::{SyntheticSpec, generate};
use crate::domain::{CorrectionMode, DecorConfig, LightCurve};
use crate::error::DecorError;
use crate::fit::CancelToken;
use crate::io::{self, ModelFile};
use crate::report::{RunStats, format_model_file, format_run_summary, format_segment_table};

pub mod pipeline;

/// Entry point for the `decor` binary.
pub fn run() -> Result<(), DecorError> {
    run_from(std::env::args())
}

/// Same as [`run`] with an explicit argv.
pub fn run_from<I, T>(argv: I) -> Result<(), DecorError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse_from(argv);
    init_logging(cli.verbose);

    match cli.command {
        Command::Segment(args) => handle_segment(args),
        Command::Correct(args) => handle_correct(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    // try_init: a second call (tests, embedding) keeps the first logger.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).try_init();
}

fn handle_segment(args: SegmentArgs) -> Result<(), DecorError> {
    let mut config = load_config(args.config.as_deref())?;
    apply_segment_overrides(&mut config, &args.segment);
    config.validate()?;

    let ingest = io::load_light_curve(&args.input, &args.columns.spec(false))?;
    report_ingest(&ingest);

    let segmentation = pipeline::run_segmentation(&ingest.curve, &config)?;
    println!("{}", format_segment_table(&ingest.curve, &segmentation));

    if let Some(path) = &args.export {
        io::write_segmentation_json(path, &segmentation)?;
        info!("wrote segmentation to {}", path.display());
    }
    Ok(())
}

fn handle_correct(args: CorrectArgs) -> Result<(), DecorError> {
    let config = config_from_correct_args(&args)?;
    let with_covariates = config.mode == CorrectionMode::Bivariate;
    let ingest = io::load_light_curve(&args.input, &args.columns.spec(with_covariates))?;
    report_ingest(&ingest);

    let cancel = cancel_token(args.timeout)?;
    correct_and_report(&ingest.curve, &config, &cancel, &args)
}

fn handle_simulate(args: SimulateArgs) -> Result<(), DecorError> {
    let spec = SyntheticSpec {
        seed: args.seed,
        passes: args.passes,
        samples_per_pass: args.samples_per_pass,
        drift_rate: args.drift_rate,
        flux_noise: args.noise,
        ..SyntheticSpec::default()
    };
    let simulated = generate(&spec)?;
    io::write_light_curve_csv(&args.output, &simulated.curve)?;
    info!(
        "wrote {} synthetic samples to {}",
        simulated.curve.len(),
        args.output.display()
    );

    if args.correct {
        let config = DecorConfig::default();
        let output = pipeline::run_correction(&simulated.curve, &config, &CancelToken::new())?;
        let stats = RunStats::from_run(&simulated.curve, &output);
        println!("{}", format_run_summary(&simulated.curve, &config, &output, &stats));
    }
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<(), DecorError> {
    let model = io::read_model_json(&args.input)?;
    info!(
        "model file v{} written by {} at {}",
        model.format_version, model.tool, model.created_at
    );
    println!("{}", format_model_file(&model));
    Ok(())
}

fn correct_and_report(
    curve: &LightCurve,
    config: &DecorConfig,
    cancel: &CancelToken,
    args: &CorrectArgs,
) -> Result<(), DecorError> {
    let output = pipeline::run_correction(curve, config, cancel)?;
    let stats = RunStats::from_run(curve, &output);
    println!("{}", format_run_summary(curve, config, &output, &stats));

    if let Some(path) = &args.export {
        io::write_corrected_csv(path, curve, &output)?;
        info!("wrote corrected flux to {}", path.display());
    }
    if let Some(path) = &args.export_segments {
        io::write_segments_csv(path, &output)?;
        info!("wrote segment table to {}", path.display());
    }
    if let Some(path) = &args.export_model {
        let model = ModelFile::from_run(config, &curve.names, curve.len(), &output, Utc::now());
        io::write_model_json(path, &model)?;
        info!("wrote model file to {}", path.display());
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<DecorConfig, DecorError> {
    match path {
        Some(p) => {
            debug!("loading config from {}", p.display());
            DecorConfig::from_json_file(p)
        }
        None => Ok(DecorConfig::default()),
    }
}

/// Config file (or defaults) with the command-line overrides applied.
pub fn config_from_correct_args(args: &CorrectArgs) -> Result<DecorConfig, DecorError> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    apply_segment_overrides(&mut config, &args.segment);
    apply_search_overrides(&mut config, &args.search);
    config.validate()?;
    Ok(config)
}

fn apply_segment_overrides(config: &mut DecorConfig, o: &SegmentOverrides) {
    let s = &mut config.segment;
    if let Some(v) = o.drift_threshold {
        s.drift_threshold = v;
    }
    if let Some(v) = o.slope_window {
        s.slope_window = v;
    }
    if o.include_gaps {
        s.include_gaps = true;
    }
    if let Some(v) = o.gap_size {
        s.gap_size = v;
    }
    if let Some(v) = o.min_bin_length {
        s.min_bin_length = v;
    }
}

fn apply_search_overrides(config: &mut DecorConfig, o: &SearchOverrides) {
    let s = &mut config.search;
    if let Some(v) = &o.spacings {
        s.spacings = v.clone();
    }
    if let Some(v) = o.phase_step {
        s.phase_step = v;
    }
    if let Some(v) = &o.orders {
        s.orders = v.clone();
    }
    if o.periodic {
        s.periodic = true;
    }
    if o.no_widen {
        s.widen_factor = None;
    }
}

fn cancel_token(timeout: Option<f64>) -> Result<CancelToken, DecorError> {
    match timeout {
        None => Ok(CancelToken::new()),
        Some(secs) if secs.is_finite() && secs > 0.0 => Ok(CancelToken::with_timeout(Duration::from_secs_f64(secs))),
        Some(secs) => Err(DecorError::config(format!("timeout must be a positive number of seconds, got {secs}"))),
    }
}

fn report_ingest(ingest: &io::IngestedCurve) {
    for e in ingest.row_errors.iter().take(10) {
        debug!("line {}: {}", e.line, e.message);
    }
    let stats = &ingest.stats;
    info!(
        "using {} of {} rows: {} samples over [{:.5}, {:.5}], mean flux {:.4}",
        ingest.rows_used, ingest.rows_read, stats.n_samples, stats.t_min, stats.t_max, stats.flux_mean
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correct_args(extra: &[&str]) -> CorrectArgs {
        let mut argv = vec!["decor", "correct", "-i", "run.csv"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Correct(args) => args,
            _ => panic!("expected correct"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = config_from_correct_args(&correct_args(&[
            "--drift-threshold",
            "1.5",
            "--phase-step",
            "0.05",
            "--no-widen",
            "--periodic",
        ]))
        .unwrap();
        assert_eq!(cfg.segment.drift_threshold, 1.5);
        assert_eq!(cfg.search.phase_step, 0.05);
        assert_eq!(cfg.search.widen_factor, None);
        assert!(cfg.search.periodic);
        assert_eq!(cfg.search.orders, vec![3]);
    }

    #[test]
    fn invalid_override_is_a_config_error() {
        let err = config_from_correct_args(&correct_args(&["--spacings", "0.5,-1"])).unwrap_err();
        assert!(matches!(err, DecorError::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn timeout_must_be_positive() {
        assert!(cancel_token(Some(0.0)).is_err());
        assert!(cancel_token(Some(1.5)).is_ok());
        assert!(!cancel_token(None).unwrap().is_cancelled());
    }
}
