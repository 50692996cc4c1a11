//! Command-line parsing for the `decor` photometric detrender.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the segmentation and fitting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::CorrectionMode;
use crate::io::ColumnSpec;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "decor", version, about = "Segmented spline decorrelation of satellite photometry")]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Split a run into segments on its drift series and print the boundaries.
    Segment(SegmentArgs),
    /// Segment a run and correct every segment against its covariates.
    Correct(CorrectArgs),
    /// Write a synthetic light curve, optionally correcting it straight away.
    Simulate(SimulateArgs),
    /// Print the segments and spline models stored in a model file.
    Inspect(InspectArgs),
}

/// Which CSV columns to read.
#[derive(Debug, Args, Clone)]
pub struct ColumnArgs {
    /// Time column.
    #[arg(long, default_value = "time")]
    pub time_col: String,

    /// Flux column.
    #[arg(long, default_value = "flux")]
    pub flux_col: String,

    /// Drift column used for segmentation (e.g. detector temperature).
    #[arg(long, default_value = "temperature")]
    pub drift_col: String,

    /// First covariate column.
    #[arg(long, default_value = "xpos")]
    pub a_col: String,

    /// Second covariate column.
    #[arg(long, default_value = "ypos")]
    pub b_col: String,
}

impl ColumnArgs {
    /// Column spec; covariates are only required when `with_covariates`.
    pub fn spec(&self, with_covariates: bool) -> ColumnSpec {
        ColumnSpec {
            time: self.time_col.clone(),
            flux: self.flux_col.clone(),
            drift: self.drift_col.clone(),
            a: with_covariates.then(|| self.a_col.clone()),
            b: with_covariates.then(|| self.b_col.clone()),
        }
    }
}

/// Overrides of the segmentation criteria.
#[derive(Debug, Args, Clone, Default)]
pub struct SegmentOverrides {
    /// Drift threshold that closes a bin.
    #[arg(long)]
    pub drift_threshold: Option<f64>,

    /// Slope window (samples).
    #[arg(long)]
    pub slope_window: Option<usize>,

    /// Also close bins at timing gaps.
    #[arg(long)]
    pub include_gaps: bool,

    /// Gap length that closes a bin (with --include-gaps).
    #[arg(long)]
    pub gap_size: Option<f64>,

    /// Advisory minimum bin length.
    #[arg(long)]
    pub min_bin_length: Option<f64>,
}

/// Overrides of the model grid.
#[derive(Debug, Args, Clone, Default)]
pub struct SearchOverrides {
    /// Knot spacings, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub spacings: Option<Vec<f64>>,

    /// Phase shift step.
    #[arg(long)]
    pub phase_step: Option<f64>,

    /// Spline degrees, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub orders: Option<Vec<usize>>,

    /// Fit periodic splines.
    #[arg(long)]
    pub periodic: bool,

    /// Fail straight away instead of retrying with wider spacings.
    #[arg(long)]
    pub no_widen: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct SegmentArgs {
    /// Photometry CSV.
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    #[command(flatten)]
    pub columns: ColumnArgs,

    /// JSON configuration file; flags override its values.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub segment: SegmentOverrides,

    /// Write the segmentation (segments, smoothed drift, warnings) to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct CorrectArgs {
    /// Photometry CSV.
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    #[command(flatten)]
    pub columns: ColumnArgs,

    /// JSON configuration file; flags override its values.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Correct against both covariates or against the drift series only.
    #[arg(long, value_enum)]
    pub mode: Option<CorrectionMode>,

    #[command(flatten)]
    pub segment: SegmentOverrides,

    #[command(flatten)]
    pub search: SearchOverrides,

    /// Abort the run after this many seconds.
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Write per-sample corrected flux to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Write the per-segment table to CSV.
    #[arg(long = "export-segments", value_name = "CSV")]
    pub export_segments: Option<PathBuf>,

    /// Write the model file (config + selected splines) to JSON.
    #[arg(long = "export-model", value_name = "JSON")]
    pub export_model: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Output CSV.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of orbit passes.
    #[arg(long, default_value_t = 12)]
    pub passes: usize,

    /// Samples per pass.
    #[arg(long, default_value_t = 60)]
    pub samples_per_pass: usize,

    /// Temperature drift per day.
    #[arg(long, default_value_t = 3.0)]
    pub drift_rate: f64,

    /// Flux noise (standard deviation).
    #[arg(long, default_value_t = 0.3)]
    pub noise: f64,

    /// Correct the generated curve and print the summary.
    #[arg(long)]
    pub correct: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct InspectArgs {
    /// Model file written by `correct --export-model`.
    #[arg(short, long, value_name = "JSON")]
    pub input: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_correct_with_overrides() {
        let cli = Cli::parse_from([
            "decor",
            "correct",
            "-i",
            "run.csv",
            "--spacings",
            "0.5,1.0",
            "--orders",
            "3,5",
            "--mode",
            "univariate",
            "--include-gaps",
            "-v",
        ]);
        assert!(cli.verbose);
        let Command::Correct(args) = cli.command else {
            panic!("expected correct");
        };
        assert_eq!(args.search.spacings, Some(vec![0.5, 1.0]));
        assert_eq!(args.search.orders, Some(vec![3, 5]));
        assert_eq!(args.mode, Some(CorrectionMode::Univariate));
        assert!(args.segment.include_gaps);
        assert_eq!(args.columns.drift_col, "temperature");
    }

    #[test]
    fn parses_inspect() {
        let cli = Cli::parse_from(["decor", "inspect", "-i", "model.json"]);
        let Command::Inspect(args) = cli.command else {
            panic!("expected inspect");
        };
        assert_eq!(args.input, PathBuf::from("model.json"));
    }

    #[test]
    fn drift_only_column_spec_has_no_covariates() {
        let cli = Cli::parse_from(["decor", "segment", "-i", "run.csv", "--drift-col", "temp"]);
        let Command::Segment(args) = cli.command else {
            panic!("expected segment");
        };
        let spec = args.columns.spec(false);
        assert_eq!(spec.drift, "temp");
        assert!(spec.a.is_none() && spec.b.is_none());
    }
}
