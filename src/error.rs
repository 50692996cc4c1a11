//! Crate-wide error type.
//!
//! Degenerate spline fits are *not* errors: they are recorded per grid cell
//! (see `fit::grid`). Only conditions that stop an operation end up here.

use std::fmt;

/// Which of the two sequential correction rounds a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    First,
    Second,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::First => write!(f, "first"),
            Stage::Second => write!(f, "second"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DecorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(
        "no valid model for covariate '{covariate}' in the {stage} correction: all {cells} grid cells are degenerate under both criteria"
    )]
    NoValidModel {
        stage: Stage,
        covariate: String,
        cells: usize,
    },
    #[error("cancelled: {0}")]
    Cancelled(String),
    #[error("config: {0}")]
    Config(String),
    #[error("i/o: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
}

impl DecorError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Process exit code for the `decor` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            DecorError::InvalidInput(_)
            | DecorError::Config(_)
            | DecorError::Io(_)
            | DecorError::Parse(_) => 2,
            DecorError::NoValidModel { .. } => 3,
            DecorError::Cancelled(_) => 4,
        }
    }
}
