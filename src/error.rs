use crate::config::ConfigError;
use crate::entity::{AutoDetectError, ConversionError};
use crate::format::FormatError;
use crate::metrics::ComputationError;
use crate::reporter::ScoreParseError;
use crate::results::RecordError;
use crate::selection::SelectionError;
use std::io;
use thiserror::Error;

/// Every error the library can return.
#[derive(Debug, Error)]
pub enum NerScoreError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    AutoDetect(#[from] AutoDetectError),
    #[error(transparent)]
    Computation(#[from] ComputationError),
    #[error(transparent)]
    ScoreParse(#[from] ScoreParseError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, NerScoreError>;
