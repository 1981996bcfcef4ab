//! Error taxonomy shared by the vendor parsers, the transform engine and
//! the measurement layer.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NmrError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Not an NMR file: {0}")]
    NotAnNmrFile(String),
    #[error("Unsupported spectrum type: {0}")]
    UnsupportedSpectrumType(String),
    #[error("Unsupported dimension: {0}")]
    UnsupportedDimension(String),
    #[error("Unsupported element type: {0}")]
    UnsupportedType(String),
    #[error("Data truncated: need {needed} bytes at offset {offset}, buffer holds {available}")]
    TruncatedData {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("Missing parameter: {0}")]
    MissingParameter(String),
    #[error("Invalid value for parameter {name}: {value:?}")]
    InvalidParameter { name: String, value: String },
    #[error("No anchor integral has been recorded")]
    MissingAnchor,
    #[error("Invalid conversion: {0}")]
    InvalidConversion(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NmrError>;
