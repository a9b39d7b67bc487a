use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SummarySplitError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{program} exited with {status}: {stderr}")]
    ClumpFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("clumping produced no output file {0:?}")]
    MissingClumpOutput(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SummarySplitError>;
