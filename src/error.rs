use crate::tree::ParseError;
use std::path::PathBuf;
use thiserror::Error;

pub type ReportResult<T> = Result<T, ReportError>;

/// Errors raised while building the annotation and summary reports
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Missing input: {0}")]
    MissingInput(PathBuf),

    #[error("Malformed JSON in {file}: {detail}")]
    MalformedJson { file: String, detail: String },

    #[error("Topology mismatch: {0}")]
    TopologyMismatch(String),

    #[error("Tree parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    #[error("Alignment error: {0}")]
    Alignment(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub(crate) fn malformed(file: impl Into<String>, detail: impl Into<String>) -> Self {
        ReportError::MalformedJson {
            file: file.into(),
            detail: detail.into(),
        }
    }
}
