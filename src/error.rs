use crate::document_model::AnnotationId;
use crate::view::ShapingError;
use thiserror::Error;

/// Errors surfaced by the editing engine.
///
/// Contract violations (bad offsets, unknown ids) are reported here. Expected
/// no-ops such as undo on an empty history are not errors and are reported
/// through boolean results instead.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("annotation not found: {0}")]
    NotFound(AnnotationId),

    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("shaping failed: {0}")]
    Shaping(#[from] ShapingError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EditorError {
    pub(crate) fn out_of_range(what: &str, value: usize, len: usize) -> Self {
        EditorError::InvalidArgument(format!("{what} {value} out of range (length {len})"))
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
