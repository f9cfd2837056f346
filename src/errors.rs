use std::path::PathBuf;
use thiserror::Error;

use crate::loader::FormatKind;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for a captioning session.
///
/// Each variant carries the context of its error domain (selection, decoding,
/// persistence, inference, clipboard) so callers can react without parsing
/// error strings. Only `Selection` is recovered by the orchestrator; every other
/// variant ends the session.
#[derive(Error, Debug)]
pub enum BatchCaptionError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Selection error: could not present the file picker")]
    Selection {
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Persistence error: writing caption to {path:?} failed")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Caption engine error: {operation} failed")]
    CaptionEngine {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Clipboard error: could not replace clipboard contents")]
    Clipboard {
        #[source]
        source: BoxError,
    },
}

/// Failures turning a file on disk into a canonical RGB buffer.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported image format `{extension}` (file: {path:?})")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Could not read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt or undecodable {kind} image (file: {path:?})")]
    Corrupt {
        path: PathBuf,
        kind: FormatKind,
        #[source]
        source: BoxError,
    },

    #[error("Image {path:?} has {pixels} pixels, above the configured limit of {limit}")]
    ResourceLimit {
        path: PathBuf,
        pixels: u64,
        limit: u64,
    },
}

pub type Result<T> = std::result::Result<T, BatchCaptionError>;

impl BatchCaptionError {
    pub(crate) fn engine<E>(operation: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::CaptionEngine {
            operation: operation.into(),
            source: source.into(),
        }
    }
}

/// Convert anyhow errors to configuration errors.
///
/// Some startup helpers report through anyhow; they are converted to the
/// domain type at the library boundary.
impl From<anyhow::Error> for BatchCaptionError {
    fn from(err: anyhow::Error) -> Self {
        BatchCaptionError::Configuration {
            message: err.to_string(),
        }
    }
}

/// Convert ONNX Runtime errors to caption engine errors.
impl From<ort::Error> for BatchCaptionError {
    fn from(err: ort::Error) -> Self {
        Self::engine("ort operation", err)
    }
}

/// Convert ndarray shape errors to caption engine errors.
///
/// Shape errors only occur while building or reading inference tensors.
impl From<ndarray::ShapeError> for BatchCaptionError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::engine("tensor shape conversion", err)
    }
}
