//! Error taxonomy for the ingestion pipeline.
//!
//! Errors are split by the unit of work they belong to:
//! - `PipelineError` ends the run for one document (never the batch)
//! - `ImageExtractionError` is confined to one embedded image
//! - `WriterError` never leaves the writer that produced it

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Document-granular failures.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("File type {extension} not implemented for plat analysis: {}", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Unable to open PDF {}: {reason}", .path.display())]
    UnopenablePdf { path: PathBuf, reason: String },

    #[error("Unable to read image {}: {reason}", .path.display())]
    UnreadableImage { path: PathBuf, reason: String },

    #[error("Processing {} exceeded {}s", .path.display(), .limit.as_secs())]
    Timeout { path: PathBuf, limit: Duration },

    #[error("Processor for {} panicked: {message}", .path.display())]
    Panicked { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::NotFound(_) => ErrorKind::NotFound,
            PipelineError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            PipelineError::UnopenablePdf { .. } => ErrorKind::UnopenablePdf,
            PipelineError::UnreadableImage { .. } => ErrorKind::UnreadableImage,
            PipelineError::Timeout { .. } => ErrorKind::Timeout,
            PipelineError::Panicked { .. } => ErrorKind::Panicked,
            PipelineError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Flat tag for reporting outcomes without carrying the error itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    UnsupportedFormat,
    UnopenablePdf,
    UnreadableImage,
    Timeout,
    Panicked,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::UnopenablePdf => "UnopenablePDF",
            ErrorKind::UnreadableImage => "UnreadableImage",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Panicked => "Panicked",
            ErrorKind::Io => "Io",
        };
        f.write_str(name)
    }
}

/// Failure to pull one embedded image out of a page, or to recognize it.
#[derive(Error, Debug)]
pub enum ImageExtractionError {
    #[error("unsupported image encoding {0}")]
    UnsupportedEncoding(String),

    #[error("corrupt image data: {0}")]
    CorruptData(String),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("recognition failed: {0}")]
    Recognition(#[from] OcrError),
}

/// OCR engine failures.
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    EngineUnavailable(String),

    #[error("OCR failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage backend failures. Logged by the writer, never propagated.
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("insert was not acknowledged with an id")]
    NotAcknowledged,
}
