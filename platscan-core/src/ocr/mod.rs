//! OCR engines.
//!
//! The pipeline treats OCR as an opaque service: given encoded image bytes,
//! return the recognized text. `TesseractEngine` drives the tesseract
//! command-line binary; tests plug in their own `OcrEngine`.

pub mod tesseract;

pub use tesseract::TesseractEngine;

use crate::config::{OcrConfig, OcrEngineKind};
use crate::error::OcrError;
use crate::types::EmbeddedImage;
use std::sync::Arc;

/// Recognizes text in a single image.
pub trait OcrEngine: Send + Sync {
    /// Engine identifier for logging
    fn name(&self) -> &str;

    /// Run recognition. An image with no legible text yields `Ok("")`.
    fn recognize(&self, image: &EmbeddedImage) -> Result<String, OcrError>;
}

/// Build the engine selected in the config.
pub fn engine_from_config(config: &OcrConfig) -> Arc<dyn OcrEngine> {
    match config.engine {
        OcrEngineKind::Tesseract => Arc::new(TesseractEngine::with_config(config.clone())),
    }
}
