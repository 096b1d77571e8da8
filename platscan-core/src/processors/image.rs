// Standalone image processor
//
// One file, one decoded image, one OCR call. The record carries the raw
// recognized text and no metadata.

use crate::error::PipelineError;
use crate::logging::EventLog;
use crate::ocr::OcrEngine;
use crate::processors::processor::DocumentProcessor;
use crate::types::{DocumentRecord, EmbeddedImage, ImageKind, SourceDocument};
use std::sync::Arc;

pub struct ImageProcessor {
    source: SourceDocument,
    log: Arc<dyn EventLog>,
    engine: Arc<dyn OcrEngine>,
}

impl ImageProcessor {
    pub fn new(source: SourceDocument, log: Arc<dyn EventLog>, engine: Arc<dyn OcrEngine>) -> Self {
        Self { source, log, engine }
    }

    fn unreadable(&self, reason: impl ToString) -> PipelineError {
        PipelineError::UnreadableImage {
            path: self.source.path().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Read and validate the file. The bytes go to OCR as-is; decoding only
    /// proves they are an image.
    fn load(&self) -> Result<EmbeddedImage, PipelineError> {
        let bytes = std::fs::read(self.source.path()).map_err(|e| self.unreadable(e))?;

        let kind = ::image::guess_format(&bytes)
            .ok()
            .and_then(ImageKind::from_image_format)
            .unwrap_or(ImageKind::Png);
        ::image::load_from_memory(&bytes).map_err(|e| self.unreadable(e))?;

        Ok(EmbeddedImage::new(bytes, kind))
    }
}

impl DocumentProcessor for ImageProcessor {
    fn process(&self) -> Result<DocumentRecord, PipelineError> {
        let path = self.source.display_path();
        self.log.info(&format!("Processing image: {path}"));

        let image = self.load()?;
        let text = match self.engine.recognize(&image) {
            Ok(text) => text,
            Err(e) => {
                // Same granularity as an embedded PDF image: warn, keep going
                self.log.warning(&format!("Unable to recognize {path}: {e}"));
                String::new()
            }
        };

        Ok(DocumentRecord::new(path, text))
    }

    fn name(&self) -> &str {
        "image"
    }
}
