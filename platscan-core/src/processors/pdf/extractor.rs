//! Page/image extraction for multi-page containers.
//!
//! Walks every page of an opened container, runs OCR on each embedded image
//! and isolates failures to the image that caused them.

use super::backends::Container;
use crate::error::ImageExtractionError;
use crate::logging::EventLog;
use crate::ocr::OcrEngine;
use crate::types::{EmbeddedImage, ExtractedPage, RecognizedImage};
use serde_json::{json, Value};
use std::sync::Arc;

/// What happened to one embedded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Recognized(RecognizedImage),
    Failed { image_index: usize, error: String },
}

/// OCR results for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    pub index: usize,
    pub text_layer: Option<String>,
    pub images: Vec<ImageOutcome>,
}

impl PageResult {
    /// Page text: the text layer (when enabled) followed by each image's
    /// recognized text, newline-joined. Empty fragments are skipped.
    pub fn text(&self, use_text_layer: bool) -> String {
        let layer = self
            .text_layer
            .as_deref()
            .filter(|_| use_text_layer)
            .into_iter();
        let images = self.images.iter().filter_map(|outcome| match outcome {
            ImageOutcome::Recognized(image) => Some(image.text.as_str()),
            ImageOutcome::Failed { .. } => None,
        });

        layer
            .chain(images)
            .filter(|fragment| !fragment.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn recognized(&self) -> impl Iterator<Item = &RecognizedImage> {
        self.images.iter().filter_map(|outcome| match outcome {
            ImageOutcome::Recognized(image) => Some(image),
            ImageOutcome::Failed { .. } => None,
        })
    }

    pub fn failure_count(&self) -> usize {
        self.images
            .iter()
            .filter(|o| matches!(o, ImageOutcome::Failed { .. }))
            .count()
    }

    /// Page-level metadata stored under the page's key in the record
    pub fn metadata(&self) -> Value {
        let images: Vec<Value> = self
            .images
            .iter()
            .map(|outcome| match outcome {
                ImageOutcome::Recognized(image) => json!({
                    "index": image.image_index,
                    "format": image.kind.as_str(),
                    "char_count": image.text.chars().count(),
                }),
                ImageOutcome::Failed { image_index, error } => json!({
                    "index": image_index,
                    "error": error,
                }),
            })
            .collect();

        json!({
            "image_count": self.images.len(),
            "has_text_layer": self.text_layer.is_some(),
            "images": images,
        })
    }
}

pub struct PageExtractor {
    engine: Arc<dyn OcrEngine>,
    log: Arc<dyn EventLog>,
    /// Source path, only used in log messages
    source: String,
}

impl PageExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, log: Arc<dyn EventLog>, source: impl Into<String>) -> Self {
        Self {
            engine,
            log,
            source: source.into(),
        }
    }

    /// Every page in container order
    pub fn extract_all(&self, container: &dyn Container) -> Vec<PageResult> {
        (0..container.page_count())
            .map(|index| self.extract_page(container.page(index)))
            .collect()
    }

    pub fn extract_page(&self, page: ExtractedPage) -> PageResult {
        let page_index = page.index;
        let mut images = Vec::with_capacity(page.images.len());

        for (image_index, slot) in page.images.into_iter().enumerate() {
            match slot.and_then(|image| self.recognize(page_index, image_index, image)) {
                Ok(recognized) => images.push(ImageOutcome::Recognized(recognized)),
                Err(e) => {
                    let error = format!(
                        "Unable to extract image {image_index} on page {page_index} of {}: {e}",
                        self.source
                    );
                    self.log.warning(&error);
                    images.push(ImageOutcome::Failed { image_index, error });
                }
            }
        }

        PageResult {
            index: page_index,
            text_layer: page.text_layer,
            images,
        }
    }

    fn recognize(
        &self,
        page_index: usize,
        image_index: usize,
        image: EmbeddedImage,
    ) -> Result<RecognizedImage, ImageExtractionError> {
        let text = self.engine.recognize(&image)?;
        Ok(RecognizedImage {
            page_index,
            image_index,
            kind: image.kind,
            text,
        })
    }
}
