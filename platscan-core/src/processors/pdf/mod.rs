// PDF processor
//
// Opens a scanned PDF through a ContainerReader, OCRs every embedded page
// image and folds the results into one DocumentRecord.

pub mod backends;
pub mod extractor;

pub use extractor::{ImageOutcome, PageExtractor, PageResult};

use crate::error::PipelineError;
use crate::logging::EventLog;
use crate::ocr::OcrEngine;
use crate::processors::processor::DocumentProcessor;
use crate::types::{DocumentRecord, SourceDocument};
use backends::{Container, ContainerReader};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;

pub struct PdfProcessor {
    source: SourceDocument,
    log: Arc<dyn EventLog>,
    engine: Arc<dyn OcrEngine>,
    reader: Arc<dyn ContainerReader>,
    use_text_layer: bool,
}

impl PdfProcessor {
    pub fn new(
        source: SourceDocument,
        log: Arc<dyn EventLog>,
        engine: Arc<dyn OcrEngine>,
        reader: Arc<dyn ContainerReader>,
    ) -> Self {
        Self {
            source,
            log,
            engine,
            reader,
            use_text_layer: true,
        }
    }

    /// Whether native text layers are put ahead of OCR text
    pub fn with_text_layer(mut self, enabled: bool) -> Self {
        self.use_text_layer = enabled;
        self
    }

    fn assemble(&self, container: &dyn Container, pages: &[PageResult]) -> DocumentRecord {
        let path = self.source.display_path();

        let text = pages
            .iter()
            .map(|page| page.text(self.use_text_layer))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let file_metadata: Map<String, Value> = container
            .metadata()
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();

        let mut metadata = Map::new();
        metadata.insert("path".to_string(), json!(path));
        metadata.insert("pdf_file_metadata".to_string(), Value::Object(file_metadata));
        metadata.insert("page_count".to_string(), json!(pages.len()));
        for page in pages {
            metadata.insert(format!("page_{}", page.index), page.metadata());
        }

        DocumentRecord::new(path, text).with_metadata(metadata)
    }
}

impl DocumentProcessor for PdfProcessor {
    fn process(&self) -> Result<DocumentRecord, PipelineError> {
        let path = self.source.display_path();
        self.log.info(&format!("Processing PDF: {path}"));
        let start = Instant::now();

        let container = self.reader.open(self.source.path())?;
        let extractor = PageExtractor::new(self.engine.clone(), self.log.clone(), path.as_str());
        let pages = extractor.extract_all(container.as_ref());

        let recognized: usize = pages.iter().map(|p| p.recognized().count()).sum();
        let failed: usize = pages.iter().map(|p| p.failure_count()).sum();
        self.log.info(&format!(
            "Finished {path}: {} pages, {recognized} images recognized, {failed} failed in {:.0}ms",
            pages.len(),
            start.elapsed().as_millis()
        ));

        Ok(self.assemble(container.as_ref(), &pages))
    }

    fn name(&self) -> &str {
        "pdf"
    }
}
