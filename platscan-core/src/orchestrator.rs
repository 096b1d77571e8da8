use crate::config::{PipelineConfig, ProcessingConfig};
use crate::error::{ErrorKind, PipelineError};
use crate::logging::EventLog;
use crate::ocr::{engine_from_config, OcrEngine};
use crate::processors::{ContainerReader, DocumentProcessor, ImageProcessor, LopdfReader, PdfProcessor};
use crate::types::{DocumentRecord, SourceDocument, SourceFormat};
use crate::writers::{build_writers, StorageWriter};
use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

/// Builds a fresh processor for each source document
#[derive(Clone)]
pub struct ProcessorFactory {
    engine: Arc<dyn OcrEngine>,
    reader: Arc<dyn ContainerReader>,
    use_text_layer: bool,
}

impl ProcessorFactory {
    pub fn new(engine: Arc<dyn OcrEngine>, reader: Arc<dyn ContainerReader>) -> Self {
        Self {
            engine,
            reader,
            use_text_layer: true,
        }
    }

    /// Engine from the `ocr` section, lopdf for containers
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(engine_from_config(&config.ocr), Arc::new(LopdfReader::new()))
            .with_text_layer(config.pipeline.use_text_layer)
    }

    pub fn with_text_layer(mut self, enabled: bool) -> Self {
        self.use_text_layer = enabled;
        self
    }

    /// Dispatch on the source's format tag. Construction does no work.
    pub fn for_source(
        &self,
        source: &SourceDocument,
        log: Arc<dyn EventLog>,
    ) -> Result<Box<dyn DocumentProcessor>, PipelineError> {
        match source.format() {
            SourceFormat::Pdf => Ok(Box::new(
                PdfProcessor::new(source.clone(), log, self.engine.clone(), self.reader.clone())
                    .with_text_layer(self.use_text_layer),
            )),
            SourceFormat::Png => Ok(Box::new(ImageProcessor::new(
                source.clone(),
                log,
                self.engine.clone(),
            ))),
            SourceFormat::Unsupported(_) => Err(PipelineError::UnsupportedFormat {
                path: source.path().to_path_buf(),
                extension: source.format().to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Per-document limit on `process()`; `None` waits forever
    pub document_timeout: Option<Duration>,
    /// Documents processed concurrently
    pub workers: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from_config(&ProcessingConfig::default())
    }
}

impl OrchestratorOptions {
    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self {
            document_timeout: config.document_timeout(),
            workers: config.workers.max(1),
        }
    }

    pub fn sequential() -> Self {
        Self {
            document_timeout: None,
            workers: 1,
        }
    }
}

/// Terminal state of one input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// Every writer was invoked once
    Persisted { succeeded: usize, failed: usize },
    /// Processed, but neither text nor metadata came out
    Dropped,
    Skipped { extension: String },
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub path: String,
    #[serde(flatten)]
    pub outcome: DocumentOutcome,
}

/// Outcomes of one batch, in input order
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
    pub elapsed_ms: u128,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.documents.len()
    }

    pub fn persisted(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Persisted { .. }))
    }

    pub fn dropped(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Dropped))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Failed { .. }))
    }

    /// Writer calls that returned `false`, across all documents
    pub fn write_failures(&self) -> usize {
        self.documents
            .iter()
            .map(|d| match d.outcome {
                DocumentOutcome::Persisted { failed, .. } => failed,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, predicate: impl Fn(&DocumentOutcome) -> bool) -> usize {
        self.documents.iter().filter(|d| predicate(&d.outcome)).count()
    }
}

/// Drives every input file through dispatch, processing and writer fan-out.
pub struct DocumentOrchestrator {
    factory: ProcessorFactory,
    writers: Vec<Box<dyn StorageWriter>>,
    log: Arc<dyn EventLog>,
    options: OrchestratorOptions,
}

impl DocumentOrchestrator {
    /// Create DocumentOrchestrator with full dependency injection
    pub fn new_with_dependencies(
        factory: ProcessorFactory,
        writers: Vec<Box<dyn StorageWriter>>,
        log: Arc<dyn EventLog>,
        options: OrchestratorOptions,
    ) -> Self {
        let options = serialize_for_shared_writers(options, &writers, log.as_ref());
        Self {
            factory,
            writers,
            log,
            options,
        }
    }

    /// Convenience constructor: tesseract, lopdf and the configured writers
    pub fn from_config(config: &PipelineConfig, log: Arc<dyn EventLog>) -> Result<Self> {
        let writers = build_writers(&config.writers, log.as_ref())?;
        Ok(Self::new_with_dependencies(
            ProcessorFactory::from_config(config),
            writers,
            log,
            OrchestratorOptions::from_config(&config.pipeline),
        ))
    }

    pub fn writers(&self) -> &[Box<dyn StorageWriter>] {
        &self.writers
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Run one file to its terminal state. Never panics on bad input and
    /// never returns an error: everything is folded into the outcome.
    pub fn process_path(&self, path: impl AsRef<Path>) -> DocumentOutcome {
        let source = SourceDocument::new(path.as_ref());
        let display = source.display_path();

        if !source.exists() {
            return self.fail(PipelineError::NotFound(source.path().to_path_buf()));
        }

        let processor = match self.factory.for_source(&source, self.log.clone()) {
            Ok(processor) => processor,
            Err(PipelineError::UnsupportedFormat { extension, .. }) => {
                self.log.warning(&format!(
                    "File type {extension} not implemented for plat analysis {display}"
                ));
                return DocumentOutcome::Skipped { extension };
            }
            Err(e) => return self.fail(e),
        };

        let record = match self.run(processor, &source) {
            Ok(record) => record,
            Err(e) => return self.fail(e),
        };

        if !record.is_persistable() {
            self.log
                .info(&format!("Nothing extracted from {display}, not persisting"));
            return DocumentOutcome::Dropped;
        }

        let mut succeeded = 0;
        let mut failed = 0;
        for writer in &self.writers {
            if writer.save(&record, self.log.as_ref()) {
                succeeded += 1;
            } else {
                failed += 1;
            }
        }

        DocumentOutcome::Persisted { succeeded, failed }
    }

    /// Process every path; one report per path, input order preserved.
    pub fn process_batch<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> BatchReport {
        let start = Instant::now();
        self.log.info(&format!(
            "Processing {} files with {} worker(s)",
            paths.len(),
            self.options.workers
        ));

        let report_for = |path: &P| DocumentReport {
            path: path.as_ref().to_string_lossy().to_string(),
            outcome: self.process_path(path),
        };

        let documents: Vec<DocumentReport> = if self.options.workers > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.workers)
                .build()
            {
                Ok(pool) => pool.install(|| paths.par_iter().map(report_for).collect::<Vec<_>>()),
                Err(e) => {
                    self.log
                        .warning(&format!("Unable to start worker pool, running sequentially: {e}"));
                    paths.iter().map(report_for).collect()
                }
            }
        } else {
            paths.iter().map(report_for).collect()
        };

        let report = BatchReport {
            documents,
            elapsed_ms: start.elapsed().as_millis(),
        };
        self.log.info(&format!(
            "Batch finished in {}ms: {} persisted, {} dropped, {} skipped, {} failed",
            report.elapsed_ms,
            report.persisted(),
            report.dropped(),
            report.skipped(),
            report.failed()
        ));
        report
    }

    fn run(
        &self,
        processor: Box<dyn DocumentProcessor>,
        source: &SourceDocument,
    ) -> Result<DocumentRecord, PipelineError> {
        let path = source.path().to_path_buf();
        let Some(limit) = self.options.document_timeout else {
            return process_contained(processor.as_ref(), &path);
        };

        // The worker thread is abandoned on timeout; it finishes (or not) on
        // its own and its result is discarded.
        let (tx, rx) = mpsc::channel();
        let worker_path = path.clone();
        thread::Builder::new()
            .name(format!("platscan-{}", source.file_name()))
            .spawn(move || {
                let _ = tx.send(process_contained(processor.as_ref(), &worker_path));
            })?;

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(PipelineError::Timeout { path, limit }),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(PipelineError::Panicked {
                path,
                message: "worker thread exited without a result".to_string(),
            }),
        }
    }

    fn fail(&self, error: PipelineError) -> DocumentOutcome {
        let message = error.to_string();
        self.log.error(&message);
        DocumentOutcome::Failed {
            kind: error.kind(),
            message,
        }
    }
}

/// A writer with one fixed destination cannot take concurrent saves; drop to
/// a single worker when one is configured.
fn serialize_for_shared_writers(
    mut options: OrchestratorOptions,
    writers: &[Box<dyn StorageWriter>],
    log: &dyn EventLog,
) -> OrchestratorOptions {
    if options.workers > 1 {
        if let Some(shared) = writers.iter().find(|w| w.shares_destination()) {
            log.warning(&format!(
                "{} writes every document to the same destination, running with 1 worker instead of {}",
                shared.describe(),
                options.workers
            ));
            options.workers = 1;
        }
    }
    options
}

/// Run `process()`, folding a panic into a document-level failure
fn process_contained(processor: &dyn DocumentProcessor, path: &Path) -> Result<DocumentRecord, PipelineError> {
    panic::catch_unwind(AssertUnwindSafe(|| processor.process())).unwrap_or_else(|payload| {
        Err(PipelineError::Panicked {
            path: path.to_path_buf(),
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::logging::{MemoryLog, Severity};
    use crate::types::EmbeddedImage;

    struct NullOcr;

    impl OcrEngine for NullOcr {
        fn name(&self) -> &str {
            "null"
        }

        fn recognize(&self, _image: &EmbeddedImage) -> Result<String, OcrError> {
            Ok(String::new())
        }
    }

    fn orchestrator(log: Arc<MemoryLog>) -> DocumentOrchestrator {
        DocumentOrchestrator::new_with_dependencies(
            ProcessorFactory::new(Arc::new(NullOcr), Arc::new(LopdfReader::new())),
            Vec::new(),
            log,
            OrchestratorOptions::sequential(),
        )
    }

    #[test]
    fn test_factory_dispatch_is_case_insensitive() {
        let factory = ProcessorFactory::new(Arc::new(NullOcr), Arc::new(LopdfReader::new()));
        let log: Arc<dyn EventLog> = Arc::new(MemoryLog::new());

        let pdf = factory.for_source(&SourceDocument::new("A.PDF"), log.clone()).unwrap();
        assert_eq!(pdf.name(), "pdf");
        let png = factory.for_source(&SourceDocument::new("scan.PnG"), log.clone()).unwrap();
        assert_eq!(png.name(), "image");
        assert!(matches!(
            factory.for_source(&SourceDocument::new("c.docx"), log),
            Err(PipelineError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_failed_not_found() {
        let log = Arc::new(MemoryLog::new());
        let outcome = orchestrator(log.clone()).process_path("/nonexistent/plat.pdf");

        assert!(matches!(
            outcome,
            DocumentOutcome::Failed { kind: ErrorKind::NotFound, .. }
        ));
        assert_eq!(log.count(Severity::Error), 1);
    }

    #[test]
    fn test_unopenable_pdf_is_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.pdf");
        std::fs::write(&path, b"GIF89a torn scan, not a pdf").unwrap();

        let log = Arc::new(MemoryLog::new());
        let outcome = orchestrator(log.clone()).process_path(&path);
        assert!(matches!(
            outcome,
            DocumentOutcome::Failed { kind: ErrorKind::UnopenablePdf, .. }
        ));
    }

    #[test]
    fn test_options_from_config() {
        let config = ProcessingConfig {
            use_text_layer: true,
            workers: 0,
            document_timeout_secs: Some(0),
        };
        let options = OrchestratorOptions::from_config(&config);
        assert_eq!(options.workers, 1);
        assert_eq!(options.document_timeout, None);
    }

    #[test]
    fn test_report_counters() {
        let report = BatchReport {
            documents: vec![
                DocumentReport {
                    path: "a.pdf".to_string(),
                    outcome: DocumentOutcome::Persisted { succeeded: 1, failed: 1 },
                },
                DocumentReport {
                    path: "c.docx".to_string(),
                    outcome: DocumentOutcome::Skipped {
                        extension: ".docx".to_string(),
                    },
                },
                DocumentReport {
                    path: "blank.png".to_string(),
                    outcome: DocumentOutcome::Dropped,
                },
            ],
            elapsed_ms: 3,
        };
        assert_eq!(report.total(), 3);
        assert_eq!(report.persisted(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.dropped(), 1);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.write_failures(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["documents"][1]["status"], "skipped");
        assert_eq!(json["documents"][1]["extension"], ".docx");
    }
}
