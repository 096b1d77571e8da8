// Platscan Core Library
//
// Scanned document ingestion: OCR of every embedded page image, record
// assembly and fan-out to pluggable storage writers.

pub mod config;
pub mod error;
pub mod logging;
pub mod ocr;
pub mod orchestrator;
pub mod processors;
pub mod types;
pub mod writers;

// Re-export main types and functions for easy use
pub use types::*;
pub use config::{PipelineConfig, WriterConfig};
pub use error::{ErrorKind, PipelineError};
pub use logging::{EventLog, MemoryLog, Severity, TracingLog};
pub use ocr::{OcrEngine, TesseractEngine};
pub use orchestrator::{
    BatchReport, DocumentOrchestrator, DocumentOutcome, DocumentReport, OrchestratorOptions,
    ProcessorFactory,
};
pub use processors::{DocumentProcessor, ImageProcessor, PdfProcessor};
pub use writers::{build_writers, FileWriter, StorageWriter};

// Re-export backends for direct use
pub use processors::{Container, ContainerReader, LopdfReader};

#[cfg(feature = "mongo")]
pub use writers::MongoCollection;
