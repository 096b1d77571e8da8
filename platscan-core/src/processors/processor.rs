// Document processor abstraction
//
// This module defines the boundary between format-specific extraction
// (PDF pages, standalone images -> text and metadata) and persistence
// (DocumentRecord -> storage writers). Everything downstream of a processor
// works with DocumentRecord and is format-agnostic.

use crate::error::PipelineError;
use crate::types::DocumentRecord;

/// Processor trait - converts one source file to a DocumentRecord
///
/// A processor is constructed for exactly one `SourceDocument` and does no
/// work until `process` is called. Each call is a full pipeline run; no
/// state is carried from one call to the next.
///
/// Failures local to an embedded image are absorbed inside `process`; only
/// failures that make the whole file unusable are returned as errors.
pub trait DocumentProcessor: Send {
    /// Run extraction and OCR for the source file
    fn process(&self) -> Result<DocumentRecord, PipelineError>;

    /// Get processor name for debugging/logging
    fn name(&self) -> &str;
}
