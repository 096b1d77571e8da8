//! Document Processors
//!
//! This module provides the processing layer that turns a source file into
//! a `DocumentRecord` ready for storage.
//!
//! ## Architecture
//!
//! ```text
//! Source file (PDF, PNG)
//!     ↓
//! [Format-specific Processor]
//!     ↓               ↘
//! [PageExtractor]    [OcrEngine]
//!     ↓
//! DocumentRecord (unified format)
//!     ↓
//! [Storage Writers]
//! ```
//!
//! ## Available Processors
//!
//! - `PdfProcessor` - scanned PDFs; OCR of every embedded page image
//! - `ImageProcessor` - standalone PNG page images

pub mod image;
pub mod pdf;
pub mod processor;

pub use self::image::ImageProcessor;
pub use pdf::{PageExtractor, PageResult, PdfProcessor};
pub use processor::DocumentProcessor;

// Re-export backends
pub use pdf::backends::{Container, ContainerReader, LopdfReader};
