//! PDF container readers
//!
//! Defines the interface every PDF parsing backend implements. The PDF
//! processor only sees pages, page images and text layers through these
//! traits, so the parsing library stays an opaque service.

use crate::error::PipelineError;
use crate::types::ExtractedPage;
use std::collections::BTreeMap;
use std::path::Path;

/// Opens a file as a multi-page container
pub trait ContainerReader: Send + Sync {
    /// Backend identifier for logging/debugging
    fn name(&self) -> &str;

    /// Parse the container. Fails with `UnopenablePdf` only when the file
    /// cannot be parsed at all; damage inside single pages or images is
    /// reported per image by `Container::page`.
    fn open(&self, path: &Path) -> Result<Box<dyn Container>, PipelineError>;
}

/// An opened multi-page container
pub trait Container {
    /// The container's own declared metadata (title, author, producer, ...),
    /// keys passed through verbatim
    fn metadata(&self) -> BTreeMap<String, String>;

    fn page_count(&self) -> usize;

    /// Page by 0-based index. Image order must be identical across runs for
    /// identical input bytes.
    fn page(&self, index: usize) -> ExtractedPage;
}

pub mod lopdf_reader;

pub use lopdf_reader::LopdfReader;
