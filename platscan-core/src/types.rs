use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

// ===== SOURCE DOCUMENTS =====

/// Format tag derived from a file extension (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Png,
    /// Anything the pipeline has no processor for. Carries the lowercased
    /// extension (empty when the file has none).
    Unsupported(String),
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "pdf" => SourceFormat::Pdf,
            "png" => SourceFormat::Png,
            _ => SourceFormat::Unsupported(extension),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, SourceFormat::Unsupported(_))
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Pdf => write!(f, "pdf"),
            SourceFormat::Png => write!(f, "png"),
            SourceFormat::Unsupported(ext) if ext.is_empty() => write!(f, "<none>"),
            SourceFormat::Unsupported(ext) => write!(f, ".{ext}"),
        }
    }
}

/// One input file. The format is derived once at construction and the
/// value is never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    path: PathBuf,
    format: SourceFormat,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = SourceFormat::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &SourceFormat {
        &self.format
    }

    /// Path as stored in records and log lines.
    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// File name without extension, used by writer URI templates.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string())
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string())
    }
}

// ===== PAGE / IMAGE TYPES =====

/// Encoding of an image handed to the OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Png,
    Jpeg,
    Tiff,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpeg",
            ImageKind::Tiff => "tiff",
        }
    }

    /// File extension used when the image has to be materialized on disk
    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
            ImageKind::Tiff => "tif",
        }
    }

    pub fn to_image_format(self) -> image::ImageFormat {
        match self {
            ImageKind::Png => image::ImageFormat::Png,
            ImageKind::Jpeg => image::ImageFormat::Jpeg,
            ImageKind::Tiff => image::ImageFormat::Tiff,
        }
    }

    pub fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(ImageKind::Png),
            image::ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            image::ImageFormat::Tiff => Some(ImageKind::Tiff),
            _ => None,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw image bytes pulled out of a container (or read from disk) plus the
/// format they are encoded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub bytes: Vec<u8>,
    pub kind: ImageKind,
}

impl EmbeddedImage {
    pub fn new(bytes: Vec<u8>, kind: ImageKind) -> Self {
        Self { bytes, kind }
    }
}

/// One page of a multi-page container as exposed by a container reader.
///
/// Each image slot is either the extracted image or the reason it could not
/// be extracted, so a bad image never hides its siblings.
#[derive(Debug)]
pub struct ExtractedPage {
    /// 0-based page index
    pub index: usize,
    pub images: Vec<Result<EmbeddedImage, crate::error::ImageExtractionError>>,
    /// Native text layer, only present for searchable sources
    pub text_layer: Option<String>,
}

impl ExtractedPage {
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            images: Vec::new(),
            text_layer: None,
        }
    }
}

/// OCR output for one embedded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecognizedImage {
    pub page_index: usize,
    pub image_index: usize,
    pub kind: ImageKind,
    pub text: String,
}

// ===== RECORDS =====

/// The unit handed to every storage writer.
///
/// Empty text and empty metadata are left out of the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub file: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl DocumentRecord {
    pub fn new(file: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            text: text.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Records with neither text nor metadata are never written.
    pub fn is_persistable(&self) -> bool {
        !self.text.is_empty() || !self.metadata.is_empty()
    }
}
