use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    1
}

fn default_document_timeout_secs() -> Option<u64> {
    Some(600)
}

fn default_tesseract_binary() -> String {
    "tesseract".to_string()
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_server_selection_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub pipeline: ProcessingConfig,
    /// Storage destinations; every record is fanned out to all of them
    #[serde(default)]
    pub writers: Vec<WriterConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    #[default]
    Tesseract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default)]
    pub engine: OcrEngineKind,
    /// Tesseract executable, looked up on PATH when not absolute
    #[serde(default = "default_tesseract_binary")]
    pub binary: String,
    /// Tesseract language pack(s), e.g. "eng" or "eng+spa"
    #[serde(default = "default_language")]
    pub language: String,
    /// Passed through as `--psm`
    #[serde(default)]
    pub page_segmentation_mode: Option<u8>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: OcrEngineKind::Tesseract,
            binary: default_tesseract_binary(),
            language: default_language(),
            page_segmentation_mode: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Put a page's native text layer ahead of its OCR text
    #[serde(default = "default_true")]
    pub use_text_layer: bool,
    /// Documents processed concurrently (1 = sequential)
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-document limit; 0 or null disables it
    #[serde(default = "default_document_timeout_secs")]
    pub document_timeout_secs: Option<u64>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            use_text_layer: true,
            workers: default_workers(),
            document_timeout_secs: default_document_timeout_secs(),
        }
    }
}

impl ProcessingConfig {
    pub fn document_timeout(&self) -> Option<Duration> {
        match self.document_timeout_secs {
            Some(0) | None => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        }
    }
}

/// Destination descriptor for one storage writer.
///
/// Credentials never appear here; they are read from the environment when
/// the writer is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WriterConfig {
    File {
        /// Target path; `{stem}` and `{name}` expand to the source file's
        /// stem and file name
        uri: String,
        /// Create missing parent directories before writing
        #[serde(default)]
        create_dirs: bool,
    },
    Mongo {
        host: String,
        database: String,
        collection: String,
        #[serde(default = "default_server_selection_timeout_secs")]
        server_selection_timeout_secs: u64,
    },
}

impl WriterConfig {
    pub fn file(uri: impl Into<String>, create_dirs: bool) -> Self {
        WriterConfig::File {
            uri: uri.into(),
            create_dirs,
        }
    }
}

impl PipelineConfig {
    /// Load config from file path
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: PipelineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Load config with fallback to default
    pub fn load_with_fallback(path: Option<&Path>) -> Self {
        match path {
            Some(p) => match Self::load_from_file(p) {
                Ok(config) => {
                    tracing::info!("Loaded config from: {}", p.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config from {}, using defaults: {:#}", p.display(), e);
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
