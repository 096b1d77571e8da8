//! Tesseract OCR engine.
//!
//! Runs the tesseract binary on a scratch copy of the image and reads the
//! recognized text from stdout.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

use super::OcrEngine;
use crate::config::OcrConfig;
use crate::error::OcrError;
use crate::types::EmbeddedImage;

pub struct TesseractEngine {
    config: OcrConfig,
}

impl TesseractEngine {
    /// Create a new Tesseract engine with default configuration.
    pub fn new() -> Self {
        Self {
            config: OcrConfig::default(),
        }
    }

    pub fn with_config(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Check whether the configured binary can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn command_for(&self, image_path: &Path) -> Command {
        let mut command = Command::new(&self.config.binary);
        command
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language]);
        if let Some(psm) = self.config.page_segmentation_mode {
            command.args(["--psm", &psm.to_string()]);
        }
        command
    }

    fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = self.command_for(image_path).output();
        handle_output(output, &self.config.binary)
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn handle_output(result: std::io::Result<Output>, binary: &str) -> Result<String, OcrError> {
    match result {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(OcrError::Failed(format!("tesseract failed: {}", stderr.trim())))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::EngineUnavailable(
            format!("{binary} not found (install tesseract-ocr)"),
        )),
        Err(e) => Err(OcrError::Io(e)),
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &EmbeddedImage) -> Result<String, OcrError> {
        // tesseract sniffs the format from content; the suffix is cosmetic
        let mut scratch = tempfile::Builder::new()
            .prefix("platscan-")
            .suffix(&format!(".{}", image.kind.extension()))
            .tempfile()?;
        scratch.write_all(&image.bytes)?;
        scratch.flush()?;

        self.run_tesseract(scratch.path())
    }
}
