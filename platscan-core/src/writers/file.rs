//! Local text file writer.
//!
//! One file per record when the URI carries `{stem}` or `{name}`, otherwise
//! every record overwrites the same file.

use super::StorageWriter;
use crate::error::WriterError;
use crate::logging::EventLog;
use crate::types::DocumentRecord;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes the record text to a local file, overwriting it.
///
/// `{stem}` and `{name}` in the URI expand to the source file's stem and
/// file name, so one writer can serve a whole batch.
pub struct FileWriter {
    uri: String,
    create_dirs: bool,
}

impl FileWriter {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            create_dirs: false,
        }
    }

    /// Create missing parent directories before writing
    pub fn with_create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }

    fn is_templated(&self) -> bool {
        self.uri.contains("{stem}") || self.uri.contains("{name}")
    }

    /// Destination for a record
    pub fn target_path(&self, record: &DocumentRecord) -> PathBuf {
        let source = Path::new(&record.file);
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let name = source
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        PathBuf::from(self.uri.replace("{stem}", &stem).replace("{name}", &name))
    }

    fn write(&self, target: &Path, text: &str) -> Result<usize, WriterError> {
        if self.create_dirs {
            if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(target, text)?;
        Ok(text.chars().count())
    }
}

impl StorageWriter for FileWriter {
    fn save(&self, record: &DocumentRecord, log: &dyn EventLog) -> bool {
        if record.text.is_empty() {
            return false;
        }

        let target = self.target_path(record);
        match self.write(&target, &record.text) {
            Ok(chars) => {
                log.info(&format!("Wrote {chars} chars for {} to {}", record.file, target.display()));
                chars > 0
            }
            Err(e) => {
                log.error(&format!(
                    "{} failed to write {}: {e}",
                    self.describe(),
                    target.display()
                ));
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("file({})", self.uri)
    }

    fn shares_destination(&self) -> bool {
        !self.is_templated()
    }
}
