//! Input discovery and config file lookup.
//!
//! Directories are listed flat (files only, no recursion) and sorted by
//! path; file arguments are passed through as given.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked for in the user config directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Expand `--input` arguments into the ordered list of files to process.
///
/// Paths that don't exist are kept so the pipeline reports them as
/// `NotFound` instead of the CLI silently dropping them.
pub fn discover_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            files.extend(list_directory(input)?);
        } else {
            files.push(input.clone());
        }
    }

    Ok(files)
}

fn list_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read entry in {}", dir.display()))?
            .path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `~/.config/platscan/config.yaml` (platform equivalent), if present
pub fn default_config_path() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("platscan").join(CONFIG_FILE_NAME);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_listing_is_flat_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.docx", "a.pdf", "b.png"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/d.pdf"), b"x").unwrap();

        let files = discover_files(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.png", "c.docx"]);
    }

    #[test]
    fn test_files_pass_through_in_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let listed = dir.path().join("listed");
        fs::create_dir(&listed).unwrap();
        fs::write(listed.join("z.png"), b"x").unwrap();

        let inputs = vec![
            PathBuf::from("/nonexistent/first.pdf"),
            listed.clone(),
            PathBuf::from("last.png"),
        ];
        let files = discover_files(&inputs).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("/nonexistent/first.pdf"),
                listed.join("z.png"),
                PathBuf::from("last.png"),
            ]
        );
    }
}
