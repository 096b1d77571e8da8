//! Run summary written by `--summary`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use platscan_core::{BatchReport, DocumentReport};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub persisted: usize,
    pub dropped: usize,
    pub skipped: usize,
    pub failed: usize,
    pub write_failures: usize,
    pub elapsed_ms: u128,
    pub documents: Vec<DocumentReport>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>, report: BatchReport) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            total: report.total(),
            persisted: report.persisted(),
            dropped: report.dropped(),
            skipped: report.skipped(),
            failed: report.failed(),
            write_failures: report.write_failures(),
            elapsed_ms: report.elapsed_ms,
            documents: report.documents,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write summary {}", path.display()))?;
        Ok(())
    }

    pub fn print(&self) {
        println!("📊 Run summary:");
        println!("   - Files: {}", self.total);
        println!("   - Persisted: {}", self.persisted);
        println!("   - Nothing extracted: {}", self.dropped);
        println!("   - Skipped: {}", self.skipped);
        println!("   - Failed: {}", self.failed);
        if self.write_failures > 0 {
            println!("   - Writer failures: {}", self.write_failures);
        }
        println!("⏱️  Total processing time: {:.3}s", self.elapsed_ms as f64 / 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platscan_core::{DocumentOutcome, ErrorKind};

    #[test]
    fn test_summary_json_shape() {
        let report = BatchReport {
            documents: vec![
                DocumentReport {
                    path: "a.pdf".to_string(),
                    outcome: DocumentOutcome::Persisted { succeeded: 2, failed: 0 },
                },
                DocumentReport {
                    path: "gone.png".to_string(),
                    outcome: DocumentOutcome::Failed {
                        kind: ErrorKind::NotFound,
                        message: "Input not found: gone.png".to_string(),
                    },
                },
            ],
            elapsed_ms: 1500,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = RunSummary::new(Utc::now(), report);
        summary.save(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["persisted"], 1);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["documents"][0]["status"], "persisted");
        assert_eq!(json["documents"][1]["kind"], "not_found");
        assert!(json["started_at"].as_str().is_some());
    }
}
