//! Downloaded exports.

use crate::{ExportFormat, InsightsResult, TimeRange};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// Build `analytics-export-<range>-<YYYYMMDD-HHMMSS>.<ext>`.
pub fn export_file_name(range: TimeRange, format: ExportFormat, at: DateTime<Utc>) -> String {
    format!(
        "analytics-export-{}-{}.{}",
        range.as_str(),
        at.format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

/// An export payload held in memory until saved.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub range: TimeRange,
    pub format: ExportFormat,
    /// `Content-Type` reported by the server, if any.
    pub content_type: Option<String>,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    pub fn new(
        range: TimeRange,
        format: ExportFormat,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            range,
            format,
            content_type,
            file_name: export_file_name(range, format, Utc::now()),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the payload into `dir` under its suggested name.
    pub fn save_to(&self, dir: &Path) -> InsightsResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;

        info!(
            path = %path.display(),
            bytes = self.bytes.len(),
            range = %self.range,
            format = %self.format,
            "Export saved"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn file_name_encodes_range_and_time() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            export_file_name(TimeRange::LastWeek, ExportFormat::Csv, at),
            "analytics-export-7d-20240309-070501.csv"
        );
        assert_eq!(
            export_file_name(TimeRange::LastHour, ExportFormat::Xlsx, at),
            "analytics-export-1h-20240309-070501.xlsx"
        );
    }

    #[test]
    fn save_to_creates_directory_and_writes_bytes() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("exports");
        let artifact = ExportArtifact::new(
            TimeRange::LastDay,
            ExportFormat::Json,
            Some("application/json".to_string()),
            b"[{\"type\":\"page_view\"}]".to_vec(),
        );

        let path = artifact.save_to(&target).unwrap();

        assert!(path.starts_with(&target));
        assert!(artifact.file_name.starts_with("analytics-export-24h-"));
        assert!(artifact.file_name.ends_with(".json"));
        assert_eq!(std::fs::read(&path).unwrap(), artifact.bytes);
        assert_eq!(artifact.len(), artifact.bytes.len());
    }
}
