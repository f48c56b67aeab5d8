//! Report files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::tree::ResultTree;

/// File name for a report taken on `host` at `at`.
pub fn report_file_name(host: &str, at: DateTime<Local>) -> String {
    let host: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("diagnostics_{}_{}.json", host, at.format("%Y%m%d_%H%M%S"))
}

/// Write the tree as pretty JSON into `dir`, creating it if needed.
pub fn write_report(dir: &Path, host: &str, tree: &ResultTree) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

    let path = dir.join(report_file_name(host, Local::now()));
    let content = serde_json::to_string_pretty(&tree.to_document())?;
    fs::write(&path, content)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn file_name_contains_host_and_timestamp() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            report_file_name("build-01.lab", at),
            "diagnostics_build-01_lab_20240309_140507.json"
        );
    }

    #[test]
    fn report_is_written_as_result_document() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("reports");
        let tree = ResultTree::from_entries(
            json!({"GPU": {"status": "PASS", "result": "ok"}})
                .as_object()
                .unwrap()
                .clone(),
        );

        let path = write_report(&dir, "host", &tree).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["result"]["GPU"]["status"], "PASS");
    }
}
