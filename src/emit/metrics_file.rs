//! Metrics document persistence.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::engagement::MetricsDocument;

/// Write the whole document in one step.
///
/// The JSON is staged in a temp file next to `path` and renamed into place,
/// so readers see either no file or the complete document.
pub fn write_metrics_document(path: &Path, document: &MetricsDocument) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let json = document.to_json_pretty()?;
    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to stage metrics in {}", dir.display()))?;
    staged.write_all(&json)?;
    staged.as_file().sync_all()?;
    staged
        .persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to write metrics {}", path.display()))?;
    Ok(())
}

/// Read a metrics document back from disk.
pub fn read_metrics_document(path: &Path) -> Result<MetricsDocument> {
    let raw = std::fs::read(path)
        .with_context(|| format!("failed to read metrics {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("invalid metrics {}", path.display()))
}
