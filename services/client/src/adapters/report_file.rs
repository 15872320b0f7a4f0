//! services/client/src/adapters/report_file.rs
//!
//! Loads a report from the local disk into a `ReportFile`.

use compare_bot_core::domain::ReportFile;
use std::path::Path;
use tracing::debug;

use crate::error::ClientError;

/// Reads `path` and types it by extension. The name is the file name only.
pub async fn read_report(path: &Path) -> Result<ReportFile, ClientError> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime = ReportFile::mime_for_path(path);
    debug!(name = %name, mime, bytes = bytes.len(), "read report from disk");
    Ok(ReportFile::new(name, mime, bytes))
}
