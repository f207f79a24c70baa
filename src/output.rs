//! Result types for a conversion request.

use crate::config::OutputFormat;
use crate::error::Md2PdfError;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of exporting one format.
#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub format: OutputFormat,
    /// The written file; `None` when the export failed.
    pub path: Option<PathBuf>,
    pub bytes_written: u64,
    pub duration_ms: u64,
    /// Human-readable failure, `None` on success.
    pub error: Option<String>,
}

impl ExportResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate numbers for a request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    pub total_formats: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

/// Everything a conversion request produced, one entry per format in
/// request order.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Absolute path of the Markdown source.
    pub source: PathBuf,
    pub results: Vec<ExportResult>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Paths of the files that were written.
    pub fn written_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.results.iter().filter_map(|r| r.path.as_ref())
    }

    /// `Ok` when every format succeeded, otherwise
    /// [`Md2PdfError::PartialFailure`].
    pub fn into_result(self) -> Result<Self, Md2PdfError> {
        if self.stats.failed == 0 {
            Ok(self)
        } else {
            Err(Md2PdfError::PartialFailure {
                success: self.stats.succeeded,
                failed: self.stats.failed,
                total: self.stats.total_formats,
            })
        }
    }
}
