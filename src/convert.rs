//! Conversion entry points.
//!
//! A request is one Markdown file and a [`FormatSelection`]. Formats are
//! exported sequentially: each one renders its own page (reference
//! resolution depends on the target) and gets its own engine session.
//! A failing format is recorded and the batch moves on; only problems that
//! affect every format (missing source, bad output directory) abort the
//! request.

use crate::config::{ConversionConfig, FormatSelection, OutputFormat};
use crate::error::Md2PdfError;
use crate::output::{ConversionOutput, ConversionStats, ExportResult};
use crate::pipeline::context::DocumentContext;
use crate::pipeline::export::{ExportedFile, Exporter};
use crate::pipeline::input::{load_source, SourceDocument};
use crate::pipeline::output_path::destination_path;
use crate::pipeline::page::render_page;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Convert a Markdown file to every format in `selection`.
///
/// # Returns
/// `Ok(ConversionOutput)` once every format has been attempted, even if
/// some failed (check `output.stats.failed`, or call
/// [`ConversionOutput::into_result`]).
///
/// # Errors
/// Returns `Err(Md2PdfError)` only for request-level failures:
/// - Source not found, unreadable or not UTF-8
/// - Absolute output directory missing, or an output directory that
///   cannot be created
pub async fn convert(
    input: impl AsRef<Path>,
    selection: &FormatSelection,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let total_start = Instant::now();
    let formats = selection.formats(config);
    let source = load_source(input).await?;
    info!(
        "Starting conversion: {} → [{}]",
        source.path.display(),
        formats
            .iter()
            .map(|f| f.extension())
            .collect::<Vec<_>>()
            .join(", ")
    );

    // Resolve every destination up front so an unusable output directory
    // fails the request before anything is written.
    let mut destinations = Vec::with_capacity(formats.len());
    for format in &formats {
        destinations.push(destination_path(&source.path, *format, config).await?);
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(formats.len());
    }

    let exporter = Exporter::new(config);
    let total = formats.len();
    let mut results = Vec::with_capacity(total);

    for (i, (format, destination)) in formats.iter().copied().zip(destinations).enumerate() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_format_start(format, i + 1, total);
        }

        let start = Instant::now();
        let outcome = export_one(&exporter, &source, format, &destination, config).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(file) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_format_complete(format, &file.path, file.bytes);
                }
                ExportResult {
                    format,
                    path: Some(file.path),
                    bytes_written: file.bytes,
                    duration_ms,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Export to {} failed: {}", format, e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_format_error(format, &e.to_string());
                }
                ExportResult {
                    format,
                    path: None,
                    bytes_written: 0,
                    duration_ms,
                    error: Some(e.to_string()),
                }
            }
        };
        results.push(result);
    }

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    let stats = ConversionStats {
        total_formats: total,
        succeeded,
        failed: total - succeeded,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {}/{} formats, {}ms total",
        succeeded, total, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, succeeded);
    }

    Ok(ConversionOutput {
        source: source.path,
        results,
        stats,
    })
}

/// Convert to a single format and return the written path.
///
/// Unlike [`convert`], an export failure is returned as the error itself.
pub async fn convert_to(
    input: impl AsRef<Path>,
    format: OutputFormat,
    config: &ConversionConfig,
) -> Result<PathBuf, Md2PdfError> {
    let source = load_source(input).await?;
    let destination = destination_path(&source.path, format, config).await?;
    let file = export_one(&Exporter::new(config), &source, format, &destination, config).await?;
    Ok(file.path)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    selection: &FormatSelection,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, selection, config))
}

async fn export_one(
    exporter: &Exporter,
    source: &SourceDocument,
    format: OutputFormat,
    destination: &Path,
    config: &ConversionConfig,
) -> Result<ExportedFile, Md2PdfError> {
    let ctx = DocumentContext::new(&source.path, format);
    let page = render_page(&ctx, &source.text, config)?;
    exporter.export(&page, destination, format).await
}
