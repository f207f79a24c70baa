//! Format export: write a rendered page as html, pdf, png or jpeg.
//!
//! `html` is written directly. The other formats go through the engine:
//!
//! ```text
//! Idle ─▶ TempFileWritten ─▶ EngineLaunched ─▶ PageLoaded ─▶ Captured ─▶ Cleaned
//!   └──────────┴──────────────────┴───────────────┴────────────┴─▶ Failed ─▶ Cleaned
//! ```
//!
//! The temporary page is a [`tempfile::NamedTempFile`] created in the
//! destination directory, so relative loads that survive resolution still
//! work, and it is deleted when dropped: on success, on engine failure and
//! on panic. The engine owns its own session and closes it before
//! returning.

use crate::config::{ConversionConfig, OutputFormat};
use crate::error::Md2PdfError;
use crate::pipeline::engine::{CaptureRequest, ChromeEngine, RenderEngine};
use crate::pipeline::page::RenderedPage;
use crate::pipeline::resolve::file_url_for_path;
use image::ImageFormat;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// A file written by the exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Writes rendered pages to disk, using a [`RenderEngine`] for rasterised
/// formats.
#[derive(Clone)]
pub struct Exporter {
    engine: Arc<dyn RenderEngine>,
    config: ConversionConfig,
}

impl Exporter {
    /// Exporter using the configured engine, or headless Chrome.
    pub fn new(config: &ConversionConfig) -> Self {
        let engine = config
            .engine
            .clone()
            .unwrap_or_else(|| Arc::new(ChromeEngine::from_config(config)));
        Self {
            engine,
            config: config.clone(),
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn RenderEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Write `page` to `destination` as `format`.
    pub async fn export(
        &self,
        page: &RenderedPage,
        destination: &Path,
        format: OutputFormat,
    ) -> Result<ExportedFile, Md2PdfError> {
        let exported = if format.is_rasterized() {
            self.export_rasterized(page, destination, format).await?
        } else {
            write_output(destination, page.html().as_bytes()).await?
        };
        info!(
            "Exported {} → {} ({} bytes)",
            format,
            exported.path.display(),
            exported.bytes
        );
        Ok(exported)
    }

    async fn export_rasterized(
        &self,
        page: &RenderedPage,
        destination: &Path,
        format: OutputFormat,
    ) -> Result<ExportedFile, Md2PdfError> {
        let temp = write_temp_page(destination, page.html())?;
        debug!("[{}] TempFileWritten: {}", format, temp.path().display());

        let outcome = self.capture_and_write(temp.path(), destination, format).await;
        if let Err(e) = &outcome {
            debug!("[{}] Failed: {}", format, e);
        }

        self.clean_up(temp, format);
        outcome
    }

    async fn capture_and_write(
        &self,
        temp_page: &Path,
        destination: &Path,
        format: OutputFormat,
    ) -> Result<ExportedFile, Md2PdfError> {
        let url = file_url_for_path(temp_page);
        let request = CaptureRequest::from_config(format, &self.config);
        let engine = Arc::clone(&self.engine);
        debug!("[{}] EngineLaunched: {} → {}", format, engine.name(), url);

        let bytes = tokio::task::spawn_blocking(move || engine.render(&url, &request))
            .await
            .map_err(|e| Md2PdfError::Internal(format!("Render task panicked: {e}")))?
            .map_err(|e| Md2PdfError::Engine {
                format,
                stage: e.stage,
                detail: e.detail,
            })?;
        debug!("[{}] Captured: {} bytes", format, bytes.len());

        validate_capture(format, &bytes)?;
        write_output(destination, &bytes).await
    }

    fn clean_up(&self, temp: NamedTempFile, format: OutputFormat) {
        if self.config.keep_temp_html {
            match temp.keep() {
                Ok((_, path)) => info!("Kept temporary page {}", path.display()),
                Err(e) => warn!("Could not keep temporary page: {}", e),
            }
        } else if let Err(e) = temp.close() {
            warn!("Could not delete temporary page: {}", e);
        }
        debug!("[{}] Cleaned", format);
    }
}

/// Temporary page next to `destination`, named `<stem>_<random>_tmp.html`.
fn write_temp_page(destination: &Path, html: &str) -> Result<NamedTempFile, Md2PdfError> {
    let dir = destination
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());

    let temp_err = |e: std::io::Error| Md2PdfError::TempFileFailed {
        dir: dir.to_path_buf(),
        source: e,
    };
    let mut temp = tempfile::Builder::new()
        .prefix(&format!("{stem}_"))
        .suffix("_tmp.html")
        .tempfile_in(dir)
        .map_err(temp_err)?;
    temp.write_all(html.as_bytes()).map_err(temp_err)?;
    temp.flush().map_err(temp_err)?;
    Ok(temp)
}

async fn write_output(path: &Path, bytes: &[u8]) -> Result<ExportedFile, Md2PdfError> {
    let write_err = |e: std::io::Error| Md2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    tokio::fs::write(path, bytes).await.map_err(write_err)?;
    Ok(ExportedFile {
        path: path.to_path_buf(),
        bytes: bytes.len() as u64,
    })
}

/// Check that the engine returned a file of the requested format.
pub fn validate_capture(format: OutputFormat, bytes: &[u8]) -> Result<(), Md2PdfError> {
    let invalid = |detail: String| Md2PdfError::InvalidCapture { format, detail };
    if bytes.is_empty() {
        return Err(invalid("engine returned no data".into()));
    }
    let expected = match format {
        OutputFormat::Html => return Ok(()),
        OutputFormat::Pdf => {
            return if bytes.starts_with(b"%PDF") {
                Ok(())
            } else {
                Err(invalid("missing %PDF header".into()))
            };
        }
        OutputFormat::Png => ImageFormat::Png,
        OutputFormat::Jpeg => ImageFormat::Jpeg,
    };
    match image::guess_format(bytes) {
        Ok(found) if found == expected => Ok(()),
        Ok(found) => Err(invalid(format!("got {found:?} data"))),
        Err(e) => Err(invalid(e.to_string())),
    }
}
