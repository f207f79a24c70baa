//! Error types for the edgequake-md2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Md2PdfError`]: **Fatal** for the unit of work that returned it: the
//!   whole request (missing source, unknown format, bad output directory) or
//!   a single format's export (engine failure, write failure).
//!
//! * [`ResolveError`]: **Non-fatal**: one image or stylesheet reference could
//!   not be decoded. The resolution hooks log it and keep the reference as it
//!   was written, so the rest of the document still renders.

use crate::config::OutputFormat;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The step of a headless-engine session that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStage {
    Launch,
    Navigate,
    Capture,
}

impl fmt::Display for EngineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineStage::Launch => "launch",
            EngineStage::Navigate => "navigate",
            EngineStage::Capture => "capture",
        };
        f.write_str(s)
    }
}

/// All fatal errors returned by the edgequake-md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Markdown source was not found at the given path.
    #[error("Markdown file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The source file exists but is not valid UTF-8.
    #[error("Markdown file '{path}' is not valid UTF-8")]
    NotUtf8 { path: PathBuf },

    /// The format token is not one of html, pdf, png, jpeg, settings, all.
    #[error("Unsupported format '{input}'\nSupported formats: html, pdf, png, jpeg, settings, all.")]
    UnsupportedFormat { input: String },

    /// An absolute output directory was configured but does not exist.
    #[error("Output directory '{path}' does not exist.\nCreate it or check --output-dir.")]
    OutputDirMissing { path: PathBuf },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading the source file failed after it was found.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create a relative or home-relative output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the temporary HTML page.
    #[error("Failed to write temporary page in '{dir}': {source}")]
    TempFileFailed {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The headless engine failed to launch, navigate or capture.
    #[error("Rendering engine failed to {stage} while exporting {format}: {detail}")]
    Engine {
        format: OutputFormat,
        stage: EngineStage,
        detail: String,
    },

    /// The engine returned bytes that are not the requested format.
    #[error("Engine output for {format} is not a valid {format} file: {detail}")]
    InvalidCapture { format: OutputFormat, detail: String },

    // ── Page assembly ─────────────────────────────────────────────────────
    /// The page template could not be parsed.
    #[error("Invalid page template: {0}")]
    Template(String),

    // ── Batch ─────────────────────────────────────────────────────────────
    /// Some formats were exported but at least one failed.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_result`] when
    /// the caller wants to treat any format failure as an error.
    #[error("{failed}/{total} formats failed to export")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Md2PdfError {
    /// True for errors caused by what the user asked for rather than by the
    /// environment (missing file, unknown format, missing output directory).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Md2PdfError::FileNotFound { .. }
                | Md2PdfError::PermissionDenied { .. }
                | Md2PdfError::NotUtf8 { .. }
                | Md2PdfError::UnsupportedFormat { .. }
                | Md2PdfError::OutputDirMissing { .. }
        )
    }
}

/// A non-fatal error for a single reference.
///
/// Never propagated out of a render: the hooks fall back to the reference as
/// written and log this at `warn`.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ResolveError {
    /// Percent-decoding produced bytes that are not UTF-8.
    #[error("reference '{reference}' is not valid percent-encoded UTF-8")]
    InvalidEncoding { reference: String },
}
