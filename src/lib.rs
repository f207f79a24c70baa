//! # edgequake-md2pdf
//!
//! Convert Markdown documents to HTML, PDF, PNG and JPEG.
//!
//! HTML is produced directly. The other formats are captured by a headless
//! Chrome/Chromium from a temporary copy of the HTML page, so everything
//! the page references (images, stylesheets) must be reachable from that
//! copy. The [`pipeline::resolve`] stage takes care of that by rewriting
//! local references to absolute `file://` URIs for those targets.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Input    read the file, make the path absolute
//!  ├─ 2. Render   pulldown-cmark + reference resolution + highlighting
//!  ├─ 3. Page     styles + title into the mustache template
//!  ├─ 4. Export   html written as-is; pdf/png/jpeg via headless Chrome
//!  └─ 5. Output   one file per format + per-format results
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_md2pdf::{convert, ConversionConfig, FormatSelection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert("README.md", &FormatSelection::All, &config).await?;
//!     for path in output.written_paths() {
//!         println!("{}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-md2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, Extension, FormatSelection, Length, LengthUnit,
    Margins, MarkdownExtensions, OutputFormat, PaperFormat, PdfOptions,
};
pub use convert::{convert, convert_sync, convert_to};
pub use error::{EngineStage, Md2PdfError, ResolveError};
pub use output::{ConversionOutput, ConversionStats, ExportResult};
pub use pipeline::context::{DocumentContext, PathStyle};
pub use pipeline::engine::{CaptureRequest, ChromeEngine, EngineError, RenderEngine};
pub use pipeline::page::{render_page, RenderedPage};
pub use pipeline::resolve::{resolve_or_original, resolve_reference};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
