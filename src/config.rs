//! Configuration types for Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Nothing in the pipeline reads ambient
//! settings: the CLI maps flags and `MD2PDF_*` environment variables into
//! this struct, and the pipeline only ever sees the struct.

use crate::error::Md2PdfError;
use crate::pipeline::engine::RenderEngine;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for a Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_md2pdf::{ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .default_formats(vec![OutputFormat::Pdf, OutputFormat::Html])
///     .output_directory("~/exports")
///     .jpeg_quality(90)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Formats the `settings` token expands to. Default: `[pdf]`.
    pub default_formats: Vec<OutputFormat>,

    /// Where output files go. `None` writes next to the source file.
    ///
    /// Accepts an absolute path (must exist), a `~`-relative path, or a
    /// relative path resolved against [`Self::project_root`] or the source
    /// file's directory (see [`Self::output_directory_relative_to_file`]).
    pub output_directory: Option<String>,

    /// Resolve a relative `output_directory` against the source file's
    /// directory even when a project root is set. Default: false.
    pub output_directory_relative_to_file: bool,

    /// Root of the project the document belongs to, used for relative output
    /// directories and relative stylesheet references.
    pub project_root: Option<PathBuf>,

    /// Inline the bundled stylesheets. Default: true.
    pub include_default_styles: bool,

    /// Extra stylesheet references emitted as `<link>` elements after the
    /// bundled styles.
    pub styles: Vec<String>,

    /// Resolve relative stylesheet references against the source file rather
    /// than the project root. Default: true.
    pub styles_relative_to_file: bool,

    /// Highlight fenced code blocks. Default: true.
    pub highlight: bool,

    /// Name of the bundled highlighting theme. Default: `InspiredGitHub`.
    pub highlight_theme: String,

    /// CSS file replacing the generated highlighting theme.
    pub highlight_style: Option<PathBuf>,

    /// Custom mustache page template (`{{title}}`, `{{{style}}}`, `{{{content}}}`).
    pub template: Option<PathBuf>,

    /// Markdown extensions to enable.
    pub extensions: MarkdownExtensions,

    /// Render soft line breaks as `<br>`. Default: false.
    pub breaks: bool,

    /// Base URL of the diagram server used for PlantUML blocks.
    pub plantuml_server: String,

    /// PDF page setup.
    pub pdf: PdfOptions,

    /// JPEG quality, 0–100. Default: 100.
    pub jpeg_quality: u32,

    /// Browser viewport `(width, height)` in CSS pixels. Default: 800×600.
    pub viewport: (u32, u32),

    /// Chrome/Chromium binary. `None` lets the engine locate one.
    pub executable_path: Option<PathBuf>,

    /// Extra wait after navigation completes, for late network activity
    /// (web fonts, remote images). Default: 500 ms.
    pub settle_ms: u64,

    /// Engine idle timeout in seconds. Default: 60.
    pub timeout_secs: u64,

    /// Keep the temporary HTML page next to the output. Default: false.
    pub keep_temp_html: bool,

    /// Rendering engine for pdf/png/jpeg. `None` uses headless Chrome.
    pub engine: Option<Arc<dyn RenderEngine>>,

    /// Per-format progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            default_formats: vec![OutputFormat::Pdf],
            output_directory: None,
            output_directory_relative_to_file: false,
            project_root: None,
            include_default_styles: true,
            styles: Vec::new(),
            styles_relative_to_file: true,
            highlight: true,
            highlight_theme: "InspiredGitHub".to_string(),
            highlight_style: None,
            template: None,
            extensions: MarkdownExtensions::default(),
            breaks: false,
            plantuml_server: "https://kroki.io".to_string(),
            pdf: PdfOptions::default(),
            jpeg_quality: 100,
            viewport: (800, 600),
            executable_path: None,
            settle_ms: 500,
            timeout_secs: 60,
            keep_temp_html: false,
            engine: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("default_formats", &self.default_formats)
            .field("output_directory", &self.output_directory)
            .field("project_root", &self.project_root)
            .field("include_default_styles", &self.include_default_styles)
            .field("styles", &self.styles)
            .field("highlight", &self.highlight)
            .field("highlight_theme", &self.highlight_theme)
            .field("template", &self.template)
            .field("extensions", &self.extensions)
            .field("breaks", &self.breaks)
            .field("pdf", &self.pdf)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("viewport", &self.viewport)
            .field("executable_path", &self.executable_path)
            .field("engine", &self.engine.as_ref().map(|_| "<dyn RenderEngine>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a builder with default values.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn default_formats(mut self, formats: Vec<OutputFormat>) -> Self {
        self.config.default_formats = formats;
        self
    }

    pub fn output_directory(mut self, dir: impl Into<String>) -> Self {
        self.config.output_directory = Some(dir.into());
        self
    }

    pub fn output_directory_relative_to_file(mut self, v: bool) -> Self {
        self.config.output_directory_relative_to_file = v;
        self
    }

    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.project_root = Some(root.into());
        self
    }

    pub fn include_default_styles(mut self, v: bool) -> Self {
        self.config.include_default_styles = v;
        self
    }

    pub fn styles(mut self, refs: Vec<String>) -> Self {
        self.config.styles = refs;
        self
    }

    pub fn styles_relative_to_file(mut self, v: bool) -> Self {
        self.config.styles_relative_to_file = v;
        self
    }

    pub fn highlight(mut self, v: bool) -> Self {
        self.config.highlight = v;
        self
    }

    pub fn highlight_theme(mut self, name: impl Into<String>) -> Self {
        self.config.highlight_theme = name.into();
        self
    }

    pub fn highlight_style(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.highlight_style = Some(path.into());
        self
    }

    pub fn template(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.template = Some(path.into());
        self
    }

    pub fn extensions(mut self, ext: MarkdownExtensions) -> Self {
        self.config.extensions = ext;
        self
    }

    pub fn breaks(mut self, v: bool) -> Self {
        self.config.breaks = v;
        self
    }

    pub fn plantuml_server(mut self, url: impl Into<String>) -> Self {
        self.config.plantuml_server = url.into();
        self
    }

    pub fn pdf(mut self, pdf: PdfOptions) -> Self {
        self.config.pdf = pdf;
        self
    }

    /// Clamped to 0–100.
    pub fn jpeg_quality(mut self, q: u32) -> Self {
        self.config.jpeg_quality = q.min(100);
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport = (width, height);
        self
    }

    pub fn executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.executable_path = Some(path.into());
        self
    }

    pub fn settle_ms(mut self, ms: u64) -> Self {
        self.config.settle_ms = ms;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn keep_temp_html(mut self, v: bool) -> Self {
        self.config.keep_temp_html = v;
        self
    }

    pub fn engine(mut self, engine: Arc<dyn RenderEngine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Validate and build the config.
    pub fn build(self) -> Result<ConversionConfig, Md2PdfError> {
        let c = &self.config;
        if c.default_formats.is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "default formats must name at least one format".into(),
            ));
        }
        if c.viewport.0 == 0 || c.viewport.1 == 0 {
            return Err(Md2PdfError::InvalidConfig(format!(
                "viewport must be non-zero, got {}x{}",
                c.viewport.0, c.viewport.1
            )));
        }
        if !(0.1..=2.0).contains(&c.pdf.scale) {
            return Err(Md2PdfError::InvalidConfig(format!(
                "PDF scale must be 0.1–2.0, got {}",
                c.pdf.scale
            )));
        }
        if c.jpeg_quality > 100 {
            return Err(Md2PdfError::InvalidConfig(format!(
                "JPEG quality must be 0–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.timeout_secs == 0 {
            return Err(Md2PdfError::InvalidConfig("timeout must be ≥ 1s".into()));
        }
        Ok(self.config)
    }
}

// ── Formats ──────────────────────────────────────────────────────────────

/// A concrete output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Html,
    Pdf,
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Every concrete format, in the order `all` produces them.
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Html,
        OutputFormat::Pdf,
        OutputFormat::Png,
        OutputFormat::Jpeg,
    ];

    /// File extension (without the dot), identical to the format name.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        }
    }

    /// True for formats that need a headless engine pass.
    pub fn is_rasterized(self) -> bool {
        !matches!(self, OutputFormat::Html)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Md2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "html" => Ok(OutputFormat::Html),
            "pdf" => Ok(OutputFormat::Pdf),
            "png" => Ok(OutputFormat::Png),
            "jpeg" => Ok(OutputFormat::Jpeg),
            other => Err(Md2PdfError::UnsupportedFormat {
                input: other.to_string(),
            }),
        }
    }
}

/// The format token given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatSelection {
    /// One concrete format.
    Single(OutputFormat),
    /// Whatever [`ConversionConfig::default_formats`] says.
    Settings,
    /// Every format, in [`OutputFormat::ALL`] order.
    All,
}

impl FormatSelection {
    /// Expand to the ordered list of formats to export.
    pub fn formats(&self, config: &ConversionConfig) -> Vec<OutputFormat> {
        match self {
            FormatSelection::Single(f) => vec![*f],
            FormatSelection::All => OutputFormat::ALL.to_vec(),
            FormatSelection::Settings => {
                let mut out: Vec<OutputFormat> = Vec::with_capacity(config.default_formats.len());
                for f in &config.default_formats {
                    if !out.contains(f) {
                        out.push(*f);
                    }
                }
                out
            }
        }
    }
}

impl FromStr for FormatSelection {
    type Err = Md2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "settings" => Ok(FormatSelection::Settings),
            "all" => Ok(FormatSelection::All),
            other => other.parse().map(FormatSelection::Single),
        }
    }
}

// ── Markdown extensions ──────────────────────────────────────────────────

/// A Markdown engine capability, in the order the engine applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extension {
    Containers,
    Checkbox,
    Emoji,
    HeadingSlugs,
    Diagrams,
}

/// Which [`Extension`]s are enabled. All on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownExtensions {
    pub containers: bool,
    pub checkbox: bool,
    pub emoji: bool,
    pub heading_slugs: bool,
    pub diagrams: bool,
}

impl Default for MarkdownExtensions {
    fn default() -> Self {
        Self {
            containers: true,
            checkbox: true,
            emoji: true,
            heading_slugs: true,
            diagrams: true,
        }
    }
}

impl MarkdownExtensions {
    /// The enabled extensions as a fixed, ordered list.
    pub fn enabled(&self) -> Vec<Extension> {
        [
            (self.containers, Extension::Containers),
            (self.checkbox, Extension::Checkbox),
            (self.emoji, Extension::Emoji),
            (self.heading_slugs, Extension::HeadingSlugs),
            (self.diagrams, Extension::Diagrams),
        ]
        .into_iter()
        .filter_map(|(on, ext)| on.then_some(ext))
        .collect()
    }
}

// ── PDF page setup ───────────────────────────────────────────────────────

/// Named paper sizes understood by the PDF exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperFormat {
    #[default]
    Letter,
    Legal,
    Tabloid,
    Ledger,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
}

impl PaperFormat {
    /// `(width, height)` in inches, portrait.
    pub fn size_inches(self) -> (f64, f64) {
        match self {
            PaperFormat::Letter => (8.5, 11.0),
            PaperFormat::Legal => (8.5, 14.0),
            PaperFormat::Tabloid => (11.0, 17.0),
            PaperFormat::Ledger => (17.0, 11.0),
            PaperFormat::A0 => (33.1, 46.8),
            PaperFormat::A1 => (23.4, 33.1),
            PaperFormat::A2 => (16.54, 23.4),
            PaperFormat::A3 => (11.7, 16.54),
            PaperFormat::A4 => (8.27, 11.7),
            PaperFormat::A5 => (5.83, 8.27),
            PaperFormat::A6 => (4.13, 5.83),
        }
    }
}

impl FromStr for PaperFormat {
    type Err = Md2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "letter" => Ok(PaperFormat::Letter),
            "legal" => Ok(PaperFormat::Legal),
            "tabloid" => Ok(PaperFormat::Tabloid),
            "ledger" => Ok(PaperFormat::Ledger),
            "a0" => Ok(PaperFormat::A0),
            "a1" => Ok(PaperFormat::A1),
            "a2" => Ok(PaperFormat::A2),
            "a3" => Ok(PaperFormat::A3),
            "a4" => Ok(PaperFormat::A4),
            "a5" => Ok(PaperFormat::A5),
            "a6" => Ok(PaperFormat::A6),
            other => Err(Md2PdfError::InvalidConfig(format!(
                "unknown paper format '{other}'"
            ))),
        }
    }
}

/// A CSS-style length such as `10mm`, `1.5cm`, `8.5in` or `96px`.
///
/// A bare number is read as pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Length {
    pub value: f64,
    pub unit: LengthUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthUnit {
    Px,
    In,
    Cm,
    Mm,
}

impl Length {
    pub const fn mm(value: f64) -> Self {
        Self {
            value,
            unit: LengthUnit::Mm,
        }
    }

    pub fn to_inches(self) -> f64 {
        match self.unit {
            LengthUnit::Px => self.value / 96.0,
            LengthUnit::In => self.value,
            LengthUnit::Cm => self.value / 2.54,
            LengthUnit::Mm => self.value / 25.4,
        }
    }
}

impl FromStr for Length {
    type Err = Md2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let units = [
            ("px", LengthUnit::Px),
            ("in", LengthUnit::In),
            ("cm", LengthUnit::Cm),
            ("mm", LengthUnit::Mm),
        ];
        let (number, unit) = units
            .iter()
            .find_map(|(suffix, unit)| s.strip_suffix(suffix).map(|n| (n, *unit)))
            .unwrap_or((s.as_str(), LengthUnit::Px));
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| Md2PdfError::InvalidConfig(format!("invalid length '{s}'")))?;
        if value < 0.0 || !value.is_finite() {
            return Err(Md2PdfError::InvalidConfig(format!(
                "length must be a non-negative number, got '{s}'"
            )));
        }
        Ok(Length { value, unit })
    }
}

/// Page margins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

impl Margins {
    pub const fn uniform(l: Length) -> Self {
        Self {
            top: l,
            right: l,
            bottom: l,
            left: l,
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(Length::mm(10.0))
    }
}

/// Page setup for the PDF exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfOptions {
    /// Named paper size, used unless `width` or `height` is set.
    pub format: PaperFormat,
    pub width: Option<Length>,
    pub height: Option<Length>,
    pub landscape: bool,
    pub scale: f64,
    pub margins: Margins,
    pub print_background: bool,
    pub display_header_footer: bool,
    pub header_template: String,
    pub footer_template: String,
    /// Chrome page-range syntax, e.g. `1-5, 8`. Empty prints everything.
    pub page_ranges: String,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            format: PaperFormat::default(),
            width: None,
            height: None,
            landscape: false,
            scale: 1.0,
            margins: Margins::default(),
            print_background: true,
            display_header_footer: false,
            header_template: String::new(),
            footer_template: String::new(),
            page_ranges: String::new(),
        }
    }
}

impl PdfOptions {
    /// Paper `(width, height)` in inches.
    ///
    /// An explicit width or height overrides the named format; a missing
    /// side then falls back to Letter's.
    pub fn paper_size_inches(&self) -> (f64, f64) {
        if self.width.is_none() && self.height.is_none() {
            return self.format.size_inches();
        }
        let (w, h) = PaperFormat::Letter.size_inches();
        (
            self.width.map_or(w, Length::to_inches),
            self.height.map_or(h, Length::to_inches),
        )
    }
}
