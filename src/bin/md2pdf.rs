//! CLI binary for edgequake-md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags and `MD2PDF_*`
//! environment variables to `ConversionConfig` and reports results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_md2pdf::{
    convert, ConversionConfig, ConversionOutput, ConversionProgressCallback, FormatSelection,
    Length, Margins, Md2PdfError, MarkdownExtensions, OutputFormat, PaperFormat, PdfOptions,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar over the formats of the request plus
/// one log line per written (or failed) file.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-format wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<OutputFormat, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_batch_start` tells us how many formats there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading Markdown…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:32.green/238}] {pos:>2}/{len} formats  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Exporting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, format: OutputFormat) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&format))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_formats: usize) {
        self.activate_bar(total_formats);
    }

    fn on_format_start(&self, format: OutputFormat, _index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(format, Instant::now());
        }
        self.bar.set_message(format.to_string());
    }

    fn on_format_complete(&self, format: OutputFormat, path: &Path, bytes: u64) {
        let secs = self.elapsed_secs(format);
        self.bar.println(format!(
            "  {} {:<5} {}  {}  {}",
            green("✓"),
            format,
            path.display(),
            dim(&format!("{bytes} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_format_error(&self, format: OutputFormat, error: &str) {
        let secs = self.elapsed_secs(format);

        // Keep the log line to the first line of the error, trimmed.
        let first_line = error.lines().next().unwrap_or_default();
        let msg = if first_line.chars().count() > 80 {
            format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} {:<5} {}  {}",
            red("✗"),
            format,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_formats: usize, success_count: usize) {
        let failed = total_formats.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} exported successfully",
                green("✔"),
                bold(&plural(success_count, "format"))
            );
        } else {
            eprintln!(
                "{} {}/{} formats exported  ({} failed)",
                if failed == total_formats {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_formats,
                red(&failed.to_string()),
            );
        }
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # PDF next to the source (README.md → README.pdf)
  md2pdf pdf README.md

  # Every format: html, pdf, png, jpeg
  md2pdf all docs/guide.md

  # Whatever MD2PDF_DEFAULT_TYPE / --default-type says (default: pdf)
  MD2PDF_DEFAULT_TYPE=html,pdf md2pdf settings notes.md

  # A4 landscape into ~/exports, with an extra stylesheet
  md2pdf pdf --paper a4 --landscape --output-dir ~/exports --style theme.css report.md

  # JSON summary for scripts
  md2pdf all --json --no-progress guide.md > result.json

OUTPUT LOCATION:
  --output-dir ~/out      $HOME/out (created if missing)
  --output-dir /srv/out   used as-is; must already exist
  --output-dir out        <project root>/out, or next to the source file
                          (created if missing)

EXIT CODES:
  0  every requested format was written
  1  a format failed (other formats may still have been written)
  2  bad input: missing file, unknown format, missing output directory

ENVIRONMENT VARIABLES:
  Every flag has an MD2PDF_* counterpart, e.g. MD2PDF_OUTPUT_DIR,
  MD2PDF_PAPER, MD2PDF_CHROME_PATH. RUST_LOG overrides the log filter.

SETUP:
  pdf, png and jpeg need a local Chrome or Chromium. It is located
  automatically; point --chrome-path at a binary to override.
"#;

/// Convert Markdown files to HTML, PDF, PNG and JPEG.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown files to HTML, PDF, PNG and JPEG",
    long_about = "Convert a Markdown file to HTML, PDF, PNG or JPEG. HTML is written directly; \
the other formats are captured by a headless Chrome/Chromium. Images and stylesheets referenced \
with relative paths keep working in every format.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Output format: html, pdf, png, jpeg, settings or all.
    format: String,

    /// Markdown file to convert.
    file: PathBuf,

    /// Formats the `settings` token expands to (comma-separated).
    #[arg(long, env = "MD2PDF_DEFAULT_TYPE", value_delimiter = ',', default_value = "pdf")]
    default_type: Vec<String>,

    // ── Output location ──────────────────────────────────────────────────
    /// Output directory: absolute, `~`-relative, or relative to the project root.
    #[arg(short, long, env = "MD2PDF_OUTPUT_DIR")]
    output_dir: Option<String>,

    /// Resolve a relative output directory against the source file, not the project root.
    #[arg(long, env = "MD2PDF_OUTPUT_DIR_RELATIVE_TO_FILE")]
    output_dir_relative_to_file: bool,

    /// Project root for relative output directories and stylesheets.
    #[arg(long, env = "MD2PDF_PROJECT_ROOT")]
    project_root: Option<PathBuf>,

    // ── Styles & template ────────────────────────────────────────────────
    /// Do not inline the bundled stylesheets.
    #[arg(long, env = "MD2PDF_NO_DEFAULT_STYLES")]
    no_default_styles: bool,

    /// Extra stylesheet (path or URL). Repeatable, or comma-separated.
    #[arg(long = "style", env = "MD2PDF_STYLES", value_delimiter = ',')]
    styles: Vec<String>,

    /// Resolve relative stylesheets against the project root instead of the source file.
    #[arg(long, env = "MD2PDF_STYLES_RELATIVE_TO_ROOT")]
    styles_relative_to_root: bool,

    /// Disable syntax highlighting of fenced code.
    #[arg(long, env = "MD2PDF_NO_HIGHLIGHT")]
    no_highlight: bool,

    /// Highlighting theme (e.g. InspiredGitHub, base16-ocean.light, Solarized (light)).
    #[arg(long, env = "MD2PDF_HIGHLIGHT_THEME", default_value = "InspiredGitHub")]
    highlight_theme: String,

    /// CSS file replacing the generated highlighting theme.
    #[arg(long, env = "MD2PDF_HIGHLIGHT_STYLE")]
    highlight_style: Option<PathBuf>,

    /// Custom mustache page template.
    #[arg(long, env = "MD2PDF_TEMPLATE")]
    template: Option<PathBuf>,

    // ── Markdown ─────────────────────────────────────────────────────────
    /// Render single line breaks as <br>.
    #[arg(long, env = "MD2PDF_BREAKS")]
    breaks: bool,

    /// Markdown extensions to turn off. Repeatable, or comma-separated.
    #[arg(long = "disable", env = "MD2PDF_DISABLE", value_enum, value_delimiter = ',')]
    disabled_extensions: Vec<ExtensionArg>,

    /// Diagram server for PlantUML blocks.
    #[arg(long, env = "MD2PDF_PLANTUML_SERVER", default_value = "https://kroki.io")]
    plantuml_server: String,

    // ── PDF page setup ───────────────────────────────────────────────────
    /// Paper format: letter, legal, tabloid, ledger, a0–a6.
    #[arg(long, env = "MD2PDF_PAPER", default_value = "letter")]
    paper: PaperFormat,

    /// Page width (e.g. 210mm, 8.5in); overrides --paper.
    #[arg(long, env = "MD2PDF_PAGE_WIDTH")]
    width: Option<Length>,

    /// Page height (e.g. 297mm, 11in); overrides --paper.
    #[arg(long, env = "MD2PDF_PAGE_HEIGHT")]
    height: Option<Length>,

    /// Landscape orientation.
    #[arg(long, env = "MD2PDF_LANDSCAPE")]
    landscape: bool,

    /// Rendering scale (0.1–2.0).
    #[arg(long, env = "MD2PDF_SCALE", default_value_t = 1.0)]
    scale: f64,

    /// Margin on every side (e.g. 10mm, 0.5in).
    #[arg(long, env = "MD2PDF_MARGIN", default_value = "10mm")]
    margin: Length,

    /// Do not print background colours and images.
    #[arg(long, env = "MD2PDF_NO_BACKGROUND")]
    no_background: bool,

    /// Print header and footer templates.
    #[arg(long, env = "MD2PDF_DISPLAY_HEADER_FOOTER")]
    display_header_footer: bool,

    /// HTML header template (Chrome print template syntax).
    #[arg(long, env = "MD2PDF_HEADER_TEMPLATE", default_value = "")]
    header_template: String,

    /// HTML footer template (Chrome print template syntax).
    #[arg(long, env = "MD2PDF_FOOTER_TEMPLATE", default_value = "")]
    footer_template: String,

    /// Pages to print, e.g. "1-5, 8". Empty prints all.
    #[arg(long, env = "MD2PDF_PAGE_RANGES", default_value = "")]
    page_ranges: String,

    // ── Images & engine ──────────────────────────────────────────────────
    /// JPEG quality (0–100).
    #[arg(long, env = "MD2PDF_JPEG_QUALITY", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(0..=100))]
    jpeg_quality: u32,

    /// Viewport width in CSS pixels.
    #[arg(long, env = "MD2PDF_VIEWPORT_WIDTH", default_value_t = 800)]
    viewport_width: u32,

    /// Viewport height in CSS pixels.
    #[arg(long, env = "MD2PDF_VIEWPORT_HEIGHT", default_value_t = 600)]
    viewport_height: u32,

    /// Chrome/Chromium executable.
    #[arg(long, env = "MD2PDF_CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// Extra wait after page load, in milliseconds.
    #[arg(long, env = "MD2PDF_SETTLE_MS", default_value_t = 500)]
    settle_ms: u64,

    /// Engine timeout in seconds.
    #[arg(long, env = "MD2PDF_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Keep the temporary HTML page used for pdf/png/jpeg.
    #[arg(long, env = "MD2PDF_KEEP_TEMP_HTML")]
    keep_temp_html: bool,

    // ── Reporting ────────────────────────────────────────────────────────
    /// Print the conversion result as JSON on stdout.
    #[arg(long, env = "MD2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ExtensionArg {
    Containers,
    Checkbox,
    Emoji,
    HeadingSlugs,
    Diagrams,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", red("error:"), e);
            exit_code_for(&e)
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<ExitCode> {
    let selection: FormatSelection = cli.format.parse()?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(cli, progress_cb)?;

    let output = convert(&cli.file, &selection, &config)
        .await
        .with_context(|| format!("Conversion of '{}' failed", cli.file.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        print_summary(&output);
    }

    Ok(match output.into_result() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            if !cli.quiet && !cli.json {
                eprintln!("{} {}", red("error:"), e);
            }
            exit_code_for(&anyhow::Error::from(e))
        }
    })
}

fn exit_code_for(e: &anyhow::Error) -> ExitCode {
    ExitCode::from(exit_status(e))
}

/// 2 for bad input, 1 for everything else.
fn exit_status(e: &anyhow::Error) -> u8 {
    let user_error = e
        .downcast_ref::<Md2PdfError>()
        .is_some_and(Md2PdfError::is_user_error);
    if user_error {
        2
    } else {
        1
    }
}

/// Plain summary when the progress bar is off.
fn print_summary(output: &ConversionOutput) {
    for r in &output.results {
        match (&r.path, &r.error) {
            (Some(path), None) => eprintln!(
                "  {} {:<5} {}  {}",
                green("✓"),
                r.format,
                path.display(),
                dim(&format!("{}ms", r.duration_ms))
            ),
            (_, Some(err)) => eprintln!("  {} {:<5} {}", red("✗"), r.format, err),
            (None, None) => {}
        }
    }
    eprintln!(
        "Exported {}/{} formats in {}ms",
        output.stats.succeeded, output.stats.total_formats, output.stats.total_duration_ms
    );
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let default_formats = cli
        .default_type
        .iter()
        .map(|t| t.parse::<OutputFormat>())
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid --default-type")?;

    let disabled = |ext: ExtensionArg| cli.disabled_extensions.contains(&ext);
    let extensions = MarkdownExtensions {
        containers: !disabled(ExtensionArg::Containers),
        checkbox: !disabled(ExtensionArg::Checkbox),
        emoji: !disabled(ExtensionArg::Emoji),
        heading_slugs: !disabled(ExtensionArg::HeadingSlugs),
        diagrams: !disabled(ExtensionArg::Diagrams),
    };

    let pdf = PdfOptions {
        format: cli.paper,
        width: cli.width,
        height: cli.height,
        landscape: cli.landscape,
        scale: cli.scale,
        margins: Margins::uniform(cli.margin),
        print_background: !cli.no_background,
        display_header_footer: cli.display_header_footer,
        header_template: cli.header_template.clone(),
        footer_template: cli.footer_template.clone(),
        page_ranges: cli.page_ranges.clone(),
    };

    let mut builder = ConversionConfig::builder()
        .default_formats(default_formats)
        .output_directory_relative_to_file(cli.output_dir_relative_to_file)
        .include_default_styles(!cli.no_default_styles)
        .styles(cli.styles.clone())
        .styles_relative_to_file(!cli.styles_relative_to_root)
        .highlight(!cli.no_highlight)
        .highlight_theme(cli.highlight_theme.clone())
        .extensions(extensions)
        .breaks(cli.breaks)
        .plantuml_server(cli.plantuml_server.clone())
        .pdf(pdf)
        .jpeg_quality(cli.jpeg_quality)
        .viewport(cli.viewport_width, cli.viewport_height)
        .settle_ms(cli.settle_ms)
        .timeout_secs(cli.timeout)
        .keep_temp_html(cli.keep_temp_html);

    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_directory(dir.clone());
    }
    if let Some(ref root) = cli.project_root {
        builder = builder.project_root(root.clone());
    }
    if let Some(ref css) = cli.highlight_style {
        builder = builder.highlight_style(css.clone());
    }
    if let Some(ref template) = cli.template {
        builder = builder.template(template.clone());
    }
    if let Some(ref chrome) = cli.chrome_path {
        builder = builder.executable_path(chrome.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["md2pdf"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_map_to_default_config() {
        let cli = parse(&["pdf", "README.md"]);
        let config = build_config(&cli, None).unwrap();
        let defaults = ConversionConfig::default();
        assert_eq!(config.default_formats, defaults.default_formats);
        assert_eq!(config.pdf, defaults.pdf);
        assert_eq!(config.extensions, defaults.extensions);
        assert_eq!(config.jpeg_quality, defaults.jpeg_quality);
        assert!(config.styles_relative_to_file);
    }

    #[test]
    fn flags_reach_config() {
        let cli = parse(&[
            "all",
            "doc.md",
            "--default-type",
            "html,png",
            "--paper",
            "a4",
            "--margin",
            "1in",
            "--landscape",
            "--disable",
            "emoji,diagrams",
            "--style",
            "a.css",
            "--style",
            "https://x/b.css",
            "--output-dir",
            "~/exports",
        ]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(
            config.default_formats,
            vec![OutputFormat::Html, OutputFormat::Png]
        );
        assert_eq!(config.pdf.format, PaperFormat::A4);
        assert!(config.pdf.landscape);
        assert_eq!(config.pdf.margins.top.to_inches(), 1.0);
        assert!(!config.extensions.emoji);
        assert!(!config.extensions.diagrams);
        assert!(config.extensions.containers);
        assert_eq!(config.styles, vec!["a.css", "https://x/b.css"]);
        assert_eq!(config.output_directory.as_deref(), Some("~/exports"));
    }

    #[test]
    fn bad_default_type_rejected() {
        let cli = parse(&["settings", "doc.md", "--default-type", "docx"]);
        assert!(build_config(&cli, None).is_err());
    }

    #[test]
    fn unknown_format_is_user_error() {
        let err: anyhow::Error = "docx".parse::<FormatSelection>().unwrap_err().into();
        assert_eq!(exit_status(&err), 2);

        let err = anyhow::Error::from(Md2PdfError::PartialFailure {
            success: 1,
            failed: 1,
            total: 2,
        });
        assert_eq!(exit_status(&err), 1);
    }

    #[test]
    fn missing_source_is_user_error_through_context() {
        let err = anyhow::Error::from(Md2PdfError::FileNotFound {
            path: PathBuf::from("/nope.md"),
        })
        .context("Conversion of '/nope.md' failed");
        assert_eq!(exit_status(&err), 2);
    }
}
