//! Headless rendering engine.
//!
//! [`RenderEngine`] is the seam between the exporter and the browser: it
//! takes a `file://` URL and capture parameters and returns the output bytes.
//! [`ChromeEngine`] drives a local Chrome/Chromium over the DevTools
//! protocol; tests and embedders inject their own implementation through
//! [`crate::config::ConversionConfigBuilder::engine`].
//!
//! ## Why blocking?
//!
//! `headless_chrome` is a synchronous client. The exporter calls
//! [`RenderEngine::render`] inside `tokio::task::spawn_blocking`, so an
//! implementation may block freely.

use crate::config::{ConversionConfig, OutputFormat, PdfOptions};
use crate::error::EngineStage;
use headless_chrome::protocol::cdp::Page::{CaptureScreenshotFormatOption, Viewport};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// A failed engine session, tagged with the step that failed.
#[derive(Debug, Clone, Error)]
#[error("{stage} failed: {detail}")]
pub struct EngineError {
    pub stage: EngineStage,
    pub detail: String,
}

impl EngineError {
    pub fn new(stage: EngineStage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            detail: detail.into(),
        }
    }
}

/// Everything the engine needs to capture one page.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub format: OutputFormat,
    pub pdf: PdfOptions,
    pub jpeg_quality: u32,
    pub viewport: (u32, u32),
    /// Extra wait after navigation for late network activity.
    pub settle: Duration,
}

impl CaptureRequest {
    pub fn from_config(format: OutputFormat, config: &ConversionConfig) -> Self {
        Self {
            format,
            pdf: config.pdf.clone(),
            jpeg_quality: config.jpeg_quality,
            viewport: config.viewport,
            settle: Duration::from_millis(config.settle_ms),
        }
    }
}

/// Loads a page and captures it as PDF, PNG or JPEG.
///
/// One call is one complete session: implementations acquire whatever they
/// need (browser process, tab) and release it before returning, on success
/// and on error.
pub trait RenderEngine: Send + Sync {
    fn render(&self, url: &str, request: &CaptureRequest) -> Result<Vec<u8>, EngineError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "engine"
    }
}

/// Headless Chrome/Chromium.
#[derive(Debug, Clone)]
pub struct ChromeEngine {
    executable_path: Option<PathBuf>,
    timeout: Duration,
}

impl ChromeEngine {
    pub fn new(executable_path: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable_path,
            timeout,
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self::new(
            config.executable_path.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn launch(&self, request: &CaptureRequest) -> Result<Browser, EngineError> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .path(self.executable_path.clone())
            .window_size(Some(request.viewport))
            .idle_browser_timeout(self.timeout)
            .build()
            .map_err(|e| EngineError::new(EngineStage::Launch, e.to_string()))?;
        Browser::new(options).map_err(|e| EngineError::new(EngineStage::Launch, e.to_string()))
    }
}

impl RenderEngine for ChromeEngine {
    fn render(&self, url: &str, request: &CaptureRequest) -> Result<Vec<u8>, EngineError> {
        // The browser process is killed when `browser` is dropped, on every
        // return path below.
        let browser = self.launch(request)?;
        let tab = browser
            .new_tab()
            .map_err(|e| EngineError::new(EngineStage::Launch, e.to_string()))?;
        tab.set_default_timeout(self.timeout);
        debug!("Engine launched");

        tab.navigate_to(url)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| EngineError::new(EngineStage::Navigate, e.to_string()))?;
        if !request.settle.is_zero() {
            std::thread::sleep(request.settle);
        }
        debug!("Page loaded: {}", url);

        match request.format {
            OutputFormat::Pdf => print_pdf(&tab, &request.pdf),
            OutputFormat::Png => screenshot(&tab, CaptureScreenshotFormatOption::Png, None, request),
            OutputFormat::Jpeg => screenshot(
                &tab,
                CaptureScreenshotFormatOption::Jpeg,
                Some(request.jpeg_quality),
                request,
            ),
            OutputFormat::Html => Err(EngineError::new(
                EngineStage::Capture,
                "html is written directly, not captured",
            )),
        }
    }

    fn name(&self) -> &str {
        "chrome"
    }
}

fn print_pdf(tab: &Tab, pdf: &PdfOptions) -> Result<Vec<u8>, EngineError> {
    let (paper_width, paper_height) = pdf.paper_size_inches();
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    let options = PrintToPdfOptions {
        landscape: Some(pdf.landscape),
        display_header_footer: Some(pdf.display_header_footer),
        print_background: Some(pdf.print_background),
        scale: Some(pdf.scale),
        paper_width: Some(paper_width),
        paper_height: Some(paper_height),
        margin_top: Some(pdf.margins.top.to_inches()),
        margin_bottom: Some(pdf.margins.bottom.to_inches()),
        margin_left: Some(pdf.margins.left.to_inches()),
        margin_right: Some(pdf.margins.right.to_inches()),
        page_ranges: non_empty(&pdf.page_ranges),
        header_template: non_empty(&pdf.header_template),
        footer_template: non_empty(&pdf.footer_template),
        prefer_css_page_size: Some(false),
        ..Default::default()
    };
    tab.print_to_pdf(Some(options))
        .map_err(|e| EngineError::new(EngineStage::Capture, e.to_string()))
}

/// Full-page screenshot: the clip covers the whole scrollable document.
fn screenshot(
    tab: &Tab,
    format: CaptureScreenshotFormatOption,
    quality: Option<u32>,
    request: &CaptureRequest,
) -> Result<Vec<u8>, EngineError> {
    let (width, height) = document_size(tab).unwrap_or((
        f64::from(request.viewport.0),
        f64::from(request.viewport.1),
    ));
    let clip = Viewport {
        x: 0.0,
        y: 0.0,
        width: width.max(f64::from(request.viewport.0)),
        height: height.max(1.0),
        scale: 1.0,
    };
    tab.capture_screenshot(format, quality, Some(clip), true)
        .map_err(|e| EngineError::new(EngineStage::Capture, e.to_string()))
}

fn document_size(tab: &Tab) -> Option<(f64, f64)> {
    let result = tab
        .evaluate(
            "JSON.stringify([document.documentElement.scrollWidth, document.documentElement.scrollHeight])",
            false,
        )
        .ok()?;
    let raw = result.value?;
    serde_json::from_str::<(f64, f64)>(raw.as_str()?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_request_copies_config() {
        let config = ConversionConfig::builder()
            .jpeg_quality(80)
            .viewport(1024, 768)
            .settle_ms(0)
            .build()
            .unwrap();
        let req = CaptureRequest::from_config(OutputFormat::Jpeg, &config);
        assert_eq!(req.format, OutputFormat::Jpeg);
        assert_eq!(req.jpeg_quality, 80);
        assert_eq!(req.viewport, (1024, 768));
        assert!(req.settle.is_zero());
    }

    #[test]
    fn engine_error_display_names_stage() {
        let e = EngineError::new(EngineStage::Navigate, "net::ERR_FILE_NOT_FOUND");
        assert_eq!(e.to_string(), "navigate failed: net::ERR_FILE_NOT_FOUND");
    }

    #[test]
    fn chrome_engine_from_config() {
        let config = ConversionConfig::builder()
            .executable_path("/usr/bin/chromium")
            .timeout_secs(5)
            .build()
            .unwrap();
        let engine = ChromeEngine::from_config(&config);
        assert_eq!(engine.name(), "chrome");
        assert_eq!(engine.executable_path, Some(PathBuf::from("/usr/bin/chromium")));
        assert_eq!(engine.timeout, Duration::from_secs(5));
    }
}
