//! Page assembly: Markdown fragment + styles + title → complete HTML document.

use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use crate::pipeline::context::DocumentContext;
use crate::pipeline::markdown::MarkdownRenderer;
use crate::pipeline::styles::build_styles;
use crate::pipeline::template::PageTemplate;
use tracing::debug;

/// A complete, self-contained HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    title: String,
    html: String,
}

impl RenderedPage {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }
}

/// Render `source_text` into a page for `ctx`'s target format.
///
/// Reference resolution depends on the format, so a multi-format batch
/// renders one page per format.
///
/// # Errors
/// Only [`Md2PdfError::Template`]: reference and stylesheet problems are
/// recovered inside the render.
pub fn render_page(
    ctx: &DocumentContext,
    source_text: &str,
    config: &ConversionConfig,
) -> Result<RenderedPage, Md2PdfError> {
    let content = MarkdownRenderer::from_config(config).render(source_text, ctx);
    let styles = build_styles(ctx, &config.styles, config);
    let title = ctx.title();

    let html = PageTemplate::load(config)?.render(&title, &styles.render(), &content)?;
    debug!(
        "Rendered {} page for '{}' ({} bytes)",
        ctx.format(),
        title,
        html.len()
    );
    Ok(RenderedPage { title, html })
}
