//! Style aggregation.
//!
//! A page's `<head>` gets, in this order:
//!
//! 1. the bundled base Markdown stylesheet,
//! 2. the syntax-highlighting theme,
//! 3. the bundled print/rasterisation overrides,
//! 4. one `<link>` per extra stylesheet reference.
//!
//! Later rules win in the CSS cascade, so the order is fixed. A stylesheet
//! that cannot be produced (unreadable highlight CSS, unknown theme)
//! contributes an empty block instead of failing the page.

use crate::config::ConversionConfig;
use crate::pipeline::context::DocumentContext;
use crate::pipeline::highlight;
use crate::pipeline::markdown::escape_html;
use crate::pipeline::resolve::resolve_style_href;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Base Markdown styles.
pub const MARKDOWN_CSS: &str = include_str!("../../assets/styles/markdown.css");

/// Print and rasterisation overrides, applied last among the bundled sheets.
pub const MARKDOWN_PDF_CSS: &str = include_str!("../../assets/styles/markdown-pdf.css");

/// Ordered sequence of style blocks for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleBundle {
    blocks: Vec<String>,
}

impl StyleBundle {
    pub fn push(&mut self, block: String) {
        if !block.is_empty() {
            self.blocks.push(block);
        }
    }

    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Concatenate every block, in order.
    pub fn render(&self) -> String {
        self.blocks.concat()
    }
}

/// Collect the style blocks for a page rendered from `ctx`.
pub fn build_styles(
    ctx: &DocumentContext,
    extra_sheet_refs: &[String],
    config: &ConversionConfig,
) -> StyleBundle {
    let mut bundle = StyleBundle::default();

    if config.include_default_styles {
        bundle.push(style_block(MARKDOWN_CSS));
    }
    if config.highlight {
        bundle.push(style_block(&highlight_css(ctx, config)));
    }
    if config.include_default_styles {
        bundle.push(style_block(MARKDOWN_PDF_CSS));
    }

    let project_root = if config.styles_relative_to_file {
        None
    } else {
        config
            .project_root
            .as_deref()
            .map(|p| p.to_string_lossy().into_owned())
    };
    for reference in extra_sheet_refs {
        bundle.push(link_tag(reference, ctx, project_root.as_deref()));
    }

    debug!("Built {} style blocks", bundle.blocks().len());
    bundle
}

/// `<style>` element for `css`, or nothing when `css` is empty.
fn style_block(css: &str) -> String {
    if css.trim().is_empty() {
        return String::new();
    }
    format!("<style>\n{css}\n</style>\n")
}

fn link_tag(reference: &str, ctx: &DocumentContext, project_root: Option<&str>) -> String {
    let href = match resolve_style_href(reference, ctx, project_root) {
        Ok(href) => href,
        Err(e) => {
            warn!("{e}; linking stylesheet as written");
            reference.to_string()
        }
    };
    if href.is_empty() {
        return String::new();
    }
    format!(
        "<link rel=\"stylesheet\" href=\"{}\" type=\"text/css\">\n",
        escape_html(&href)
    )
}

/// Highlighting CSS: the configured file if any, else the bundled theme.
fn highlight_css(ctx: &DocumentContext, config: &ConversionConfig) -> String {
    if let Some(path) = &config.highlight_style {
        let path = relative_to_source(path, ctx);
        return match std::fs::read_to_string(&path) {
            Ok(css) => css,
            Err(e) => {
                warn!("Cannot read highlight style '{}': {}", path.display(), e);
                String::new()
            }
        };
    }
    highlight::theme_css(&config.highlight_theme).unwrap_or_default()
}

fn relative_to_source(path: &Path, ctx: &DocumentContext) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
    if expanded.is_absolute() {
        expanded
    } else {
        Path::new(ctx.base_directory()).join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::pipeline::context::PathStyle;

    fn ctx() -> DocumentContext {
        DocumentContext::for_base("/docs", OutputFormat::Pdf, PathStyle::Posix)
            .with_home_dir("/home/ada")
    }

    #[test]
    fn bundled_sheets_in_fixed_order() {
        let bundle = build_styles(&ctx(), &[], &ConversionConfig::default());
        let css = bundle.render();
        let base = css.find("word-wrap: break-word").expect("base sheet");
        let theme = css.find("generated by syntect").expect("theme sheet");
        let overrides = css.find("Print and rasterisation overrides").expect("pdf sheet");
        assert!(base < theme && theme < overrides);
        assert_eq!(bundle.blocks().len(), 3);
    }

    #[test]
    fn default_styles_can_be_disabled() {
        let config = ConversionConfig::builder()
            .include_default_styles(false)
            .highlight(false)
            .build()
            .unwrap();
        assert!(build_styles(&ctx(), &[], &config).is_empty());
    }

    #[test]
    fn extra_sheets_become_links_after_bundled_styles() {
        let refs = vec![
            "https://cdn.example.com/a.css".to_string(),
            "~/my.css".to_string(),
            "css/local.css".to_string(),
        ];
        let bundle = build_styles(&ctx(), &refs, &ConversionConfig::default());
        let blocks = bundle.blocks();
        assert_eq!(blocks.len(), 6);
        assert_eq!(
            blocks[3],
            "<link rel=\"stylesheet\" href=\"https://cdn.example.com/a.css\" type=\"text/css\">\n"
        );
        assert!(blocks[4].contains("href=\"file:///home/ada/my.css\""));
        assert!(blocks[5].contains("href=\"css/local.css\""));
    }

    #[test]
    fn relative_sheets_use_project_root_when_configured() {
        let config = ConversionConfig::builder()
            .include_default_styles(false)
            .highlight(false)
            .project_root("/project")
            .styles_relative_to_file(false)
            .build()
            .unwrap();
        let bundle = build_styles(&ctx(), &["css/a.css".to_string()], &config);
        assert!(bundle.render().contains("href=\"file:///project/css/a.css\""));
    }

    #[test]
    fn unreadable_highlight_style_contributes_nothing() {
        let config = ConversionConfig::builder()
            .include_default_styles(false)
            .highlight_style("/definitely/not/here.css")
            .build()
            .unwrap();
        assert!(build_styles(&ctx(), &[], &config).is_empty());
    }

    #[test]
    fn custom_highlight_style_is_inlined() {
        let dir = tempfile::tempdir().unwrap();
        let css_path = dir.path().join("hl.css");
        std::fs::write(&css_path, ".hljs { color: red; }").unwrap();
        let config = ConversionConfig::builder()
            .include_default_styles(false)
            .highlight_style(&css_path)
            .build()
            .unwrap();
        let css = build_styles(&ctx(), &[], &config).render();
        assert_eq!(css, "<style>\n.hljs { color: red; }\n</style>\n");
    }
}
