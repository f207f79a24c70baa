//! Page template.
//!
//! Mustache templates rendered with `ramhorns`. The view has three fields:
//! `{{title}}` (escaped), `{{{style}}}` and `{{{content}}}` (raw HTML).

use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use ramhorns::{Content, Template};
use std::borrow::Cow;
use std::path::Path;

/// The bundled page template.
pub const DEFAULT_TEMPLATE: &str = include_str!("../../assets/template.html");

#[derive(Content)]
struct PageView<'a> {
    title: &'a str,
    style: &'a str,
    content: &'a str,
}

/// Template source, bundled or loaded from disk.
#[derive(Debug, Clone)]
pub struct PageTemplate {
    source: Cow<'static, str>,
}

impl Default for PageTemplate {
    fn default() -> Self {
        Self {
            source: Cow::Borrowed(DEFAULT_TEMPLATE),
        }
    }
}

impl PageTemplate {
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: Cow::Owned(source.into()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, Md2PdfError> {
        std::fs::read_to_string(path)
            .map(Self::from_source)
            .map_err(|e| {
                Md2PdfError::Template(format!("cannot read '{}': {}", path.display(), e))
            })
    }

    /// The configured template, or the bundled one.
    pub fn load(config: &ConversionConfig) -> Result<Self, Md2PdfError> {
        match &config.template {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn render(&self, title: &str, style: &str, content: &str) -> Result<String, Md2PdfError> {
        let template =
            Template::new(self.source.as_ref()).map_err(|e| Md2PdfError::Template(e.to_string()))?;
        Ok(template.render(&PageView {
            title,
            style,
            content,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_template_merges_view() {
        let html = PageTemplate::default()
            .render("a<b>.md", "<style>x</style>", "<p>hi</p>")
            .unwrap();
        assert!(html.contains("<title>a&lt;b&gt;.md</title>"), "got: {html}");
        assert!(html.contains("<style>x</style>"));
        assert!(html.contains("<p>hi</p>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn custom_template_source() {
        let tpl = PageTemplate::from_source("[{{title}}]{{{content}}}");
        assert_eq!(tpl.render("t", "", "<i>c</i>").unwrap(), "[t]<i>c</i>");
    }

    #[test]
    fn missing_template_file_is_an_error() {
        let err = PageTemplate::from_file(Path::new("/no/such/template.html")).unwrap_err();
        assert!(matches!(err, Md2PdfError::Template(_)));
    }
}
