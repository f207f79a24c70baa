//! Syntax highlighting for fenced code blocks.
//!
//! Highlighting is class-based (`ClassStyle::Spaced`): the HTML carries scope
//! names as classes and the colours live in a separate stylesheet produced by
//! [`theme_css`]. That keeps the page body identical across themes and lets a
//! user-supplied CSS file replace the generated theme wholesale.

use crate::pipeline::markdown::escape_html;
use once_cell::sync::Lazy;
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use tracing::{debug, warn};

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEMES: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

/// True when `lang` names a syntax the highlighter knows.
pub fn is_known_language(lang: &str) -> bool {
    !lang.is_empty() && SYNTAXES.find_syntax_by_token(lang).is_some()
}

/// Render a code block as `<pre class="hljs code"><code><div>…</div></code></pre>`.
///
/// Known languages are highlighted; anything else (no language, unknown
/// language, highlighter error) is HTML-escaped verbatim.
pub fn highlight_block(code: &str, lang: &str) -> String {
    let body = if is_known_language(lang) {
        match highlight_lines(code, lang) {
            Ok(html) => html,
            Err(e) => {
                warn!("Highlighting '{}' failed, falling back to plain text: {}", lang, e);
                escape_html(code)
            }
        }
    } else {
        escape_html(code)
    };
    format!("<pre class=\"hljs code\"><code><div>{body}</div></code></pre>\n")
}

fn highlight_lines(code: &str, lang: &str) -> Result<String, syntect::Error> {
    let syntax = SYNTAXES
        .find_syntax_by_token(lang)
        .unwrap_or_else(|| SYNTAXES.find_syntax_plain_text());
    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAXES, ClassStyle::Spaced);
    for line in LinesWithEndings::from(code) {
        generator.parse_html_for_line_which_includes_newline(line)?;
    }
    Ok(generator.finalize())
}

/// Stylesheet for a bundled theme, or `None` when the theme is unknown or
/// cannot be turned into CSS.
pub fn theme_css(name: &str) -> Option<String> {
    let Some(theme) = THEMES.themes.get(name) else {
        warn!(
            "Unknown highlight theme '{}'; available: {}",
            name,
            theme_names().join(", ")
        );
        return None;
    };
    match css_for_theme_with_class_style(theme, ClassStyle::Spaced) {
        Ok(css) => {
            debug!("Generated {} bytes of CSS for theme '{}'", css.len(), name);
            Some(css)
        }
        Err(e) => {
            warn!("Could not generate CSS for theme '{}': {}", name, e);
            None
        }
    }
}

/// Names of the bundled themes, sorted.
pub fn theme_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = THEMES.themes.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_language_gets_scope_classes() {
        let html = highlight_block("fn main() {}\n", "rust");
        assert!(html.starts_with("<pre class=\"hljs code\"><code><div>"));
        assert!(html.contains("<span class=\""), "got: {html}");
        assert!(html.contains("main"));
    }

    #[test]
    fn unknown_language_is_escaped() {
        let html = highlight_block("<b>&</b>\n", "no-such-lang");
        assert!(html.contains("&lt;b&gt;&amp;&lt;/b&gt;"));
        assert!(!html.contains("<span"));
    }

    #[test]
    fn empty_language_is_escaped() {
        assert!(!is_known_language(""));
        let html = highlight_block("a < b\n", "");
        assert!(html.contains("a &lt; b"));
    }

    #[test]
    fn default_theme_has_css() {
        let css = theme_css("InspiredGitHub").expect("bundled theme");
        assert!(css.contains(".code"));
        assert!(theme_css("not-a-theme").is_none());
        assert!(theme_names().contains(&"InspiredGitHub"));
    }
}
