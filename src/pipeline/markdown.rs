//! Markdown → HTML fragment, with reference-resolution hooks.
//!
//! ## Hooks
//!
//! The parser's event stream is rewritten before it reaches the HTML writer:
//!
//! * **Image hook**: every Markdown image destination goes through
//!   [`resolve_or_original`], for every target format.
//! * **Raw-HTML hook**: `src` attributes of `<img>` tags inside raw HTML
//!   (blocks and inline) are resolved the same way, but only for rasterised
//!   targets. An `html` export keeps the author's markup byte for byte.
//!
//! Both hooks are infallible: a reference that cannot be resolved is logged
//! and kept as written.
//!
//! ## Extensions
//!
//! Capabilities are fixed at construction as an ordered list of
//! [`Extension`]s; the renderer is never reconfigured afterwards.

use crate::config::{ConversionConfig, Extension};
use crate::pipeline::context::DocumentContext;
use crate::pipeline::resolve::resolve_or_original;
use crate::pipeline::{diagram, highlight};
use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Markdown renderer with a fixed set of extensions.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    extensions: Vec<Extension>,
    breaks: bool,
    highlight: bool,
    plantuml_server: String,
}

impl MarkdownRenderer {
    /// Renderer with the given extensions, highlighting on, no hard breaks.
    pub fn new(extensions: Vec<Extension>) -> Self {
        Self {
            extensions,
            breaks: false,
            highlight: true,
            plantuml_server: "https://kroki.io".to_string(),
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self::new(config.extensions.enabled())
            .with_breaks(config.breaks)
            .with_highlight(config.highlight)
            .with_plantuml_server(config.plantuml_server.clone())
    }

    #[must_use]
    pub fn with_breaks(mut self, breaks: bool) -> Self {
        self.breaks = breaks;
        self
    }

    #[must_use]
    pub fn with_highlight(mut self, highlight: bool) -> Self {
        self.highlight = highlight;
        self
    }

    #[must_use]
    pub fn with_plantuml_server(mut self, server: impl Into<String>) -> Self {
        self.plantuml_server = server.into();
        self
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    fn has(&self, ext: Extension) -> bool {
        self.extensions.contains(&ext)
    }

    fn parser_options(&self) -> Options {
        let mut opts = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_HEADING_ATTRIBUTES;
        if self.has(Extension::Checkbox) {
            opts |= Options::ENABLE_TASKLISTS;
        }
        opts
    }

    /// Render `text` to an HTML fragment, resolving references against `ctx`.
    pub fn render(&self, text: &str, ctx: &DocumentContext) -> String {
        let source = if self.has(Extension::Containers) {
            expand_containers(text)
        } else {
            Cow::Borrowed(text)
        };

        let mut rewriter = Rewriter::new(self, ctx);
        for event in Parser::new_ext(&source, self.parser_options()) {
            rewriter.feed(event);
        }

        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, rewriter.finish().into_iter());
        out
    }
}

// ── Event rewriting ──────────────────────────────────────────────────────

struct HeadingBuf<'a> {
    level: HeadingLevel,
    id: Option<CowStr<'a>>,
    classes: Vec<CowStr<'a>>,
    attrs: Vec<(CowStr<'a>, Option<CowStr<'a>>)>,
    events: Vec<Event<'a>>,
}

struct CodeBuf {
    lang: String,
    text: String,
}

struct Rewriter<'r, 'a> {
    renderer: &'r MarkdownRenderer,
    ctx: &'r DocumentContext,
    out: Vec<Event<'a>>,
    heading: Option<HeadingBuf<'a>>,
    code: Option<CodeBuf>,
    html_block: Option<String>,
    slugs: HashMap<String, usize>,
}

impl<'r, 'a> Rewriter<'r, 'a> {
    fn new(renderer: &'r MarkdownRenderer, ctx: &'r DocumentContext) -> Self {
        Self {
            renderer,
            ctx,
            out: Vec::new(),
            heading: None,
            code: None,
            html_block: None,
            slugs: HashMap::new(),
        }
    }

    fn emit(&mut self, event: Event<'a>) {
        match self.heading.as_mut() {
            Some(h) => h.events.push(event),
            None => self.out.push(event),
        }
    }

    fn feed(&mut self, event: Event<'a>) {
        match event {
            // Code blocks: buffered whole, then highlighted or turned into a diagram.
            Event::Start(Tag::CodeBlock(kind)) => {
                self.code = Some(CodeBuf {
                    lang: fence_language(&kind),
                    text: String::new(),
                });
            }
            Event::Text(t) if self.code.is_some() => {
                if let Some(code) = self.code.as_mut() {
                    code.text.push_str(&t);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(code) = self.code.take() {
                    let html = self.render_code(&code);
                    self.emit(Event::Html(html.into()));
                }
            }

            // Raw HTML blocks arrive line by line; a tag may span lines.
            Event::Start(Tag::HtmlBlock) => self.html_block = Some(String::new()),
            Event::Html(chunk) if self.html_block.is_some() => {
                if let Some(buf) = self.html_block.as_mut() {
                    buf.push_str(&chunk);
                }
            }
            Event::End(TagEnd::HtmlBlock) => {
                if let Some(block) = self.html_block.take() {
                    let html = self.rewrite_raw_html(&block);
                    self.emit(Event::Html(html.into()));
                }
            }
            Event::Html(chunk) => {
                let html = self.rewrite_raw_html(&chunk);
                self.emit(Event::Html(html.into()));
            }
            Event::InlineHtml(chunk) => {
                let html = self.rewrite_raw_html(&chunk);
                self.emit(Event::InlineHtml(html.into()));
            }

            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                self.heading = Some(HeadingBuf {
                    level,
                    id,
                    classes,
                    attrs,
                    events: Vec::new(),
                });
            }
            Event::End(TagEnd::Heading(level)) => self.finish_heading(level),

            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                let resolved = resolve_or_original(&dest_url, self.ctx);
                self.emit(Event::Start(Tag::Image {
                    link_type,
                    dest_url: resolved.into(),
                    title,
                    id,
                }));
            }

            Event::Text(t) if self.renderer.has(Extension::Emoji) => {
                let replaced = match replace_emoji(&t) {
                    Cow::Borrowed(_) => None,
                    Cow::Owned(s) => Some(s),
                };
                self.emit(Event::Text(replaced.map_or(t, CowStr::from)));
            }
            Event::SoftBreak if self.renderer.breaks => self.emit(Event::HardBreak),
            other => self.emit(other),
        }
    }

    fn finish_heading(&mut self, level: HeadingLevel) {
        let Some(h) = self.heading.take() else {
            self.out.push(Event::End(TagEnd::Heading(level)));
            return;
        };
        let id = match h.id {
            Some(id) => Some(id),
            None if self.renderer.has(Extension::HeadingSlugs) => {
                let text = heading_text(&h.events);
                Some(self.unique_slug(&text).into())
            }
            None => None,
        };
        self.out.push(Event::Start(Tag::Heading {
            level: h.level,
            id,
            classes: h.classes,
            attrs: h.attrs,
        }));
        self.out.extend(h.events);
        self.out.push(Event::End(TagEnd::Heading(level)));
    }

    fn unique_slug(&mut self, text: &str) -> String {
        let base = slugify(text);
        let seen = self.slugs.entry(base.clone()).or_insert(0);
        let slug = if *seen == 0 {
            base
        } else {
            format!("{base}-{seen}")
        };
        *seen += 1;
        slug
    }

    fn render_code(&self, code: &CodeBuf) -> String {
        if self.renderer.has(Extension::Diagrams) && diagram::is_plantuml(&code.lang, &code.text) {
            return diagram::render_plantuml(&self.renderer.plantuml_server, &code.text);
        }
        if self.renderer.highlight {
            return highlight::highlight_block(&code.text, &code.lang);
        }
        if code.lang.is_empty() {
            format!("<pre><code>{}</code></pre>\n", escape_html(&code.text))
        } else {
            format!(
                "<pre><code class=\"language-{}\">{}</code></pre>\n",
                escape_html(&code.lang),
                escape_html(&code.text)
            )
        }
    }

    fn rewrite_raw_html(&self, html: &str) -> String {
        if !self.ctx.format().is_rasterized() {
            return html.to_string();
        }
        rewrite_img_sources(html, self.ctx).into_owned()
    }

    fn finish(self) -> Vec<Event<'a>> {
        let mut out = self.out;
        // An unterminated heading cannot happen with a well-formed stream,
        // but never drop its content.
        if let Some(h) = self.heading {
            out.extend(h.events);
        }
        out
    }
}

fn fence_language(kind: &CodeBlockKind<'_>) -> String {
    match kind {
        CodeBlockKind::Fenced(info) => info
            .split(|c: char| c.is_whitespace() || c == ',')
            .next()
            .unwrap_or_default()
            .to_string(),
        CodeBlockKind::Indented => String::new(),
    }
}

fn heading_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        if let Event::Text(t) | Event::Code(t) = event {
            text.push_str(t);
        }
    }
    text
}

// ── Raw HTML <img src> rewriting ─────────────────────────────────────────

static IMG_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(<img\b[^>]*?\ssrc\s*=\s*)(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .unwrap()
});

/// Resolve the `src` of every `<img>` tag in `html`.
///
/// Rewritten attributes are always double-quoted.
pub fn rewrite_img_sources<'h>(html: &'h str, ctx: &DocumentContext) -> Cow<'h, str> {
    IMG_SRC.replace_all(html, |caps: &Captures<'_>| {
        let src = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map_or("", |m| m.as_str());
        let resolved = resolve_or_original(src, ctx);
        format!("{}\"{}\"", &caps[1], resolved.replace('"', "&quot;"))
    })
}

// ── Containers ───────────────────────────────────────────────────────────

static CONTAINER_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}:{3,}[ \t]*([^:\s].*?)[ \t]*$").unwrap());
static CONTAINER_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ {0,3}:{3,}[ \t]*$").unwrap());
static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})").unwrap());

/// Turn `::: name` … `:::` fences into `<div class="name">` … `</div>`.
///
/// The divs are emitted as standalone HTML blocks surrounded by blank lines
/// so the Markdown between them is still parsed. Lines inside fenced code
/// are left alone, and a `:::` with nothing open is kept as text.
/// Containers still open at the end of the input are closed there.
pub fn expand_containers(text: &str) -> Cow<'_, str> {
    if !text.contains(":::") {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 64);
    let mut fence: Option<(char, usize)> = None;
    let mut depth = 0usize;

    for line in text.lines() {
        if let Some((ch, len)) = fence {
            let trimmed = line.trim_start();
            let run = trimmed.chars().take_while(|&c| c == ch).count();
            if run >= len && trimmed[run * ch.len_utf8()..].trim().is_empty() {
                fence = None;
            }
        } else if let Some(caps) = FENCE_OPEN.captures(line) {
            let marker = &caps[1];
            fence = marker.chars().next().map(|ch| (ch, marker.len()));
        } else if depth > 0 && CONTAINER_CLOSE.is_match(line) {
            depth -= 1;
            out.push_str("\n</div>\n\n");
            continue;
        } else if let Some(caps) = CONTAINER_OPEN.captures(line) {
            depth += 1;
            let _ = write!(out, "\n<div class=\"{}\">\n\n", escape_html(&caps[1]));
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    for _ in 0..depth {
        out.push_str("\n</div>\n");
    }
    Cow::Owned(out)
}

// ── Emoji ────────────────────────────────────────────────────────────────

static EMOJI_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r":([a-z0-9_+\-]+):").unwrap());

static EMOJI: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("+1", "👍"),
        ("-1", "👎"),
        ("thumbsup", "👍"),
        ("thumbsdown", "👎"),
        ("smile", "😄"),
        ("smiley", "😃"),
        ("grinning", "😀"),
        ("laughing", "😆"),
        ("joy", "😂"),
        ("wink", "😉"),
        ("blush", "😊"),
        ("sunglasses", "😎"),
        ("thinking", "🤔"),
        ("cry", "😢"),
        ("heart", "❤️"),
        ("tada", "🎉"),
        ("rocket", "🚀"),
        ("sparkles", "✨"),
        ("fire", "🔥"),
        ("star", "⭐"),
        ("zap", "⚡"),
        ("warning", "⚠️"),
        ("x", "❌"),
        ("white_check_mark", "✅"),
        ("heavy_check_mark", "✔️"),
        ("question", "❓"),
        ("exclamation", "❗"),
        ("information_source", "ℹ️"),
        ("bulb", "💡"),
        ("memo", "📝"),
        ("book", "📖"),
        ("bug", "🐛"),
        ("construction", "🚧"),
        ("lock", "🔒"),
        ("key", "🔑"),
        ("link", "🔗"),
        ("mag", "🔍"),
        ("gear", "⚙️"),
        ("wrench", "🔧"),
        ("hammer", "🔨"),
        ("package", "📦"),
        ("calendar", "📅"),
        ("hourglass", "⌛"),
        ("coffee", "☕"),
        ("eyes", "👀"),
        ("clap", "👏"),
        ("wave", "👋"),
        ("ok_hand", "👌"),
        ("muscle", "💪"),
        ("pray", "🙏"),
        ("point_right", "👉"),
        ("checkered_flag", "🏁"),
        ("chart_with_upwards_trend", "📈"),
    ]
    .into_iter()
    .collect()
});

/// Replace known `:shortcode:`s with their emoji. Unknown codes stay as typed.
pub fn replace_emoji(text: &str) -> Cow<'_, str> {
    if !text.contains(':') {
        return Cow::Borrowed(text);
    }
    EMOJI_CODE.replace_all(text, |caps: &Captures<'_>| {
        EMOJI
            .get(&caps[1])
            .map_or_else(|| caps[0].to_string(), |e| (*e).to_string())
    })
}

// ── Heading slugs ────────────────────────────────────────────────────────

const SLUG_PUNCTUATION: &str = r##"[]!"#$%&'()*+,./:;<=>?@\^_{|}~`"##;

/// Characters `encodeURI` would escape that can survive punctuation removal.
const SLUG_ESCAPES: &AsciiSet = &CONTROLS.add(b' ');

/// Anchor id for a heading.
///
/// Trim, lowercase, drop ASCII punctuation other than `-`, collapse
/// whitespace runs to `-`, trim `-` from both ends, then URI-encode.
pub fn slugify(text: &str) -> String {
    let stripped: String = text
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !SLUG_PUNCTUATION.contains(*c))
        .collect();
    let dashed = stripped.split_whitespace().collect::<Vec<_>>().join("-");
    utf8_percent_encode(dashed.trim_matches('-'), SLUG_ESCAPES).to_string()
}

/// Minimal HTML escaping for text and attribute values.
pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MarkdownExtensions, OutputFormat};
    use crate::pipeline::context::PathStyle;

    fn ctx(format: OutputFormat) -> DocumentContext {
        DocumentContext::for_base("/docs", format, PathStyle::Posix)
    }

    fn renderer() -> MarkdownRenderer {
        MarkdownRenderer::new(MarkdownExtensions::default().enabled())
    }

    #[test]
    fn html_target_keeps_image_paths() {
        let html = renderer().render("# Title\n![x](pic.png)\n", &ctx(OutputFormat::Html));
        assert!(html.contains("<h1"), "got: {html}");
        assert!(html.contains(r#"src="pic.png""#), "got: {html}");
    }

    #[test]
    fn pdf_target_absolutizes_image_paths() {
        let html = renderer().render("![x](images/a.png)\n", &ctx(OutputFormat::Pdf));
        assert!(html.contains(r#"src="file:///docs/images/a.png""#), "got: {html}");
    }

    #[test]
    fn raw_html_images_rewritten_only_for_rasterized_targets() {
        let md = "<div>\n<img width=\"10\" src=\"img/b.png\">\n</div>\n\nText <img src='c.png'> here.\n";
        let html = renderer().render(md, &ctx(OutputFormat::Png));
        assert!(html.contains(r#"src="file:///docs/img/b.png""#), "got: {html}");
        assert!(html.contains(r#"src="file:///docs/c.png""#), "got: {html}");
        assert!(html.contains("width=\"10\""));

        let html = renderer().render(md, &ctx(OutputFormat::Html));
        assert!(html.contains(r#"src="img/b.png""#), "got: {html}");
        assert!(html.contains("src='c.png'"), "got: {html}");
    }

    #[test]
    fn raw_html_data_src_left_alone() {
        let html = renderer().render(
            "<img data-src=\"lazy.png\" src=\"pic.png\">\n",
            &ctx(OutputFormat::Pdf),
        );
        assert!(html.contains(r#"src="file:///docs/pic.png""#), "got: {html}");
        assert!(html.contains(r#"data-src="lazy.png""#), "got: {html}");
    }

    #[test]
    fn http_images_untouched() {
        let html = renderer().render(
            "![x](https://example.com/a.png)\n",
            &ctx(OutputFormat::Jpeg),
        );
        assert!(html.contains(r#"src="https://example.com/a.png""#));
    }

    #[test]
    fn headings_get_unique_slugs() {
        let html = renderer().render(
            "# Getting Started!\n\n## Getting Started\n\n## Déjà vu\n",
            &ctx(OutputFormat::Html),
        );
        assert!(html.contains(r#"<h1 id="getting-started">"#), "got: {html}");
        assert!(html.contains(r#"<h2 id="getting-started-1">"#), "got: {html}");
        assert!(html.contains(r#"id="d%C3%A9j%C3%A0-vu""#), "got: {html}");
    }

    #[test]
    fn explicit_heading_id_wins() {
        let html = renderer().render("# Intro {#start}\n", &ctx(OutputFormat::Html));
        assert!(html.contains(r#"<h1 id="start">"#), "got: {html}");
    }

    #[test]
    fn slugs_disabled() {
        let ext = MarkdownExtensions {
            heading_slugs: false,
            ..MarkdownExtensions::default()
        };
        let html = MarkdownRenderer::new(ext.enabled()).render("# Intro\n", &ctx(OutputFormat::Html));
        assert!(html.contains("<h1>Intro</h1>"), "got: {html}");
    }

    #[test]
    fn slugify_rules() {
        assert_eq!(slugify("  Hello, World!  "), "hello-world");
        assert_eq!(slugify("a_b c--d"), "ab-c--d");
        assert_eq!(slugify("-- edge --"), "edge");
        assert_eq!(slugify("Ünïcode"), "%C3%BCn%C3%AFcode");
    }

    #[test]
    fn containers_become_divs() {
        let md = "::: warning\nBe **careful**.\n:::\n";
        let html = renderer().render(md, &ctx(OutputFormat::Html));
        assert!(html.contains(r#"<div class="warning">"#), "got: {html}");
        assert!(html.contains("<strong>careful</strong>"), "got: {html}");
        assert!(html.contains("</div>"));
    }

    #[test]
    fn containers_ignored_inside_fences() {
        let md = "```\n::: note\n```\n";
        assert_eq!(expand_containers(md), "```\n::: note\n```\n");
    }

    #[test]
    fn stray_closing_marker_kept() {
        assert_eq!(expand_containers(":::\n"), ":::\n");
        assert_eq!(expand_containers("::::\ntext\n"), "::::\ntext\n");
    }

    #[test]
    fn unclosed_containers_closed_at_end() {
        let out = expand_containers("::: outer\n::: inner\ntext\n");
        assert_eq!(out.matches("<div").count(), 2, "got: {out}");
        assert_eq!(out.matches("</div>").count(), 2, "got: {out}");
        assert!(out.trim_end().ends_with("</div>"), "got: {out}");
    }

    #[test]
    fn checkboxes_render_as_inputs() {
        let html = renderer().render("- [x] done\n- [ ] todo\n", &ctx(OutputFormat::Html));
        assert!(html.contains("type=\"checkbox\""), "got: {html}");
        assert!(html.contains("checked"), "got: {html}");
    }

    #[test]
    fn emoji_shortcodes() {
        assert_eq!(replace_emoji("ship it :rocket:"), "ship it 🚀");
        assert_eq!(replace_emoji(":not_an_emoji:"), ":not_an_emoji:");
        assert_eq!(replace_emoji("10:30"), "10:30");
        let html = renderer().render("Nice :+1:\n", &ctx(OutputFormat::Html));
        assert!(html.contains("Nice 👍"), "got: {html}");
    }

    #[test]
    fn emoji_not_applied_in_code() {
        let html = renderer().render("```\n:rocket:\n```\n", &ctx(OutputFormat::Html));
        assert!(html.contains(":rocket:"), "got: {html}");
    }

    #[test]
    fn code_blocks_highlighted() {
        let html = renderer().render("```rust\nlet x = 1;\n```\n", &ctx(OutputFormat::Html));
        assert!(html.contains("<pre class=\"hljs code\"><code><div>"), "got: {html}");
        assert!(html.contains("<span"), "got: {html}");
    }

    #[test]
    fn highlighting_disabled_uses_language_class() {
        let html = renderer()
            .with_highlight(false)
            .render("```rust\nlet x = 1 < 2;\n```\n", &ctx(OutputFormat::Html));
        assert!(html.contains(r#"<code class="language-rust">"#), "got: {html}");
        assert!(html.contains("1 &lt; 2"));
    }

    #[test]
    fn plantuml_blocks_become_images() {
        let html = renderer()
            .with_plantuml_server("http://localhost:8000")
            .render("```plantuml\nA -> B\n```\n", &ctx(OutputFormat::Pdf));
        assert!(
            html.contains(r#"src="http://localhost:8000/plantuml/svg/"#),
            "got: {html}"
        );
    }

    #[test]
    fn soft_breaks_follow_config() {
        let md = "one\ntwo\n";
        let html = renderer().render(md, &ctx(OutputFormat::Html));
        assert!(!html.contains("<br"));
        let html = renderer().with_breaks(true).render(md, &ctx(OutputFormat::Html));
        assert!(html.contains("<br />"), "got: {html}");
    }

    #[test]
    fn tables_and_footnotes_enabled() {
        let md = "| a | b |\n|---|---|\n| 1 | 2 |\n\nNote[^1].\n\n[^1]: Footnote.\n";
        let html = renderer().render(md, &ctx(OutputFormat::Html));
        assert!(html.contains("<table>"), "got: {html}");
        assert!(html.contains("footnote"), "got: {html}");
    }
}
