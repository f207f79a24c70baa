//! PlantUML diagram blocks.
//!
//! A fenced block tagged `plantuml`/`puml`, or an untagged fence whose body
//! starts with `@startuml`, is replaced by an `<img>` whose URL asks a
//! Kroki-compatible server to render it:
//!
//! ```text
//! <server>/plantuml/svg/<base64url(zlib(source))>
//! ```
//!
//! The page therefore needs network access when it is rendered; nothing is
//! fetched while the HTML is assembled.

use crate::pipeline::markdown::escape_html;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

/// True for a code block that should be rendered as a PlantUML diagram.
pub fn is_plantuml(lang: &str, source: &str) -> bool {
    match lang {
        "plantuml" | "puml" => true,
        "" => source.trim_start().starts_with("@startuml"),
        _ => false,
    }
}

/// Rendering URL for `source` on `server`.
pub fn plantuml_url(server: &str, source: &str) -> std::io::Result<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(source.trim().as_bytes())?;
    let compressed = encoder.finish()?;
    Ok(format!(
        "{}/plantuml/svg/{}",
        server.trim_end_matches('/'),
        URL_SAFE.encode(compressed)
    ))
}

/// `<img>` markup for a diagram block, or an escaped `<pre>` when the
/// payload cannot be encoded.
pub fn render_plantuml(server: &str, source: &str) -> String {
    match plantuml_url(server, source) {
        Ok(url) => format!(
            "<p><img class=\"plantuml\" src=\"{}\" alt=\"PlantUML diagram\"></p>\n",
            escape_html(&url)
        ),
        Err(e) => {
            tracing::warn!("Could not encode PlantUML block: {}", e);
            format!("<pre><code>{}</code></pre>\n", escape_html(source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    #[test]
    fn detects_tagged_and_untagged_blocks() {
        assert!(is_plantuml("plantuml", "A -> B"));
        assert!(is_plantuml("puml", ""));
        assert!(is_plantuml("", "  @startuml\nA -> B\n@enduml"));
        assert!(!is_plantuml("", "A -> B"));
        assert!(!is_plantuml("rust", "@startuml"));
    }

    #[test]
    fn url_payload_decodes_back_to_source() {
        let url = plantuml_url("https://kroki.io/", "A -> B: hello\n").unwrap();
        let payload = url
            .strip_prefix("https://kroki.io/plantuml/svg/")
            .expect("server prefix without doubled slash");
        let compressed = URL_SAFE.decode(payload).unwrap();
        let mut source = String::new();
        ZlibDecoder::new(&compressed[..])
            .read_to_string(&mut source)
            .unwrap();
        assert_eq!(source, "A -> B: hello");
    }

    #[test]
    fn rendered_block_is_an_image() {
        let html = render_plantuml("https://kroki.io", "A -> B");
        assert!(html.contains("<img class=\"plantuml\" src=\"https://kroki.io/plantuml/svg/"));
    }
}
