//! Reference resolution: turn image and stylesheet references into URIs that
//! load correctly from wherever the rendered page ends up.
//!
//! ## Why absolutise at all?
//!
//! An `html` export sits next to the Markdown source, so the browser resolves
//! `images/a.png` exactly as the author meant. A `pdf`/`png`/`jpeg` export
//! is rendered from a temporary page that the engine loads from a different
//! place, so every local reference must become an absolute `file://` URI
//! first or the image silently disappears from the capture.
//!
//! ## Shapes handled
//!
//! | Input                 | Rasterised target                 |
//! |-----------------------|-----------------------------------|
//! | `images/a.png`        | `file:///docs/images/a.png`       |
//! | `/tmp/a.png`          | `file:///tmp/a.png`               |
//! | `C:\docs\a.png`       | `file:///C:/docs/a.png`           |
//! | `\\srv\share\a.png`   | `file://srv/share/a.png`          |
//! | `~/pics/a.png`        | `file:///home/me/pics/a.png`      |
//! | `file://a.png`        | `file:///a.png`                   |
//! | `https://x/a.png`     | unchanged                         |
//!
//! Everything here is string manipulation over [`DocumentContext`]; no
//! function in this module touches the file system or the environment.

use crate::config::OutputFormat;
use crate::error::ResolveError;
use crate::pipeline::context::{DocumentContext, PathStyle};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::Path;
use tracing::{debug, warn};

/// Characters escaped when a file path is turned into a stylesheet or
/// navigation URL.
const FILE_URL_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Resolve an image reference for the context's target format.
///
/// Returns the reference unchanged when it is empty or already a non-`file`
/// URL. For `html` targets a plain path comes back decoded and quote-stripped
/// but otherwise untouched; for rasterised targets it becomes an absolute
/// `file://` URI with `#` escaped as `%23`.
///
/// # Errors
/// [`ResolveError::InvalidEncoding`] when percent-decoding yields bytes that
/// are not UTF-8.
pub fn resolve_reference(reference: &str, ctx: &DocumentContext) -> Result<String, ResolveError> {
    if reference.is_empty() {
        return Ok(String::new());
    }

    let cleaned = decode_and_unquote(reference)?;
    let href = cleaned.replace('\\', "/").replace('#', "%23");

    match scheme_of(&href, ctx.path_style()) {
        Some("file") => Ok(normalize_file_uri(&href)),
        Some(_) => Ok(reference.to_string()),
        None if ctx.format() == OutputFormat::Html => Ok(cleaned),
        None => Ok(absolutize(&href, ctx)),
    }
}

/// [`resolve_reference`], falling back to the reference as written.
///
/// This is what the Markdown hooks call: one bad reference must never stop
/// the rest of the document from rendering.
pub fn resolve_or_original(reference: &str, ctx: &DocumentContext) -> String {
    match resolve_reference(reference, ctx) {
        Ok(resolved) => {
            if resolved != reference {
                debug!("Resolved '{}' → '{}'", reference, resolved);
            }
            resolved
        }
        Err(e) => {
            warn!("{e}; keeping it as written");
            reference.to_string()
        }
    }
}

/// Resolve a stylesheet reference for a `<link href>`.
///
/// * `http`/`https` URLs are returned unchanged.
/// * `~/…` becomes a file URL under the home directory.
/// * Absolute paths and `file:` URIs become file URLs.
/// * Relative paths are joined to `project_root` when one is given;
///   otherwise they follow `html`-target rules and stay relative.
pub fn resolve_style_href(
    href: &str,
    ctx: &DocumentContext,
    project_root: Option<&str>,
) -> Result<String, ResolveError> {
    if href.is_empty() {
        return Ok(String::new());
    }
    let style = ctx.path_style();

    match scheme_of(href, style) {
        Some("http") | Some("https") => return Ok(href.to_string()),
        Some("file") => return resolve_reference(href, ctx),
        Some(_) => return Ok(href.to_string()),
        None => {}
    }

    if let (Some(rest), Some(home)) = (strip_home(href), ctx.home_dir()) {
        return Ok(encode_file_url(&resolve_path(home, rest, style)));
    }
    if is_absolute(href, style) {
        return Ok(encode_file_url(&resolve_path("/", href, style)));
    }
    if let Some(root) = project_root {
        return Ok(encode_file_url(&resolve_path(root, href, style)));
    }
    resolve_reference(href, &ctx.with_format(OutputFormat::Html))
}

/// Build a `file://` URI from an absolute, `/`-separated path.
///
/// `//server/share/…` gets `file:`, `/…` gets `file://`, and drive-letter
/// paths get `file:///`, so every result has the canonical slash count.
pub fn file_uri(absolute_path: &str) -> String {
    if absolute_path.starts_with("//") {
        format!("file:{absolute_path}")
    } else if absolute_path.starts_with('/') {
        format!("file://{absolute_path}")
    } else {
        format!("file:///{absolute_path}")
    }
}

/// Percent-encoded `file://` URL for a path on this machine, used to point
/// the engine at the temporary page.
pub fn file_url_for_path(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    encode_file_url(&s)
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn decode_and_unquote(reference: &str) -> Result<String, ResolveError> {
    let decoded = percent_decode_str(reference).decode_utf8().map_err(|_| {
        ResolveError::InvalidEncoding {
            reference: reference.to_string(),
        }
    })?;
    Ok(decoded.replace(['"', '\''], ""))
}

fn encode_file_url(path: &str) -> String {
    file_uri(&utf8_percent_encode(path, FILE_URL_ESCAPES).to_string())
}

/// URI scheme of `s`, if any. A single letter before `:` is a drive letter
/// under Windows rules, not a scheme.
fn scheme_of(s: &str, style: PathStyle) -> Option<&str> {
    let colon = s.find(':')?;
    let candidate = &s[..colon];
    let mut chars = candidate.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic()
        || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    if style == PathStyle::Windows && candidate.len() == 1 {
        return None;
    }
    Some(candidate)
}

/// `file:` URI with exactly three slashes after the scheme, unless it
/// already had three or more.
fn normalize_file_uri(href: &str) -> String {
    let rest = &href["file:".len()..];
    let slashes = rest.bytes().take_while(|&b| b == b'/').count();
    if slashes >= 3 {
        href.to_string()
    } else {
        format!("file:///{}", &rest[slashes..])
    }
}

fn strip_home(href: &str) -> Option<&str> {
    if href == "~" {
        Some("")
    } else {
        href.strip_prefix("~/").or_else(|| href.strip_prefix("~\\"))
    }
}

fn absolutize(href: &str, ctx: &DocumentContext) -> String {
    let style = ctx.path_style();
    let resolved = match (strip_home(href), ctx.home_dir()) {
        (Some(rest), Some(home)) => resolve_path(home, rest, style),
        _ => resolve_path(ctx.base_directory(), href, style),
    };
    file_uri(&resolved.replace('\\', "/").replace('#', "%23"))
}

fn is_absolute(path: &str, style: PathStyle) -> bool {
    !matches!(split_root(path, style), Root::Relative)
}

#[derive(Debug, PartialEq, Eq)]
enum Root {
    /// `//server/share`
    Unc(String),
    /// `C:`
    Drive(String),
    /// Leading `/` without a drive.
    Rooted,
    Relative,
}

/// Split a `/`-separated path into its root and the remaining tail.
fn split_root(path: &str, style: PathStyle) -> Root {
    match style {
        PathStyle::Posix => {
            if path.starts_with('/') {
                Root::Rooted
            } else {
                Root::Relative
            }
        }
        PathStyle::Windows => {
            let p = path.replace('\\', "/");
            if let Some(unc) = p.strip_prefix("//") {
                let mut parts = unc.splitn(3, '/');
                let server = parts.next().unwrap_or_default();
                let share = parts.next().unwrap_or_default();
                return Root::Unc(format!("//{server}/{share}"));
            }
            let bytes = p.as_bytes();
            if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
                return Root::Drive(p[..2].to_string());
            }
            if p.starts_with('/') {
                Root::Rooted
            } else {
                Root::Relative
            }
        }
    }
}

fn root_len(root: &Root, path: &str) -> usize {
    match root {
        Root::Unc(r) | Root::Drive(r) => r.len().min(path.len()),
        Root::Rooted | Root::Relative => 0,
    }
}

/// Resolve `reference` against the absolute directory `base`, collapsing
/// `.` and `..`, and return a `/`-separated absolute path without a
/// trailing slash.
pub(crate) fn resolve_path(base: &str, reference: &str, style: PathStyle) -> String {
    let base = base.replace('\\', "/");
    let reference = reference.replace('\\', "/");

    let base_root = split_root(&base, style);
    let ref_root = split_root(&reference, style);

    let (root, segments): (Root, Vec<&str>) = match ref_root {
        Root::Unc(_) | Root::Drive(_) => {
            let tail = &reference[root_len(&ref_root, &reference)..];
            (ref_root, tail.split('/').collect())
        }
        Root::Rooted => (base_root, reference.split('/').collect()),
        Root::Relative => {
            let tail = &base[root_len(&base_root, &base)..];
            let segs = tail.split('/').chain(reference.split('/')).collect();
            (base_root, segs)
        }
    };

    let mut stack: Vec<&str> = Vec::with_capacity(segments.len());
    for seg in segments {
        match seg {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            s => stack.push(s),
        }
    }

    let prefix = match root {
        Root::Unc(r) | Root::Drive(r) => format!("{r}/"),
        Root::Rooted | Root::Relative => "/".to_string(),
    };
    format!("{prefix}{}", stack.join("/"))
}
