//! Source loading: validate the Markdown path and read it into memory.
//!
//! The path is made absolute here, once, because everything downstream
//! (base directory for references, output location, page title) derives
//! from it.

use crate::error::Md2PdfError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A Markdown file read in full.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// UTF-8 text with any byte-order mark removed.
    pub text: String,
}

/// Resolve `input` to an absolute path and read it.
///
/// A leading `~` is expanded to the home directory.
pub async fn load_source(input: impl AsRef<Path>) -> Result<SourceDocument, Md2PdfError> {
    let path = absolute_source_path(input.as_ref())?;

    if !path.exists() {
        return Err(Md2PdfError::FileNotFound { path });
    }

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => Md2PdfError::FileNotFound { path: path.clone() },
        ErrorKind::PermissionDenied => Md2PdfError::PermissionDenied { path: path.clone() },
        _ => Md2PdfError::ReadFailed {
            path: path.clone(),
            source: e,
        },
    })?;

    let mut text =
        String::from_utf8(bytes).map_err(|_| Md2PdfError::NotUtf8 { path: path.clone() })?;
    if text.starts_with('\u{feff}') {
        text.replace_range(..'\u{feff}'.len_utf8(), "");
    }

    debug!("Loaded {} ({} bytes)", path.display(), text.len());
    Ok(SourceDocument { path, text })
}

fn absolute_source_path(input: &Path) -> Result<PathBuf, Md2PdfError> {
    let expanded = PathBuf::from(shellexpand::tilde(&input.to_string_lossy()).into_owned());
    std::path::absolute(&expanded).map_err(|e| Md2PdfError::ReadFailed {
        path: expanded,
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_source(dir.path().join("nope.md")).await.unwrap_err();
        assert!(matches!(err, Md2PdfError::FileNotFound { .. }));
        assert!(err.is_user_error());
    }

    #[tokio::test]
    async fn reads_text_and_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "\u{feff}# Hi\n").unwrap();
        let doc = load_source(&path).await.unwrap();
        assert_eq!(doc.text, "# Hi\n");
        assert!(doc.path.is_absolute());
    }

    #[tokio::test]
    async fn invalid_utf8_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin.md");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x41]).unwrap();
        assert!(matches!(
            load_source(&path).await,
            Err(Md2PdfError::NotUtf8 { .. })
        ));
    }

    #[test]
    fn relative_paths_become_absolute() {
        let p = absolute_source_path(Path::new("docs/readme.md")).unwrap();
        assert!(p.is_absolute());
        assert!(p.ends_with("docs/readme.md"));
    }
}
