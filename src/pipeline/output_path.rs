//! Where an export is written.
//!
//! By default the output sits next to the source with the extension
//! swapped: `/docs/guide.md` → `/docs/guide.pdf`. An output directory
//! relocates it:
//!
//! | `output_directory` | Directory used                                   | Created? |
//! |--------------------|--------------------------------------------------|----------|
//! | `~/exports`        | `$HOME/exports`                                  | yes      |
//! | `/srv/out`         | `/srv/out` (must exist)                          | no       |
//! | `out`              | `<project_root>/out`, else `<source dir>/out`    | yes      |

use crate::config::{ConversionConfig, OutputFormat};
use crate::error::Md2PdfError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Destination file for exporting `source` as `format`.
///
/// Creates a relative or home-relative output directory when missing.
pub async fn destination_path(
    source: &Path,
    format: OutputFormat,
    config: &ConversionConfig,
) -> Result<PathBuf, Md2PdfError> {
    let file_name = source
        .with_extension(format.extension())
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| {
            Md2PdfError::Internal(format!("source '{}' has no file name", source.display()))
        })?;

    let dir = output_dir(source, config).await?;
    let dest = dir.join(file_name);
    debug!("Destination for {}: {}", format, dest.display());
    Ok(dest)
}

/// The directory exports of `source` go to.
pub async fn output_dir(source: &Path, config: &ConversionConfig) -> Result<PathBuf, Md2PdfError> {
    let source_dir = source
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let Some(configured) = config
        .output_directory
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    else {
        return Ok(source_dir);
    };

    if configured.starts_with('~') {
        let dir = PathBuf::from(shellexpand::tilde(configured).into_owned());
        create_dir(&dir).await?;
        return Ok(dir);
    }

    let configured = Path::new(configured);
    if configured.is_absolute() {
        return if tokio::fs::metadata(configured)
            .await
            .is_ok_and(|m| m.is_dir())
        {
            Ok(configured.to_path_buf())
        } else {
            Err(Md2PdfError::OutputDirMissing {
                path: configured.to_path_buf(),
            })
        };
    }

    let base = match &config.project_root {
        Some(root) if !config.output_directory_relative_to_file => root.clone(),
        _ => source_dir,
    };
    let dir = base.join(configured);
    create_dir(&dir).await?;
    Ok(dir)
}

async fn create_dir(dir: &Path) -> Result<(), Md2PdfError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Md2PdfError::OutputDirCreateFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_to_source_directory() {
        let dest = destination_path(
            Path::new("/docs/guide.md"),
            OutputFormat::Jpeg,
            &ConversionConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(dest, PathBuf::from("/docs/guide.jpeg"));
    }

    #[tokio::test]
    async fn absolute_directory_must_exist() {
        let config = ConversionConfig::builder()
            .output_directory("/definitely/missing/dir")
            .build()
            .unwrap();
        let err = destination_path(Path::new("/docs/a.md"), OutputFormat::Pdf, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::OutputDirMissing { .. }));
    }

    #[tokio::test]
    async fn absolute_directory_used_as_is() {
        let out = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .output_directory(out.path().to_string_lossy())
            .build()
            .unwrap();
        let dest = destination_path(Path::new("/docs/a.md"), OutputFormat::Html, &config)
            .await
            .unwrap();
        assert_eq!(dest, out.path().join("a.html"));
    }

    #[tokio::test]
    async fn relative_directory_is_created_next_to_source() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("notes").join("a.md");
        let config = ConversionConfig::builder()
            .output_directory("build")
            .build()
            .unwrap();
        let dest = destination_path(&source, OutputFormat::Png, &config)
            .await
            .unwrap();
        assert_eq!(dest, root.path().join("notes").join("build").join("a.png"));
        assert!(root.path().join("notes").join("build").is_dir());
    }

    #[tokio::test]
    async fn relative_directory_prefers_project_root() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("notes").join("a.md");
        let config = ConversionConfig::builder()
            .output_directory("out")
            .project_root(root.path())
            .build()
            .unwrap();
        let dest = destination_path(&source, OutputFormat::Pdf, &config)
            .await
            .unwrap();
        assert_eq!(dest, root.path().join("out").join("a.pdf"));

        let config = ConversionConfig::builder()
            .output_directory("out")
            .project_root(root.path())
            .output_directory_relative_to_file(true)
            .build()
            .unwrap();
        let dest = destination_path(&source, OutputFormat::Pdf, &config)
            .await
            .unwrap();
        assert_eq!(dest, root.path().join("notes").join("out").join("a.pdf"));
    }
}
