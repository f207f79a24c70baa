//! Per-request document context.
//!
//! A [`DocumentContext`] is built once per conversion and per format and is
//! never mutated afterwards. It carries everything the path resolver needs
//! (base directory, target format, path convention, home directory) so the
//! resolver itself stays a pure function with no ambient reads.

use crate::config::OutputFormat;
use std::path::{Path, PathBuf};

/// Path convention used when resolving references.
///
/// Resolution is done on strings, not on [`std::path`], so both conventions
/// behave the same on every host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// `/`-rooted paths.
    Posix,
    /// Drive-letter (`C:/`) and UNC (`//server/share`) paths; `\` is a separator.
    Windows,
}

impl PathStyle {
    /// The convention of the host OS.
    pub fn native() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Posix
        }
    }
}

/// Immutable bundle of source path, base directory and target format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContext {
    source_path: PathBuf,
    base_directory: String,
    format: OutputFormat,
    path_style: PathStyle,
    home_dir: Option<String>,
}

impl DocumentContext {
    /// Context for `source_path` (expected absolute) rendered as `format`.
    ///
    /// The home directory is looked up here, once, so later resolution does
    /// not touch the environment.
    pub fn new(source_path: impl Into<PathBuf>, format: OutputFormat) -> Self {
        let source_path = source_path.into();
        let base_directory = source_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let home = shellexpand::tilde("~").into_owned();
        let home_dir = (home != "~").then_some(home);

        Self {
            source_path,
            base_directory,
            format,
            path_style: PathStyle::native(),
            home_dir,
        }
    }

    /// Context with an explicit base directory and path convention, for
    /// callers that resolve references without a source file on disk.
    pub fn for_base(
        base_directory: impl Into<String>,
        format: OutputFormat,
        path_style: PathStyle,
    ) -> Self {
        let base_directory = base_directory.into();
        Self {
            source_path: PathBuf::from(&base_directory),
            base_directory,
            format,
            path_style,
            home_dir: None,
        }
    }

    pub fn with_home_dir(mut self, home: impl Into<String>) -> Self {
        self.home_dir = Some(home.into());
        self
    }

    /// Sibling context targeting another format.
    pub fn with_format(&self, format: OutputFormat) -> Self {
        Self {
            format,
            ..self.clone()
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn base_directory(&self) -> &str {
        &self.base_directory
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn path_style(&self) -> PathStyle {
        self.path_style
    }

    pub fn home_dir(&self) -> Option<&str> {
        self.home_dir.as_deref()
    }

    /// Page title: the source file's name, extension included.
    pub fn title(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
