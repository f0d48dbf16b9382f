//! Error types shared by the mirroring pipeline.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::scan::ParseError;
use crate::tools::ToolError;

/// Broad classification of a failure, independent of the context it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Registry or upstream manifest is missing, unreadable or malformed
    Configuration,
    /// An expected directory is absent or is not a directory
    Structural,
    /// Malformed import declarations
    Parse,
    /// Copy, read or write failure
    Io,
    /// The dependency-lock tool or the VCS failed
    ExternalTool,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Structural => "structural",
            ErrorKind::Parse => "parse",
            ErrorKind::Io => "io",
            ErrorKind::ExternalTool => "external tool",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while mirroring or tagging
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Registry or manifest problem
    #[error("Invalid configuration in {}: {message}", .path.display())]
    Configuration { path: PathBuf, message: String },

    /// An internal import path does not map to a package directory upstream
    #[error("Expected internal package dir at {} for import {import}", .dir.display())]
    MissingPackage { import: String, dir: PathBuf },

    /// A configured API path does not exist upstream
    #[error("API path {} is not a directory", .path.display())]
    MissingApiPath { path: PathBuf },

    /// Tagging was requested for an operator that has not been mirrored
    #[error("No mirror for {slug} at {} (run `mirror` first)", .dir.display())]
    MissingMirror { slug: String, dir: PathBuf },

    /// Malformed import section
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Filesystem failure
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External tool failure
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Failure while processing one operator
    #[error("operator {slug}: {source}")]
    Operator {
        slug: String,
        #[source]
        source: Box<MirrorError>,
    },
}

impl MirrorError {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn config(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        MirrorError::Configuration {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub(crate) fn for_operator(slug: &str, err: MirrorError) -> Self {
        MirrorError::Operator {
            slug: slug.to_string(),
            source: Box::new(err),
        }
    }

    /// The kind of the underlying failure; wrappers report their inner kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MirrorError::Configuration { .. } => ErrorKind::Configuration,
            MirrorError::MissingPackage { .. }
            | MirrorError::MissingApiPath { .. }
            | MirrorError::MissingMirror { .. } => ErrorKind::Structural,
            MirrorError::Parse(_) => ErrorKind::Parse,
            MirrorError::Io { .. } => ErrorKind::Io,
            MirrorError::Tool(_) => ErrorKind::ExternalTool,
            MirrorError::Operator { source, .. } => source.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_wrapper_keeps_kind() {
        let inner = MirrorError::MissingPackage {
            import: "example.com/up/internal/gone".to_string(),
            dir: PathBuf::from("/src/internal/gone"),
        };
        let err = MirrorError::for_operator("widgets", inner);

        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(
            err.to_string(),
            "operator widgets: Expected internal package dir at /src/internal/gone for import example.com/up/internal/gone"
        );
        assert_eq!(err.to_string().matches("example.com/up/internal/gone").count(), 1);
    }

    #[test]
    fn test_io_error_names_path() {
        let err = MirrorError::io(
            "/mirror/api/v1/types.go",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("/mirror/api/v1/types.go"));
    }
}
