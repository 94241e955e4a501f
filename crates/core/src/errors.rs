//! Error types for the resynthesis core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Ownership errors
// ---------------------------------------------------------------------------

/// Errors from parsing, serializing, or discovering ownership files.
#[derive(Debug, Error)]
pub enum OwnershipError {
    /// The ownership file is malformed (e.g. a glob before any header).
    #[error("error parsing ownership file: line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A strategy cannot be serialized because no owner is known for it.
    #[error("failed to resolve owner for strategy {identifier}: no owner was provided, and no package name is available")]
    MissingOwner { identifier: String },

    /// An ownership file could not be read.
    #[error("ownership I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed while searching for ownership files.
    #[error("ownership discovery failed: {0}")]
    Walk(#[from] walkdir::Error),
}

// ---------------------------------------------------------------------------
// Merge errors
// ---------------------------------------------------------------------------

/// Errors raised while applying a merge strategy to one file.
#[derive(Debug, Error)]
pub enum MergeError {
    /// None of the three revisions carries the named identity field.
    #[error("failed to determine {field} because no input files were provided")]
    UnresolvedIdentity { field: &'static str },

    /// The external (local) merge command failed.
    #[error(transparent)]
    ExternalCommand(#[from] ExternalCommandError),
}

/// Errors from running an external merge command.
#[derive(Debug, Error)]
pub enum ExternalCommandError {
    /// The scoped temp directory or one of its files could not be created.
    #[error("failed to prepare merge temp files: {0}")]
    TempFile(#[from] std::io::Error),

    /// The command could not be started.
    #[error("failed to run local merge strategy: {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command exited with a non-zero status.
    #[error("failed to run local merge strategy: {command} (exit {exit_code}): {stderr}")]
    NonZeroExit {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// The resolved file exists but could not be read back.
    #[error("failed to read merge result at '{path}': {source}")]
    ReadResult {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Bundle errors
// ---------------------------------------------------------------------------

/// Errors from reading or writing bundle directories.
#[derive(Debug, Error)]
pub enum BundleError {
    /// A bundle file or directory could not be read or written.
    #[error("bundle I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error("bundle traversal failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// The pull-request descriptor could not be serialized.
    #[error("failed to serialize pull request descriptor: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = OwnershipError::Syntax {
            line: 3,
            message: "encountered unexpected glob outside of a strategy section".into(),
        };
        assert_eq!(
            err.to_string(),
            "error parsing ownership file: line 3: encountered unexpected glob outside of a strategy section"
        );

        let err = MergeError::UnresolvedIdentity {
            field: "repository name",
        };
        assert!(err.to_string().contains("repository name"));

        let err = ExternalCommandError::NonZeroExit {
            command: "false".into(),
            exit_code: 1,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("exit 1"));

        let err = ConfigError::InvalidValue {
            field: "package.name".into(),
            detail: "must not be empty".into(),
        };
        assert!(err.to_string().contains("package.name"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let merge_err: MergeError = ExternalCommandError::TempFile(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        ))
        .into();
        assert!(matches!(merge_err, MergeError::ExternalCommand(_)));

        let core_err: CoreError = merge_err.into();
        assert!(matches!(core_err, CoreError::Merge(_)));

        let core_err: CoreError = OwnershipError::MissingOwner {
            identifier: "x".into(),
        }
        .into();
        assert!(matches!(core_err, CoreError::Ownership(_)));
    }
}
