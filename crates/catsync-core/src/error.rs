use std::path::PathBuf;

use thiserror::Error;

/// All errors that can occur in catsync-core.
///
/// Input errors (`FileNotFound`, `InvalidJson`, `UnexpectedShape`) are raised
/// before anything is written. Write errors (`Backup`, `Write`) leave the
/// catalog untouched.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("invalid JSON in {}: {source}", path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: expected an array or an object wrapping one of [{expected}], found {found}", path.display())]
    UnexpectedShape {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("backup of {} failed, catalog left untouched: {source}", path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writing {} failed: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CatalogError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::FileNotFound(_) => ExitCode::NotFound,
            Self::InvalidJson { .. } | Self::UnexpectedShape { .. } => ExitCode::InvalidInput,
            Self::Config(_) | Self::TomlParse(_) => ExitCode::InvalidArgs,
            Self::Backup { .. } | Self::Write { .. } | Self::Io(_) => ExitCode::FileSystemError,
            Self::Json(_) | Self::TomlSerialize(_) => ExitCode::GeneralError,
        }
    }
}

/// Exit codes used by the `catsync` binary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    FileSystemError = 4,
    InvalidInput = 5,
}

pub type Result<T> = std::result::Result<T, CatalogError>;
