// src/error.rs

use std::collections::TryReserveError;
use std::process::ExitCode;
use thiserror::Error;

/// Core error types for ploc
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The registry file (or its directory) could not be opened
    #[error("Failed to open database: {0}")]
    DatabaseOpen(String),

    /// Schema creation or migration failed
    #[error("Failed to initialize database: {0}")]
    StoreUnavailable(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The install source cannot be opened for reading
    #[error("Failed to open input package at {path}: {source}")]
    SourceMissing {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Creating, copying, renaming or unlinking an installed artifact failed
    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A package with the same name is already recorded at this path
    #[error("{name} is already installed at {path} (use --force to overwrite)")]
    Conflict { name: String, path: String },

    /// No record matches the requested name or name/path pair
    #[error("{0} not found")]
    NotFound(String),

    /// The operator gave no usable selection while disambiguating
    #[error("No package selected: {0}")]
    NoSelection(String),

    /// Buffering disambiguation candidates failed to allocate
    #[error("Out of memory while collecting packages: {0}")]
    ResourceExhausted(#[from] TryReserveError),

    /// Malformed package name, group or destination
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias using ploc's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit codes reported by the `ploc` binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Ok = 0,
    DatabaseFailure = 1,
    InitFailure = 2,
    FilesystemFailure = 3,
    Conflict = 4,
    OutOfMemory = 5,
    ArgumentSyntax = 6,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status as u8)
    }
}

impl Error {
    /// Exit code the CLI reports when this error ends an invocation
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Error::Database(_) | Error::DatabaseOpen(_) => ExitStatus::DatabaseFailure,
            Error::StoreUnavailable(_) => ExitStatus::InitFailure,
            Error::Io(_) | Error::SourceMissing { .. } | Error::Filesystem { .. } => {
                ExitStatus::FilesystemFailure
            }
            Error::Conflict { .. } | Error::NotFound(_) | Error::NoSelection(_) => {
                ExitStatus::Conflict
            }
            Error::ResourceExhausted(_) => ExitStatus::OutOfMemory,
            Error::InvalidArgument(_) => ExitStatus::ArgumentSyntax,
        }
    }
}
