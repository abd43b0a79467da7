use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

use crate::migrator::MigrationResult;

/// Failure of a single external tool invocation
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{program}: command not found")]
    NotFound { program: String },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Migration run errors
#[derive(Error, Debug)]
pub enum MigrateError {
    /// The container tool could not produce an image
    #[error("conversion failed: {0}")]
    ConversionFailed(String),

    /// A conversion failed while failures were not being skipped
    #[error("aborted on {} after {processed} file(s): {message}", file.display())]
    FatalAbort {
        file: PathBuf,
        processed: usize,
        message: String,
        results: Vec<MigrationResult>,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MigrateError>;
