//! Error taxonomy shared by both binaries.
//!
//! Usage errors exit with status 2 and never have side effects. Every other
//! error is a runtime failure, exits with status 1 and is never retried.

use std::io;
use std::path::PathBuf;

use crate::interval::IntervalError;
use crate::ledger::LedgerError;

/// Exit status for runtime failures.
pub const EXIT_FAILURE: u8 = 1;

/// Exit status for malformed invocations.
pub const EXIT_USAGE: u8 = 2;

/// Errors that terminate an autohalt process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Failed to load config file {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Already running: {path} exists (pid {pid}{})", alive_note(.alive))]
    AlreadyRunning {
        path: PathBuf,
        pid: String,
        alive: bool,
    },

    #[error("PID file {path}: {source}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to daemonize ({context}): {source}")]
    Daemonize {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] io::Error),

    #[error("Failed to execute {program}: {source}")]
    Shutdown {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Usage(_) | Error::Interval(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }

    /// Whether the operator should be pointed at `--help`.
    pub fn is_usage(&self) -> bool {
        self.exit_code() == EXIT_USAGE
    }
}

fn alive_note(alive: &bool) -> &'static str {
    if *alive {
        ""
    } else {
        ", not alive"
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
