//! Configuration type definitions and defaults

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::interval::{Interval, IntervalError};
use crate::ledger::DEFAULT_SESSION_LOG;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// An interval as written in the config file: plain seconds or unit tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntervalSetting {
    Seconds(u64),
    Tokens(String),
}

impl IntervalSetting {
    /// Resolve to an interval. Zero means "not configured".
    pub fn resolve(&self) -> Result<Option<Interval>, IntervalError> {
        match self {
            IntervalSetting::Seconds(secs) => Ok(Interval::from_secs(*secs)),
            IntervalSetting::Tokens(tokens) => match Interval::parse_list(tokens) {
                Err(IntervalError::Zero) => Ok(None),
                other => other,
            },
        }
    }
}

/// Daemon lifecycle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Required quiescence interval; re-read on SIGHUP
    #[serde(default)]
    pub interval: Option<IntervalSetting>,
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,
}

pub fn default_pid_file() -> PathBuf {
    PathBuf::from("/run/autohaltd.pid")
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval: None,
            pid_file: default_pid_file(),
        }
    }
}

/// Shutdown invocation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownConfig {
    #[serde(default = "default_shutdown_program")]
    pub program: PathBuf,
    /// Arguments placed before the command-line extras
    #[serde(default)]
    pub args: Vec<String>,
}

pub fn default_shutdown_program() -> PathBuf {
    PathBuf::from("/sbin/shutdown")
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            program: default_shutdown_program(),
            args: Vec::new(),
        }
    }
}

/// Session accounting log configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_session_log")]
    pub session_log: PathBuf,
}

pub fn default_session_log() -> PathBuf {
    PathBuf::from(DEFAULT_SESSION_LOG)
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            session_log: default_session_log(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Append logs here instead of stderr (stderr is gone once daemonized)
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Tracing filter directive, e.g. `debug` or `autohalt=trace`
    #[serde(default)]
    pub level: Option<String>,
}
