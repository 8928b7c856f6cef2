//! Shutdown invocation.
//!
//! autohalt never powers the machine off itself. It replaces its own process
//! image with the system shutdown program, asking for an immediate halt.

use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::ShutdownConfig;
use crate::error::{Error, Result};
use crate::files::PidFile;

/// Arguments always appended after the operator's extras.
pub const HALT_ARGS: [&str; 2] = ["-h", "now"];

/// Something that can bring the machine down.
pub trait Halt {
    /// Request the halt. A real implementation does not return on success.
    fn halt(&mut self) -> Result<()>;
}

/// The shutdown program and the arguments it is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownCommand {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl ShutdownCommand {
    pub fn new(program: impl Into<PathBuf>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    /// Configured arguments first, then the ones given after `--`.
    pub fn from_config(config: &ShutdownConfig, extra_args: &[String]) -> Self {
        let args = config.args.iter().chain(extra_args).cloned().collect();
        Self::new(&config.program, args)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full argument list, excluding the program itself.
    pub fn arguments(&self) -> Vec<String> {
        self.extra_args
            .iter()
            .map(String::as_str)
            .chain(HALT_ARGS)
            .map(str::to_string)
            .collect()
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.arguments());
        command
    }

    /// Replace this process with the shutdown program.
    ///
    /// Only returns if the program could not be started.
    pub fn exec(&self) -> Error {
        tracing::warn!(
            program = %self.program.display(),
            args = ?self.arguments(),
            "Nobody logged in for the whole interval, shutting down"
        );
        let source = self.command().exec();
        Error::Shutdown {
            program: self.program.clone(),
            source,
        }
    }
}

impl Halt for ShutdownCommand {
    fn halt(&mut self) -> Result<()> {
        Err(self.exec())
    }
}

/// Removes the daemon's PID file right before halting.
///
/// The shutdown program replaces this process, so the guard's `Drop` would
/// never run and a failed or cancelled shutdown would block every restart.
pub struct ReleasePidFile<H> {
    inner: H,
    pid_file: Option<PidFile>,
}

impl<H: Halt> ReleasePidFile<H> {
    pub fn new(inner: H, pid_file: PidFile) -> Self {
        Self {
            inner,
            pid_file: Some(pid_file),
        }
    }
}

impl<H: Halt> Halt for ReleasePidFile<H> {
    fn halt(&mut self) -> Result<()> {
        if let Some(pid_file) = self.pid_file.take() {
            if let Err(err) = pid_file.release() {
                tracing::warn!(error = %err, "Failed to remove PID file, halting anyway");
            }
        }
        self.inner.halt()
    }
}
