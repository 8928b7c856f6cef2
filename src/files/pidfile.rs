//! PID file for the resident daemon.
//!
//! The file is created exclusively: if it already exists another daemon is
//! assumed to be running and startup fails. The owning guard removes the file
//! when dropped.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Exclusive PID file, removed on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create the PID file and record the current PID in it.
    ///
    /// Fails with [`Error::AlreadyRunning`] if the file already exists,
    /// whether or not the recorded process is still alive.
    pub fn create(path: &Path) -> Result<Self> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let pid = read_pid(path);
                let alive = pid
                    .as_deref()
                    .and_then(|p| p.parse().ok())
                    .is_some_and(is_pid_alive);
                return Err(Error::AlreadyRunning {
                    path: path.to_path_buf(),
                    pid: pid.unwrap_or_else(|| "unknown".to_string()),
                    alive,
                });
            }
            Err(source) => return Err(pid_file_error(path, source)),
        };

        writeln!(file, "{}", std::process::id()).map_err(|e| pid_file_error(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Rewrite the file with the current PID (after forking into the background).
    pub fn record_current(&self) -> Result<()> {
        fs::write(&self.path, format!("{}\n", std::process::id()))
            .map_err(|e| pid_file_error(&self.path, e))
    }

    /// Remove the file now, for when the process is about to be replaced
    /// and `Drop` will never run.
    pub fn release(self) -> Result<()> {
        let mut this = ManuallyDrop::new(self);
        let path = std::mem::take(&mut this.path);
        match fs::remove_file(&path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(pid_file_error(&path, err)),
            _ => Ok(()),
        }
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Read the PID recorded in a PID file, if any.
pub fn read_pid(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    let pid = contents.trim();
    (!pid.is_empty()).then(|| pid.to_string())
}

/// Check whether a process with the given PID is still running.
///
/// Uses `kill(pid, 0)` which checks for process existence without sending a signal.
/// Returns `true` if the process exists, even when owned by another user (EPERM).
pub fn is_pid_alive(pid: u32) -> bool {
    // 0 and values past pid_t would address process groups instead.
    if pid == 0 || pid > libc::pid_t::MAX as u32 {
        return false;
    }
    // SAFETY: kill with signal 0 only checks process existence, no signal is sent.
    let ret = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if ret == 0 {
        return true;
    }
    // EPERM means the process exists but belongs to another user
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

fn pid_file_error(path: &Path, source: io::Error) -> Error {
    Error::PidFile {
        path: path.to_path_buf(),
        source,
    }
}
