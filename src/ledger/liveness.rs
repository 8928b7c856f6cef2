//! Liveness check for logged-in user sessions.
//!
//! The accounting log is advisory: a session whose shell died without a
//! logout record still looks logged in. A session counts as live only when
//! its terminal is a character device and the recorded process still holds
//! that very device open on standard input, output and error.

use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

use super::record::SessionRecord;

/// Decides whether a `UserProcess` record belongs to a live session.
pub trait LivenessCheck {
    fn is_live(&self, record: &SessionRecord) -> bool;
}

/// Check backed by `/dev` and `/proc`.
#[derive(Debug, Clone)]
pub struct TerminalCheck {
    dev_dir: PathBuf,
    proc_dir: PathBuf,
}

impl Default for TerminalCheck {
    fn default() -> Self {
        Self::new("/dev", "/proc")
    }
}

#[derive(Debug, PartialEq, Eq)]
struct DeviceIdentity {
    dev: u64,
    ino: u64,
    rdev: u64,
}

impl DeviceIdentity {
    fn of(path: &Path) -> Option<(Self, bool)> {
        let meta = fs::metadata(path).ok()?;
        let identity = Self {
            dev: meta.dev(),
            ino: meta.ino(),
            rdev: meta.rdev(),
        };
        Some((identity, meta.file_type().is_char_device()))
    }
}

impl TerminalCheck {
    pub fn new(dev_dir: impl Into<PathBuf>, proc_dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
            proc_dir: proc_dir.into(),
        }
    }

    /// Path of the record's terminal device.
    pub fn terminal_path(&self, line: &str) -> PathBuf {
        self.dev_dir.join(line)
    }

    /// Path of one of a process's file descriptors.
    pub fn descriptor_path(&self, pid: i32, fd: u8) -> PathBuf {
        self.proc_dir
            .join(pid.to_string())
            .join("fd")
            .join(fd.to_string())
    }
}

impl LivenessCheck for TerminalCheck {
    fn is_live(&self, record: &SessionRecord) -> bool {
        // An empty or absolute line would resolve outside the device directory.
        if record.line.is_empty() || record.line.starts_with('/') || record.pid <= 0 {
            return false;
        }

        let Some((terminal, is_char)) = DeviceIdentity::of(&self.terminal_path(&record.line))
        else {
            return false;
        };
        if !is_char {
            return false;
        }

        (0..=2).all(|fd| {
            DeviceIdentity::of(&self.descriptor_path(record.pid, fd))
                .is_some_and(|(held, _)| held == terminal)
        })
    }
}
