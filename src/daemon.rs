//! Detach from the controlling terminal.
//!
//! Classic double fork: the parents exit immediately, the grandchild leads
//! a fresh session with no terminal, lives in `/` and has its standard
//! streams on `/dev/null`. Everything the stage chain needs (interval,
//! shutdown arguments, PID file guard, open log file) is already in memory
//! and survives unchanged.
//!
//! Must run before any thread is spawned.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::io::AsRawFd;

use crate::error::{Error, Result};

/// Fork into the background. Returns in the daemon process only.
pub fn daemonize() -> Result<()> {
    fork_and_exit_parent("fork")?;

    // SAFETY: setsid has no memory-safety preconditions.
    if unsafe { libc::setsid() } == -1 {
        return Err(last_error("setsid"));
    }

    // The session leader could reacquire a terminal; its child cannot.
    fork_and_exit_parent("second fork")?;

    std::env::set_current_dir("/").map_err(|source| Error::Daemonize {
        context: "chdir /",
        source,
    })?;
    // SAFETY: umask only swaps the process file mode mask.
    unsafe { libc::umask(0o022) };

    redirect_std_streams()
}

fn fork_and_exit_parent(context: &'static str) -> Result<()> {
    // SAFETY: called while the process is still single threaded.
    match unsafe { libc::fork() } {
        -1 => Err(last_error(context)),
        0 => Ok(()),
        // Skip destructors: the PID file guard belongs to the child now.
        _ => unsafe { libc::_exit(0) },
    }
}

fn redirect_std_streams() -> Result<()> {
    let null = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .map_err(|source| Error::Daemonize {
            context: "open /dev/null",
            source,
        })?;

    for fd in 0..=2 {
        // SAFETY: both descriptors are valid; dup2 atomically replaces `fd`.
        if unsafe { libc::dup2(null.as_raw_fd(), fd) } == -1 {
            return Err(last_error("redirect standard streams"));
        }
    }
    Ok(())
}

fn last_error(context: &'static str) -> Error {
    Error::Daemonize {
        context,
        source: io::Error::last_os_error(),
    }
}
