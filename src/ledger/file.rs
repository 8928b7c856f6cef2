//! The on-disk session accounting log (`/var/run/utmp`).
//!
//! Other processes write this file while we read it, so every record is read
//! under a shared `fcntl` lock on its slot and every repair under an exclusive
//! one, the same locks login programs take. Lock waits are bounded: a stuck
//! holder fails the scan instead of hanging the check.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use super::record::RECORD_SIZE;
use super::{LedgerError, LogEntry, SessionLog};

/// Default location of the session accounting log.
pub const DEFAULT_SESSION_LOG: &str = "/var/run/utmp";

/// How many times a contended record lock is retried.
const LOCK_ATTEMPTS: u32 = 10;

/// Pause between lock attempts.
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Whether an I/O error is the log's ordinary end-of-records signal.
///
/// A missing log (`ENOENT`) and "no more entries" (`ESRCH`) end a scan
/// normally, as does a truncated trailing record. Anything else is fatal.
pub fn is_end_of_log(err: &io::Error) -> bool {
    match err.raw_os_error() {
        Some(code) => code == libc::ENOENT || code == libc::ESRCH,
        None => err.kind() == io::ErrorKind::UnexpectedEof,
    }
}

/// Sequential reader over a utmp file with in-place slot rewrites.
pub struct UtmpFile {
    path: PathBuf,
    reader: Option<File>,
    writer: Option<File>,
    next_slot: u64,
}

impl UtmpFile {
    /// Open the log for reading. A missing log reads as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let reader = match File::open(&path) {
            Ok(file) => Some(file),
            Err(err) if is_end_of_log(&err) => {
                tracing::debug!(path = %path.display(), "Session log not present");
                None
            }
            Err(source) => return Err(LedgerError::Open { path, source }),
        };
        Ok(Self {
            path,
            reader,
            writer: None,
            next_slot: 0,
        })
    }

    fn writer(&mut self) -> Result<&File, LedgerError> {
        let file = match self.writer.take() {
            Some(file) => file,
            None => OpenOptions::new()
                .read(true)
                .write(true)
                .open(&self.path)
                .map_err(|source| LedgerError::Rewrite {
                    path: self.path.clone(),
                    source,
                })?,
        };
        Ok(self.writer.insert(file))
    }
}

impl SessionLog for UtmpFile {
    fn next_entry(&mut self) -> Result<Option<LogEntry>, LedgerError> {
        let Some(reader) = self.reader.as_ref() else {
            return Ok(None);
        };

        let offset = self.next_slot * RECORD_SIZE as u64;
        let mut raw = [0u8; RECORD_SIZE];
        match read_locked(reader, offset, &mut raw) {
            Ok(()) => {
                let entry = LogEntry::new(self.next_slot, raw);
                self.next_slot += 1;
                Ok(Some(entry))
            }
            Err(err) if is_end_of_log(&err) => {
                self.reader = None;
                Ok(None)
            }
            Err(source) => Err(LedgerError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn rewrite(
        &mut self,
        entry: &LogEntry,
        replacement: &[u8; RECORD_SIZE],
    ) -> Result<bool, LedgerError> {
        let path = self.path.clone();
        let offset = entry.slot * RECORD_SIZE as u64;
        let file = self.writer()?;
        let rewrite_err = |source| LedgerError::Rewrite {
            path: path.clone(),
            source,
        };

        set_lock(file, offset, libc::F_WRLCK).map_err(rewrite_err)?;
        let result = overwrite_if_unchanged(file, offset, &entry.raw, replacement);
        let unlocked = set_lock(file, offset, libc::F_UNLCK);
        let rewritten = result.map_err(rewrite_err)?;
        unlocked.map_err(rewrite_err)?;
        Ok(rewritten)
    }
}

fn read_locked(file: &File, offset: u64, raw: &mut [u8; RECORD_SIZE]) -> io::Result<()> {
    set_lock(file, offset, libc::F_RDLCK)?;
    let result = file.read_exact_at(raw, offset);
    let unlocked = set_lock(file, offset, libc::F_UNLCK);
    result?;
    unlocked
}

// The slot may have been reused by a new login since it was read.
fn overwrite_if_unchanged(
    file: &File,
    offset: u64,
    expected: &[u8; RECORD_SIZE],
    replacement: &[u8; RECORD_SIZE],
) -> io::Result<bool> {
    let mut current = [0u8; RECORD_SIZE];
    file.read_exact_at(&mut current, offset)?;
    if &current != expected {
        return Ok(false);
    }
    file.write_all_at(replacement, offset)?;
    Ok(true)
}

/// Set or clear a lock on one record slot, retrying while another process holds it.
fn set_lock(file: &File, offset: u64, kind: libc::c_int) -> io::Result<()> {
    // SAFETY: flock is a plain C struct; all-zero is a valid value.
    let mut lock: libc::flock = unsafe { std::mem::zeroed() };
    lock.l_type = kind as libc::c_short;
    lock.l_whence = libc::SEEK_SET as libc::c_short;
    lock.l_start = offset as libc::off_t;
    lock.l_len = RECORD_SIZE as libc::off_t;

    let mut attempts = 0;
    loop {
        // SAFETY: the descriptor is owned by `file` and `lock` outlives the call.
        let ret = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETLK, &lock) };
        if ret != -1 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(libc::EACCES) | Some(libc::EAGAIN) => {
                attempts += 1;
                if attempts >= LOCK_ATTEMPTS {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "record is locked by another process",
                    ));
                }
                thread::sleep(LOCK_RETRY_DELAY);
            }
            _ => return Err(err),
        }
    }
}
