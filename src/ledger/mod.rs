//! Login ledger: reconstructs login activity from the session accounting log.
//!
//! One scan walks every record in file order and produces the number of live
//! sessions plus the time since the most recent logout. User records whose
//! process no longer holds its terminal are stale; they are excluded from the
//! count and rewritten as logouts once reading has finished.

mod file;
mod liveness;
pub mod record;

pub use file::{is_end_of_log, UtmpFile, DEFAULT_SESSION_LOG};
pub use liveness::{LivenessCheck, TerminalCheck};
pub use record::{RecordKind, SessionRecord, RECORD_SIZE};

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Errors raised while reading or repairing the session log.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Failed to open session log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read session log {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to rewrite stale record in {path}: {source}")]
    Rewrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A record together with its raw bytes and position in the log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub slot: u64,
    pub raw: [u8; RECORD_SIZE],
    pub record: SessionRecord,
}

impl LogEntry {
    pub fn new(slot: u64, raw: [u8; RECORD_SIZE]) -> Self {
        Self {
            slot,
            record: record::decode(&raw),
            raw,
        }
    }
}

/// A readable, repairable session accounting log.
pub trait SessionLog {
    /// The next record in file order, or `None` once the log is exhausted.
    fn next_entry(&mut self) -> Result<Option<LogEntry>, LedgerError>;

    /// Replace the slot `entry` was read from.
    ///
    /// Returns `false` when the slot no longer holds `entry` and was left alone.
    fn rewrite(
        &mut self,
        entry: &LogEntry,
        replacement: &[u8; RECORD_SIZE],
    ) -> Result<bool, LedgerError>;
}

/// Outcome of one ledger scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Live sessions, saturated at `u32::MAX`.
    pub active_sessions: u32,
    /// Most recent logout or boot, after clock adjustment. `None` if the log has neither.
    pub last_logout: Option<DateTime<Utc>>,
    pub since_last_logout: Duration,
    /// Stale user records rewritten as logouts during this scan.
    pub repaired: usize,
}

/// Anything that can produce a [`ScanReport`] on demand.
pub trait Scan {
    fn scan(&mut self) -> Result<ScanReport, LedgerError>;
}

/// Scans the accounting log at a fixed path.
#[derive(Debug, Clone)]
pub struct LedgerReader<P = TerminalCheck> {
    path: PathBuf,
    check: P,
}

impl LedgerReader<TerminalCheck> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_check(path, TerminalCheck::default())
    }
}

impl<P: LivenessCheck> LedgerReader<P> {
    pub fn with_check(path: impl Into<PathBuf>, check: P) -> Self {
        Self {
            path: path.into(),
            check,
        }
    }

    /// Scan with an explicit notion of "now".
    pub fn scan_at(&self, now: DateTime<Utc>) -> Result<ScanReport, LedgerError> {
        let mut log = UtmpFile::open(&self.path)?;
        scan_log(&mut log, &self.check, now)
        // Dropping the handle here closes the log and commits the rewrites.
    }
}

impl<P: LivenessCheck> Scan for LedgerReader<P> {
    fn scan(&mut self) -> Result<ScanReport, LedgerError> {
        self.scan_at(Utc::now())
    }
}

/// Core scan over any [`SessionLog`].
///
/// All durations are measured against the single `now` captured by the
/// caller. Stale records are only rewritten after the last record was read.
pub fn scan_log<L, P>(
    log: &mut L,
    check: &P,
    now: DateTime<Utc>,
) -> Result<ScanReport, LedgerError>
where
    L: SessionLog + ?Sized,
    P: LivenessCheck + ?Sized,
{
    let mut active: Vec<i32> = Vec::new();
    let mut stale: Vec<LogEntry> = Vec::new();
    let mut last_logout: Option<DateTime<Utc>> = None;
    let mut adjustment = TimeDelta::zero();
    let mut old_time: Option<DateTime<Utc>> = None;

    while let Some(entry) = log.next_entry()? {
        let kind = entry.record.kind;
        match kind {
            RecordKind::UserProcess => {
                if check.is_live(&entry.record) {
                    let pid = entry.record.pid;
                    if !active.contains(&pid) {
                        active.push(pid);
                    }
                } else {
                    stale.push(entry);
                }
            }
            RecordKind::BootTime => {
                // A reboot counts as a logout.
                adjustment = TimeDelta::zero();
                old_time = None;
                last_logout = Some(entry.record.time);
            }
            RecordKind::OldTime => old_time = Some(entry.record.time),
            RecordKind::NewTime => {
                if let Some(old) = old_time.take() {
                    adjustment = adjustment + (entry.record.time - old);
                }
            }
            kind if kind.ends_session() => {
                if let Some(pos) = active.iter().position(|&pid| pid == entry.record.pid) {
                    active.remove(pos);
                    last_logout = Some(entry.record.time);
                }
            }
            _ => {}
        }
    }

    // Clock steps since boot are taken back out of the logout time.
    let last_logout = last_logout.map(|at| at - adjustment);
    let since = now - last_logout.unwrap_or(DateTime::UNIX_EPOCH);
    let since_last_logout = since.to_std().unwrap_or(Duration::ZERO);

    let mut repaired = 0;
    for entry in &stale {
        let mut replacement = entry.raw;
        record::mark_dead(&mut replacement, now);
        if log.rewrite(entry, &replacement)? {
            repaired += 1;
            tracing::info!(
                pid = entry.record.pid,
                line = %entry.record.line,
                user = %entry.record.user,
                "Retired stale session record"
            );
        } else {
            tracing::debug!(slot = entry.slot, "Stale record slot was reused, skipping");
        }
    }

    let report = ScanReport {
        active_sessions: u32::try_from(active.len()).unwrap_or(u32::MAX),
        last_logout,
        since_last_logout,
        repaired,
    };
    tracing::debug!(
        active = report.active_sessions,
        since_last_logout = report.since_last_logout.as_secs(),
        repaired = report.repaired,
        "Session log scanned"
    );
    Ok(report)
}
