//! Session accounting records and the on-disk utmp codec.
//!
//! Records use the glibc `struct utmp` layout: 384 bytes, native endian,
//! with 32-bit `tv_sec`/`tv_usec` fields on every Linux ABI.

use chrono::{DateTime, Utc};

/// Size of one on-disk record.
pub const RECORD_SIZE: usize = 384;

/// Width of the `ut_line` field (terminal name relative to `/dev`).
pub const LINE_SIZE: usize = 32;

const TYPE_OFFSET: usize = 0;
const PID_OFFSET: usize = 4;
const LINE_OFFSET: usize = 8;
const USER_OFFSET: usize = 44;
const USER_SIZE: usize = 32;
const TV_SEC_OFFSET: usize = 340;
const TV_USEC_OFFSET: usize = 344;

/// Kind of an accounting record (`ut_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    BootTime,
    NewTime,
    OldTime,
    InitProcess,
    LoginProcess,
    UserProcess,
    DeadProcess,
    /// Empty slots, run level changes, accounting and unknown values.
    Other(i16),
}

impl RecordKind {
    pub fn from_raw(value: i16) -> Self {
        match value {
            2 => RecordKind::BootTime,
            3 => RecordKind::NewTime,
            4 => RecordKind::OldTime,
            5 => RecordKind::InitProcess,
            6 => RecordKind::LoginProcess,
            7 => RecordKind::UserProcess,
            8 => RecordKind::DeadProcess,
            other => RecordKind::Other(other),
        }
    }

    pub fn to_raw(self) -> i16 {
        match self {
            RecordKind::BootTime => 2,
            RecordKind::NewTime => 3,
            RecordKind::OldTime => 4,
            RecordKind::InitProcess => 5,
            RecordKind::LoginProcess => 6,
            RecordKind::UserProcess => 7,
            RecordKind::DeadProcess => 8,
            RecordKind::Other(value) => value,
        }
    }

    /// Records that retire a user session: logout, getty respawn, init spawn.
    pub fn ends_session(self) -> bool {
        matches!(
            self,
            RecordKind::DeadProcess | RecordKind::LoginProcess | RecordKind::InitProcess
        )
    }
}

/// One decoded accounting record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub pid: i32,
    /// Terminal name relative to `/dev`, e.g. `pts/3`. Not NUL terminated on disk.
    pub line: String,
    pub user: String,
    pub kind: RecordKind,
    pub time: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(kind: RecordKind, pid: i32, line: &str, time: DateTime<Utc>) -> Self {
        Self {
            pid,
            line: line.to_string(),
            user: String::new(),
            kind,
            time,
        }
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.user = user.to_string();
        self
    }
}

/// Decode a raw record.
pub fn decode(raw: &[u8; RECORD_SIZE]) -> SessionRecord {
    let kind = RecordKind::from_raw(i16::from_ne_bytes([
        raw[TYPE_OFFSET],
        raw[TYPE_OFFSET + 1],
    ]));
    let pid = read_i32(raw, PID_OFFSET);
    let secs = read_i32(raw, TV_SEC_OFFSET);
    let usecs = read_i32(raw, TV_USEC_OFFSET).clamp(0, 999_999);
    let time = DateTime::from_timestamp(i64::from(secs), (usecs as u32) * 1000)
        .unwrap_or(DateTime::UNIX_EPOCH);

    SessionRecord {
        pid,
        line: read_str(&raw[LINE_OFFSET..LINE_OFFSET + LINE_SIZE]),
        user: read_str(&raw[USER_OFFSET..USER_OFFSET + USER_SIZE]),
        kind,
        time,
    }
}

/// Encode a record into a fresh zeroed slot.
pub fn encode(record: &SessionRecord) -> [u8; RECORD_SIZE] {
    let mut raw = [0u8; RECORD_SIZE];
    raw[TYPE_OFFSET..TYPE_OFFSET + 2].copy_from_slice(&record.kind.to_raw().to_ne_bytes());
    raw[PID_OFFSET..PID_OFFSET + 4].copy_from_slice(&record.pid.to_ne_bytes());
    write_str(&mut raw[LINE_OFFSET..LINE_OFFSET + LINE_SIZE], &record.line);
    write_str(&mut raw[USER_OFFSET..USER_OFFSET + USER_SIZE], &record.user);
    write_time(&mut raw, record.time);
    raw
}

/// Turn a stale user record into a logout at `now`.
///
/// Only the type and timestamp change; identity fields (id, line, user,
/// host) stay as they were so other readers can still pair the slot.
pub fn mark_dead(raw: &mut [u8; RECORD_SIZE], now: DateTime<Utc>) {
    raw[TYPE_OFFSET..TYPE_OFFSET + 2]
        .copy_from_slice(&RecordKind::DeadProcess.to_raw().to_ne_bytes());
    write_time(raw, now);
}

fn write_time(raw: &mut [u8; RECORD_SIZE], time: DateTime<Utc>) {
    let secs = i32::try_from(time.timestamp()).unwrap_or(i32::MAX);
    let usecs = (time.timestamp_subsec_micros().min(999_999)) as i32;
    raw[TV_SEC_OFFSET..TV_SEC_OFFSET + 4].copy_from_slice(&secs.to_ne_bytes());
    raw[TV_USEC_OFFSET..TV_USEC_OFFSET + 4].copy_from_slice(&usecs.to_ne_bytes());
}

fn read_i32(raw: &[u8], offset: usize) -> i32 {
    i32::from_ne_bytes([
        raw[offset],
        raw[offset + 1],
        raw[offset + 2],
        raw[offset + 3],
    ])
}

// Fixed-width fields are NUL padded but a full-width value has no terminator.
fn read_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn write_str(field: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(field.len());
    field[..len].copy_from_slice(&bytes[..len]);
}
