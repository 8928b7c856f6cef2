//! Unit tests for the login ledger over real utmp files

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use autohalt::ledger::record::{self, RecordKind, SessionRecord, RECORD_SIZE};
use autohalt::ledger::{
    is_end_of_log, LedgerReader, LivenessCheck, SessionLog, UtmpFile,
};
use chrono::{DateTime, Utc};
use tempfile::TempDir;

/// Treats the listed pids as live, everything else as stale.
struct LivePids(Vec<i32>);

impl LivenessCheck for LivePids {
    fn is_live(&self, record: &SessionRecord) -> bool {
        self.0.contains(&record.pid)
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn user(pid: i32, line: &str, secs: i64) -> SessionRecord {
    SessionRecord::new(RecordKind::UserProcess, pid, line, at(secs)).with_user("alice")
}

fn event(kind: RecordKind, pid: i32, secs: i64) -> SessionRecord {
    SessionRecord::new(kind, pid, "", at(secs))
}

fn write_log(dir: &TempDir, records: &[SessionRecord]) -> PathBuf {
    let path = dir.path().join("utmp");
    let mut file = fs::File::create(&path).unwrap();
    for rec in records {
        file.write_all(&record::encode(rec)).unwrap();
    }
    path
}

fn read_log(path: &Path) -> Vec<SessionRecord> {
    let bytes = fs::read(path).unwrap();
    bytes
        .chunks_exact(RECORD_SIZE)
        .map(|chunk| record::decode(chunk.try_into().unwrap()))
        .collect()
}

fn scan(path: &Path, live: &[i32], now: i64) -> autohalt::ScanReport {
    LedgerReader::with_check(path, LivePids(live.to_vec()))
        .scan_at(at(now))
        .unwrap()
}

#[test]
fn missing_log_reads_as_empty() {
    let dir = TempDir::new().unwrap();
    let report = scan(&dir.path().join("absent"), &[], 5_000);
    assert_eq!(report.active_sessions, 0);
    assert_eq!(report.last_logout, None);
    assert_eq!(report.since_last_logout, Duration::from_secs(5_000));
}

#[test]
fn boot_counts_as_logout() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &[event(RecordKind::BootTime, 0, 1_000)]);
    let report = scan(&path, &[], 1_600);
    assert_eq!(report.last_logout, Some(at(1_000)));
    assert_eq!(report.since_last_logout, Duration::from_secs(600));
}

#[test]
fn live_sessions_are_counted() {
    let dir = TempDir::new().unwrap();
    let path = write_log(
        &dir,
        &[
            event(RecordKind::BootTime, 0, 1_000),
            user(100, "pts/0", 1_100),
            user(200, "pts/1", 1_200),
        ],
    );
    let report = scan(&path, &[100, 200], 2_000);
    assert_eq!(report.active_sessions, 2);
    assert_eq!(report.repaired, 0);
    assert_eq!(report.last_logout, Some(at(1_000)));
}

#[test]
fn duplicate_pid_counts_once() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &[user(100, "pts/0", 1_100), user(100, "pts/0", 1_150)]);
    assert_eq!(scan(&path, &[100], 2_000).active_sessions, 1);
}

#[test]
fn each_session_ending_kind_pairs_with_its_login() {
    for kind in [
        RecordKind::DeadProcess,
        RecordKind::LoginProcess,
        RecordKind::InitProcess,
    ] {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            &[
                event(RecordKind::BootTime, 0, 1_000),
                user(100, "pts/0", 1_100),
                event(kind, 100, 1_500),
            ],
        );
        let report = scan(&path, &[100], 2_000);
        assert_eq!(report.active_sessions, 0, "{:?}", kind);
        assert_eq!(report.last_logout, Some(at(1_500)), "{:?}", kind);
    }
}

#[test]
fn unpaired_dead_record_is_not_a_logout() {
    let dir = TempDir::new().unwrap();
    let path = write_log(
        &dir,
        &[
            event(RecordKind::BootTime, 0, 1_000),
            // A getty that never had a user session behind it.
            event(RecordKind::DeadProcess, 555, 1_800),
        ],
    );
    assert_eq!(scan(&path, &[], 2_000).last_logout, Some(at(1_000)));
}

#[test]
fn logout_after_reboot_pairs_with_earlier_login() {
    let dir = TempDir::new().unwrap();
    let path = write_log(
        &dir,
        &[
            user(100, "pts/0", 500),
            event(RecordKind::BootTime, 0, 1_000),
            event(RecordKind::DeadProcess, 100, 1_200),
        ],
    );
    let report = scan(&path, &[100], 2_000);
    // Boot does not clear the live set; the dead record still pairs.
    assert_eq!(report.active_sessions, 0);
    assert_eq!(report.last_logout, Some(at(1_200)));
}

#[test]
fn clock_change_shifts_the_last_logout() {
    let dir = TempDir::new().unwrap();
    let path = write_log(
        &dir,
        &[
            event(RecordKind::BootTime, 0, 1_000),
            // Clock stepped forward by 500 seconds.
            event(RecordKind::OldTime, 0, 1_100),
            event(RecordKind::NewTime, 0, 1_600),
        ],
    );
    let report = scan(&path, &[], 2_100);
    assert_eq!(report.last_logout, Some(at(500)));
    assert_eq!(report.since_last_logout, Duration::from_secs(1_600));
}

#[test]
fn lone_clock_records_are_ignored() {
    let dir = TempDir::new().unwrap();
    let path = write_log(
        &dir,
        &[
            event(RecordKind::BootTime, 0, 1_000),
            event(RecordKind::NewTime, 0, 9_000),
            event(RecordKind::OldTime, 0, 1_100),
        ],
    );
    assert_eq!(scan(&path, &[], 2_000).last_logout, Some(at(1_000)));
}

#[test]
fn future_logout_gives_zero_elapsed() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &[event(RecordKind::BootTime, 0, 9_000)]);
    assert_eq!(scan(&path, &[], 2_000).since_last_logout, Duration::ZERO);
}

#[test]
fn stale_sessions_are_retired_in_place() {
    let dir = TempDir::new().unwrap();
    let path = write_log(
        &dir,
        &[
            event(RecordKind::BootTime, 0, 1_000),
            user(100, "pts/0", 1_100),
            user(200, "pts/1", 1_200),
        ],
    );

    let report = scan(&path, &[200], 3_000);
    assert_eq!(report.active_sessions, 1);
    assert_eq!(report.repaired, 1);

    let records = read_log(&path);
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].kind, RecordKind::DeadProcess);
    assert_eq!(records[1].time, at(3_000));
    assert_eq!(records[1].pid, 100);
    assert_eq!(records[1].line, "pts/0");
    assert_eq!(records[1].user, "alice");
    assert_eq!(records[2].kind, RecordKind::UserProcess);
}

#[test]
fn second_scan_sees_the_repair_as_a_logout() {
    let dir = TempDir::new().unwrap();
    let path = write_log(
        &dir,
        &[event(RecordKind::BootTime, 0, 1_000), user(100, "pts/0", 1_100)],
    );

    let first = scan(&path, &[], 3_000);
    assert_eq!(first.repaired, 1);

    // The retired slot is now a dead record with no live login to pair with.
    let second = scan(&path, &[], 3_500);
    assert_eq!(second.repaired, 0);
    assert_eq!(second.active_sessions, 0);
    assert!(second.last_logout <= Some(at(3_000)));
}

#[test]
fn retired_sessions_never_come_back() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &[user(100, "pts/0", 1_100), user(200, "pts/1", 1_200)]);

    scan(&path, &[], 3_000);
    // Even if the pid later shows up live, its slot is already a logout.
    let report = scan(&path, &[100, 200], 3_500);
    assert_eq!(report.active_sessions, 0);
}

#[test]
fn reused_slot_is_left_alone() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &[user(100, "pts/0", 1_100)]);

    let mut log = UtmpFile::open(&path).unwrap();
    let entry = log.next_entry().unwrap().unwrap();
    assert!(log.next_entry().unwrap().is_none());

    // A new login takes the slot between reading and repairing.
    let fresh = user(300, "pts/0", 2_000);
    fs::write(&path, record::encode(&fresh)).unwrap();

    let mut replacement = entry.raw;
    record::mark_dead(&mut replacement, at(2_500));
    assert!(!log.rewrite(&entry, &replacement).unwrap());
    assert_eq!(read_log(&path), vec![fresh]);
}

#[test]
fn truncated_trailing_record_ends_the_log() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &[event(RecordKind::BootTime, 0, 1_000)]);
    let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0u8; 100]).unwrap();

    let report = scan(&path, &[], 1_500);
    assert_eq!(report.last_logout, Some(at(1_000)));
}

#[test]
fn end_of_log_errors_are_classified() {
    use std::io;
    assert!(is_end_of_log(&io::Error::from_raw_os_error(libc::ENOENT)));
    assert!(is_end_of_log(&io::Error::from_raw_os_error(libc::ESRCH)));
    assert!(is_end_of_log(&io::Error::from(io::ErrorKind::UnexpectedEof)));
    assert!(!is_end_of_log(&io::Error::from_raw_os_error(libc::EACCES)));
    assert!(!is_end_of_log(&io::Error::from_raw_os_error(libc::EIO)));
}

#[test]
fn unreadable_log_is_fatal() {
    let dir = TempDir::new().unwrap();
    // A directory opens fine but fails to read with EISDIR.
    let err = LedgerReader::with_check(dir.path(), LivePids(Vec::new()))
        .scan_at(at(1_000))
        .unwrap_err();
    assert!(err.to_string().contains("Failed to read session log"));
}
