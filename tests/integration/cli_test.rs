//! CLI behaviour of both binaries
//!
//! Anything that could actually run shutdown(8) only runs as root and with
//! the shutdown program pointed at `/bin/echo`.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const BINARIES: [&str; 2] = ["autohalt", "autohaltd"];

fn bin(name: &str) -> Command {
    let mut cmd = Command::cargo_bin(name).unwrap();
    cmd.env_remove("AUTOHALTD_INTERVAL").env_remove("AUTOHALT_LOG");
    cmd
}

fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions.
    unsafe { libc::geteuid() == 0 }
}

/// Config that halts via `/bin/echo` against an empty session log.
fn harmless_config(dir: &TempDir) -> std::path::PathBuf {
    config_with_program(dir, "/bin/echo")
}

fn config_with_program(dir: &TempDir, program: &str) -> std::path::PathBuf {
    let path = dir.path().join("autohalt.toml");
    let contents = format!(
        "[daemon]\npid_file = {:?}\n\n[shutdown]\nprogram = {:?}\n\n[ledger]\nsession_log = {:?}\n",
        dir.path().join("autohaltd.pid"),
        program,
        dir.path().join("utmp"),
    );
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn help_describes_intervals() {
    for name in BINARIES {
        bin(name)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("INTERVAL"))
            .stdout(predicate::str::contains("--copyright"));
    }
}

#[test]
fn version_flag_prints_name_and_version() {
    for name in BINARIES {
        for flag in ["-v", "--version"] {
            bin(name)
                .arg(flag)
                .assert()
                .success()
                .stdout(format!("{} {}\n", name, env!("CARGO_PKG_VERSION")));
        }
    }
}

#[test]
fn copyright_flag_prints_licence() {
    bin("autohaltd")
        .arg("-c")
        .assert()
        .success()
        .stdout(predicate::str::contains("MIT License"));
}

#[test]
fn malformed_interval_is_a_usage_error() {
    for name in BINARIES {
        bin(name)
            .arg("5x")
            .assert()
            .code(2)
            .stderr(predicate::str::contains("units are"));
        bin(name).arg("ten").assert().code(2);
    }
}

#[test]
fn zero_interval_is_a_usage_error() {
    for name in BINARIES {
        bin(name)
            .args(["0", "0m"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("The interval cannot be zero"))
            .stderr(predicate::str::contains(format!("Type '{} --help'", name)));
    }
}

#[test]
fn non_root_is_refused() {
    if is_root() {
        return;
    }
    for name in BINARIES {
        bin(name)
            .arg("10m")
            .assert()
            .code(2)
            .stderr(predicate::str::contains("must be run as root"));
    }
}

#[test]
fn one_shot_halts_quiet_machine() {
    if !is_root() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let config = harmless_config(&dir);
    bin("autohalt")
        .arg("--config")
        .arg(&config)
        .args(["1s", "--", "-k"])
        .assert()
        .success()
        .stdout("-k -h now\n");
}

#[test]
fn one_shot_leaves_busy_machine_alone() {
    if !is_root() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let config = harmless_config(&dir);
    // Boot record from "now": the machine has not been quiet for an hour.
    let boot = autohalt::ledger::SessionRecord::new(
        autohalt::ledger::RecordKind::BootTime,
        0,
        "~",
        chrono::Utc::now(),
    );
    std::fs::write(
        dir.path().join("utmp"),
        autohalt::ledger::record::encode(&boot),
    )
    .unwrap();

    bin("autohalt")
        .arg("--config")
        .arg(&config)
        .arg("1h")
        .assert()
        .success()
        .stdout("");
}

#[test]
fn foreground_daemon_halts_after_interval() {
    if !is_root() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let config = harmless_config(&dir);
    bin("autohaltd")
        .arg("--foreground")
        .arg("--config")
        .arg(&config)
        .arg("1")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout("-h now\n");
    assert!(!dir.path().join("autohaltd.pid").exists());
}

#[test]
fn failed_shutdown_does_not_block_restart() {
    if !is_root() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let config = config_with_program(&dir, "/bin/false");
    for _ in 0..2 {
        bin("autohaltd")
            .arg("-f")
            .arg("--config")
            .arg(&config)
            .arg("1")
            .timeout(std::time::Duration::from_secs(30))
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Already running").not());
        assert!(!dir.path().join("autohaltd.pid").exists());
    }
}

#[test]
fn scan_failure_is_reported_once() {
    if !is_root() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();
    let config = dir.path().join("autohalt.toml");
    let contents = format!(
        "[daemon]\npid_file = {:?}\n\n[shutdown]\nprogram = \"/bin/echo\"\n\n[ledger]\nsession_log = {:?}\n",
        dir.path().join("autohaltd.pid"),
        blocker.join("utmp"),
    );
    std::fs::write(&config, contents).unwrap();
    let output = bin("autohaltd")
        .arg("-f")
        .arg("--config")
        .arg(&config)
        .arg("1")
        .timeout(std::time::Duration::from_secs(30))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("session log").count(), 1, "{}", stderr);
}

#[test]
fn second_daemon_is_refused() {
    if !is_root() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let config = harmless_config(&dir);
    std::fs::write(dir.path().join("autohaltd.pid"), "1\n").unwrap();
    bin("autohaltd")
        .arg("-f")
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Already running"));
}
