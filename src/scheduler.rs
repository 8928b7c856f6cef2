//! Stage scheduler: the daemon's sleep/check/halt state machine.
//!
//! ```text
//!            reload (SIGHUP)
//!              +------+
//!              v      |
//! start --> Sleeping(n) --expired--> Checking(total) --Halt--> Halting
//!              ^                           |
//!              +--------Wait(m)------------+
//! ```
//!
//! The interval and the shutdown command live in [`Daemon`] and are handed
//! from stage to stage by value. Sleeping waits in bounded slices and polls
//! the signal flags between slices, which is the only place a reload or stop
//! request is acted on. Requests that arrive while a check runs stay pending
//! until the next sleep starts.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::evaluator::{evaluate, Decision};
use crate::interval::Interval;
use crate::ledger::Scan;
use crate::shutdown::Halt;
use crate::utils::signals::Signals;

/// Longest single wait before the signal flags are polled again.
pub const SLEEP_SLICE: Duration = Duration::from_secs(1);

/// The daemon's current stage and its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Wait this many seconds, then check.
    Sleeping(u64),
    /// Evaluate inactivity against this required interval.
    Checking(u64),
    /// Invoke the shutdown program.
    Halting,
    /// Orderly exit on SIGTERM/SIGINT.
    Stopping,
}

/// How [`Daemon::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The shutdown program was invoked.
    Halted,
    /// A stop was requested before the machine went quiet.
    Stopped,
}

/// Blocking wait primitive used by the sleeping stage.
pub trait Pause {
    /// Wait for at most `slice` and report how long actually passed.
    fn pause(&mut self, slice: Duration) -> Duration;
}

/// Pauses the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&mut self, slice: Duration) -> Duration {
        let start = Instant::now();
        thread::sleep(slice);
        start.elapsed()
    }
}

/// Where a reconfiguration request reads the new interval from.
pub trait IntervalSource {
    /// The updated interval, or `None` to go back to the startup interval.
    fn reload(&mut self) -> Result<Option<Interval>>;
}

/// Reads `[daemon] interval` from the config file.
#[derive(Debug, Clone)]
pub struct ConfigFileSource {
    path: PathBuf,
}

impl ConfigFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IntervalSource for ConfigFileSource {
    fn reload(&mut self) -> Result<Option<Interval>> {
        Config::reload_interval(&self.path)
    }
}

/// Never changes the interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedInterval;

impl IntervalSource for FixedInterval {
    fn reload(&mut self) -> Result<Option<Interval>> {
        Ok(None)
    }
}

/// Run one check: scan the ledger and decide.
pub fn check<S: Scan + ?Sized>(scanner: &mut S, required: Interval) -> Result<Decision> {
    let report = scanner.scan()?;
    let decision = evaluate(
        report.active_sessions,
        report.since_last_logout.as_secs(),
        required.as_secs(),
    );
    info!(
        active_sessions = report.active_sessions,
        since_last_logout = report.since_last_logout.as_secs(),
        repaired = report.repaired,
        required = required.as_secs(),
        %decision,
        "Checked for inactivity"
    );
    Ok(decision)
}

/// Everything the stage chain carries from one stage to the next.
pub struct Daemon<S, H, P = ThreadPause, R = FixedInterval> {
    startup: Interval,
    total: Interval,
    scanner: S,
    halter: H,
    pause: P,
    source: R,
    signals: Signals,
}

impl<S: Scan, H: Halt> Daemon<S, H> {
    pub fn new(total: Interval, scanner: S, halter: H, signals: Signals) -> Self {
        Self {
            startup: total,
            total,
            scanner,
            halter,
            pause: ThreadPause,
            source: FixedInterval,
            signals,
        }
    }
}

impl<S: Scan, H: Halt, P: Pause, R: IntervalSource> Daemon<S, H, P, R> {
    /// Replace the wait primitive.
    pub fn with_pause<P2: Pause>(self, pause: P2) -> Daemon<S, H, P2, R> {
        Daemon {
            startup: self.startup,
            total: self.total,
            scanner: self.scanner,
            halter: self.halter,
            pause,
            source: self.source,
            signals: self.signals,
        }
    }

    /// Replace where reconfiguration reads the interval from.
    pub fn with_interval_source<R2: IntervalSource>(self, source: R2) -> Daemon<S, H, P, R2> {
        Daemon {
            startup: self.startup,
            total: self.total,
            scanner: self.scanner,
            halter: self.halter,
            pause: self.pause,
            source,
            signals: self.signals,
        }
    }

    /// The interval currently in effect.
    pub fn interval(&self) -> Interval {
        self.total
    }

    pub fn halter(&self) -> &H {
        &self.halter
    }

    pub fn scanner(&self) -> &S {
        &self.scanner
    }

    /// Drive the stage chain until the machine is halted or a stop is requested.
    ///
    /// Scan and shutdown failures end the chain with an error; nothing is retried.
    pub fn run(&mut self) -> Result<Outcome> {
        info!(interval = %self.total, "Waiting for the machine to go quiet");
        let mut stage = Stage::Sleeping(self.total.as_secs());
        loop {
            debug!(?stage, "Entering stage");
            stage = match stage {
                Stage::Sleeping(remaining) => self.sleep_stage(remaining),
                Stage::Checking(total) => self.check_stage(total)?,
                Stage::Halting => {
                    self.halter.halt()?;
                    return Ok(Outcome::Halted);
                }
                Stage::Stopping => {
                    info!("Stop requested, exiting");
                    return Ok(Outcome::Stopped);
                }
            };
        }
    }

    fn sleep_stage(&mut self, remaining: u64) -> Stage {
        // A reload that arrived during the last check is handled first.
        if self.signals.take_reload() {
            return self.reconfigure();
        }

        let mut left = Duration::from_secs(remaining);
        while !left.is_zero() {
            if self.signals.stop_requested() {
                return Stage::Stopping;
            }
            let elapsed = self.pause.pause(left.min(SLEEP_SLICE));
            left = left.saturating_sub(elapsed);
            if self.signals.take_reload() {
                return self.reconfigure();
            }
        }

        if self.signals.stop_requested() {
            return Stage::Stopping;
        }
        Stage::Checking(self.total.as_secs())
    }

    fn check_stage(&mut self, total: u64) -> Result<Stage> {
        let required = Interval::from_secs(total).unwrap_or(self.total);
        let stage = match check(&mut self.scanner, required)? {
            Decision::Halt if self.signals.stop_requested() => Stage::Stopping,
            Decision::Halt => Stage::Halting,
            Decision::Wait(secs) => Stage::Sleeping(secs),
        };
        Ok(stage)
    }

    // The wait in progress is abandoned; the new interval starts from zero.
    fn reconfigure(&mut self) -> Stage {
        match self.source.reload() {
            Ok(Some(interval)) => self.total = interval,
            Ok(None) => self.total = self.startup,
            Err(err) => {
                warn!(
                    error = %err,
                    interval = %self.total,
                    "Failed to reload interval, keeping current"
                );
            }
        }
        info!(interval = %self.total, "Reconfigured");
        Stage::Sleeping(self.total.as_secs())
    }
}
