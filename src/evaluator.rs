//! Inactivity evaluation: turns a ledger scan into a halt/wait decision.

use std::fmt;

/// What the daemon should do after a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The machine has been quiet long enough and nobody is logged in.
    Halt,
    /// Check again after this many seconds.
    Wait(u64),
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Halt => write!(f, "halt"),
            Decision::Wait(secs) => write!(f, "wait {}s", secs),
        }
    }
}

/// Decide whether to halt.
///
/// The elapsed-time rule is applied first: while the last logout is more
/// recent than `required_secs`, wait out the remainder. Once enough time has
/// passed, any live session forces a full fresh interval before the next
/// look; only an empty machine halts.
pub fn evaluate(
    active_sessions: u32,
    since_last_logout_secs: u64,
    required_secs: u64,
) -> Decision {
    if since_last_logout_secs < required_secs {
        Decision::Wait(required_secs - since_last_logout_secs)
    } else if active_sessions > 0 {
        Decision::Wait(required_secs)
    } else {
        Decision::Halt
    }
}
