//! Signal flags for the resident daemon.
//!
//! - SIGHUP asks for reconfiguration (re-read the interval)
//! - SIGTERM via signal_hook and SIGINT (Ctrl+C) via ctrlc ask for an orderly stop
//!
//! Handlers only set flags. The scheduler polls them at sleep-slice
//! boundaries, so a signal arriving while a check is running stays pending
//! until the next sleep begins and can never interrupt a scan.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Pending reconfiguration and stop requests.
#[derive(Debug, Clone, Default)]
pub struct Signals {
    reload: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register SIGHUP, SIGTERM and SIGINT handlers.
    ///
    /// Safe to call more than once; a second ctrlc handler is ignored.
    pub fn register(&self) -> Result<()> {
        #[cfg(unix)]
        {
            use signal_hook::flag::register;
            register(libc::SIGHUP, self.reload.clone()).map_err(Error::Signal)?;
            register(libc::SIGTERM, self.stop.clone()).map_err(Error::Signal)?;
        }

        let stop = self.stop.clone();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .ok(); // Ignore if handler already set

        Ok(())
    }

    /// Consume a pending reconfiguration request.
    pub fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::SeqCst)
    }

    /// Whether a stop was requested (SIGTERM or SIGINT).
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Queue a reconfiguration as if SIGHUP had arrived.
    pub fn request_reload(&self) {
        self.reload.store(true, Ordering::SeqCst);
    }

    /// Queue a stop as if SIGTERM had arrived.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}
