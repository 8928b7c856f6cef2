//! Configuration management for autohalt
//!
//! The config file is optional. Every value has a default, and the interval
//! in `[daemon]` is the one the resident daemon re-reads on SIGHUP.

mod io;
mod types;

pub use types::*;

use std::path::Path;

use crate::error::Result;
use crate::interval::Interval;

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/autohalt.toml";

impl Config {
    /// Load configuration from file, or return defaults if not found
    pub fn load(path: &Path) -> Result<Self> {
        io::load(path)
    }

    /// Parse configuration from TOML text
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        io::parse(path, contents)
    }

    /// The configured interval, if any (zero counts as unset)
    pub fn interval(&self) -> Option<Interval> {
        // Validated at load time, so a resolve error cannot happen here.
        self.daemon
            .interval
            .as_ref()
            .and_then(|setting| setting.resolve().ok().flatten())
    }

    /// Re-read only the interval from the config file
    pub fn reload_interval(path: &Path) -> Result<Option<Interval>> {
        Ok(Self::load(path)?.interval())
    }
}
