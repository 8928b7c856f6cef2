//! autohalt library
//!
//! Brings an unattended machine down once nobody has been logged in for a
//! configurable interval. Shared by the resident `autohaltd` and the
//! one-shot `autohalt`.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod evaluator;
pub mod files;
pub mod interval;
pub mod ledger;
pub mod logging;
pub mod scheduler;
pub mod shutdown;
pub mod utils;

pub use config::Config;
pub use error::{Error, Result};
pub use evaluator::{evaluate, Decision};
pub use interval::{Interval, DEFAULT_INTERVAL};
pub use ledger::{LedgerReader, Scan, ScanReport};
pub use scheduler::{Daemon, Outcome};
pub use shutdown::ShutdownCommand;
