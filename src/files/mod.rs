//! Files the daemon owns outside the session log.

pub mod pidfile;

pub use pidfile::PidFile;
