//! Command-line surface shared by `autohalt` and `autohaltd`.
//!
//! ```text
//! PROG [OPTION]... [INTERVAL]... [-- SHUTDOWN_ARG...]
//! ```
//!
//! Malformed INTERVAL tokens are rejected by clap itself, so they exit with
//! status 2 before anything touches the system.

use clap::{Args, Parser};
use std::path::PathBuf;

use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::error::{Error, Result};
use crate::interval::{self, Interval, IntervalError};

const INTERVAL_HELP: &str = "\
Each INTERVAL is a non-negative integer, optionally with a unit: \
s (seconds, the default), m (minutes) or h (hours). Several INTERVALs add up. \
Anything after '--' is passed to shutdown(8) before '-h now'.";

/// Arguments shared by both binaries.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Required time without logins, e.g. `1h 30m`
    #[arg(value_name = "INTERVAL", value_parser = validate_token)]
    pub intervals: Vec<String>,

    /// Print program name and version
    #[arg(short = 'v', long)]
    pub version: bool,

    /// Print copyright information
    #[arg(short = 'c', long)]
    pub copyright: bool,

    /// Configuration file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Extra arguments for shutdown(8)
    #[arg(last = true, value_name = "SHUTDOWN_ARG")]
    pub shutdown_args: Vec<String>,
}

/// `autohaltd`: stay resident and halt once the machine has been quiet.
#[derive(Debug, Clone, Parser)]
#[command(name = "autohaltd")]
#[command(about = "Bring the system down when nobody has been logged in for a while")]
#[command(after_help = INTERVAL_HELP, disable_version_flag = true)]
pub struct DaemonCli {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Do not fork into the background
    #[arg(short = 'f', long)]
    pub foreground: bool,
}

/// `autohalt`: check once and halt if the machine has been quiet.
#[derive(Debug, Clone, Parser)]
#[command(name = "autohalt")]
#[command(about = "Bring the system down, but only if nobody has been logged in for a while")]
#[command(after_help = INTERVAL_HELP, disable_version_flag = true)]
pub struct CheckCli {
    #[command(flatten)]
    pub common: CommonArgs,
}

fn validate_token(token: &str) -> std::result::Result<String, IntervalError> {
    interval::parse_token(token)?;
    Ok(token.to_string())
}

impl CommonArgs {
    /// The interval given on the command line, if any. A zero sum is a usage error.
    pub fn command_line_interval(&self) -> Result<Option<Interval>> {
        Ok(Interval::from_tokens(&self.intervals)?)
    }

    /// Resolve the total interval.
    ///
    /// Command line, then `[daemon] interval`, then `AUTOHALTD_INTERVAL`,
    /// then the built-in default.
    pub fn interval(&self, config: &Config) -> Result<Interval> {
        if let Some(interval) = self.command_line_interval()? {
            return Ok(interval);
        }
        Ok(config.interval().unwrap_or_else(Interval::from_env))
    }
}

/// Version line for `-v/--version`.
pub fn version_text(program: &str) -> String {
    format!("{} {}", program, env!("CARGO_PKG_VERSION"))
}

/// Licence notice for `-c/--copyright`.
pub fn copyright_text(program: &str) -> String {
    format!(
        "{program} -- Bring the system down when it is inactive\n\
         Copyright (c) {authors}\n\
         \n\
         Permission is hereby granted, free of charge, to any person obtaining a copy\n\
         of this software and associated documentation files, to deal in the software\n\
         without restriction, subject to the conditions of the MIT License.\n\
         \n\
         THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND.",
        program = program,
        authors = env!("CARGO_PKG_AUTHORS"),
    )
}

/// Both binaries need root: the session log is rewritten and shutdown(8) is run.
pub fn ensure_root() -> Result<()> {
    // SAFETY: geteuid cannot fail and touches no memory.
    if unsafe { libc::geteuid() } != 0 {
        return Err(Error::Usage("This program must be run as root".to_string()));
    }
    Ok(())
}

/// Operator-facing rendering of an error, in the `PROG: message` form.
pub fn render_error(program: &str, err: &Error) -> String {
    if err.is_usage() {
        format!(
            "{}: {}. Type '{} --help' for help.",
            program, err, program
        )
    } else {
        format!("{}: {}", program, err)
    }
}
