//! autohalt - halt the machine now if nobody has been logged in for a while
//!
//! Runs a single check. If it is not yet time to halt, exits successfully
//! without doing anything.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use autohalt::cli::{self, CheckCli};
use autohalt::evaluator::Decision;
use autohalt::ledger::LedgerReader;
use autohalt::scheduler;
use autohalt::shutdown::ShutdownCommand;
use autohalt::{error, logging, Config};

const PROGRAM: &str = "autohalt";

fn main() -> ExitCode {
    match run(CheckCli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

fn run(args: CheckCli) -> Result<()> {
    let common = &args.common;
    if common.version {
        println!("{}", cli::version_text(PROGRAM));
        return Ok(());
    }
    if common.copyright {
        println!("{}", cli::copyright_text(PROGRAM));
        return Ok(());
    }

    common.command_line_interval()?;
    cli::ensure_root()?;

    let config = Config::load(&common.config)?;
    let interval = common.interval(&config)?;
    logging::init(&config.logging)?;

    let mut scanner = LedgerReader::new(&config.ledger.session_log);
    match scheduler::check(&mut scanner, interval)? {
        Decision::Halt => {
            let halter = ShutdownCommand::from_config(&config.shutdown, &common.shutdown_args);
            Err(halter.exec().into())
        }
        Decision::Wait(secs) => {
            info!(remaining = secs, "Not halting yet");
            Ok(())
        }
    }
}

fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<error::Error>() {
        Some(err) => {
            eprintln!("{}", cli::render_error(PROGRAM, err));
            ExitCode::from(err.exit_code())
        }
        None => {
            eprintln!("{}: {:#}", PROGRAM, err);
            ExitCode::from(error::EXIT_FAILURE)
        }
    }
}
