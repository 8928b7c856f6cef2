//! autohaltd - resident daemon that halts the machine once it goes quiet

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use autohalt::cli::{self, DaemonCli};
use autohalt::files::PidFile;
use autohalt::ledger::LedgerReader;
use autohalt::scheduler::{ConfigFileSource, Daemon, Outcome};
use autohalt::shutdown::{ReleasePidFile, ShutdownCommand};
use autohalt::utils::Signals;
use autohalt::{daemon, error, logging, Config};

const PROGRAM: &str = "autohaltd";

fn main() -> ExitCode {
    match run(DaemonCli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

fn run(args: DaemonCli) -> Result<()> {
    let common = &args.common;
    if common.version {
        println!("{}", cli::version_text(PROGRAM));
        return Ok(());
    }
    if common.copyright {
        println!("{}", cli::copyright_text(PROGRAM));
        return Ok(());
    }

    // Reject a zero interval before touching anything.
    common.command_line_interval()?;
    cli::ensure_root()?;

    let config = Config::load(&common.config)?;
    let interval = common.interval(&config)?;
    logging::init(&config.logging)?;

    let pid_file = PidFile::create(&config.daemon.pid_file)?;
    if !args.foreground {
        daemon::daemonize()?;
        pid_file.record_current()?;
    }

    // ctrlc starts a thread, so handlers go in only after forking.
    let signals = Signals::new();
    signals.register()?;

    let scanner = LedgerReader::new(&config.ledger.session_log);
    let halter = ReleasePidFile::new(
        ShutdownCommand::from_config(&config.shutdown, &common.shutdown_args),
        pid_file,
    );
    info!(
        pid = std::process::id(),
        %interval,
        session_log = %config.ledger.session_log.display(),
        "autohaltd started"
    );

    let mut daemon = Daemon::new(interval, scanner, halter, signals)
        .with_interval_source(ConfigFileSource::new(&common.config));
    let outcome = daemon.run().map_err(|err| {
        // Without a log file this would repeat the stderr report.
        if config.logging.file.is_some() {
            tracing::error!(error = %err, "autohaltd failed");
        }
        err
    })?;
    match outcome {
        Outcome::Stopped => info!("autohaltd stopped"),
        Outcome::Halted => info!("Shutdown requested"),
    }
    Ok(())
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
