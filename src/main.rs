//! ModInfo+ - browse and watch Mindustry mods from the terminal
//!
//! Each invocation opens the persisted session, runs one command and
//! flushes state before exiting.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::warn;

use modinfo_plus::cli::{self, Cli};
use modinfo_plus::config::{load_config, Config};
use modinfo_plus::logging::init_logger;
use modinfo_plus::session::Session;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    init_logger(args.verbose);

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Using default configuration");
            Config::default()
        }
    };

    let mut session = match Session::open(&config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = io::stdout().lock();
    let result = cli::run(&mut session, &args.command, &mut stdout).await;
    session.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
