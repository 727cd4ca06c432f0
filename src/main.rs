//! sftp-relay: for each active origin/destination pair, copy the files the
//! destination is missing, retrying until both sides match.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sftp_relay::backend::AnyConnector;
use sftp_relay::cli::Args;
use sftp_relay::config::Config;
use sftp_relay::logger::DailyLogger;
use sftp_relay::orchestrator::Orchestrator;
use sftp_relay::pause::CancellableTimer;
use sftp_relay::progress::Console;

fn main() -> Result<()> {
    let args = Args::parse();

    let timer = Arc::new(CancellableTimer::new());
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let timer = timer.clone();
        ctrlc::set_handler(move || {
            if interrupted.swap(true, Ordering::SeqCst) {
                // Second Ctrl-C: exit with 130 (128 + SIGINT)
                std::process::exit(130);
            }
            eprintln!("\nInterrupted. Finishing in-flight transfers (Ctrl-C again to exit now)...");
            timer.cancel();
        })
        .context("Error setting Ctrl-C handler")?;
    }

    let config = Config::load(&args.config)?;
    let settings = &config.settings;
    let log_dir = args.log_dir.clone().unwrap_or_else(|| settings.log_dir.clone());

    let console = Console::new(args.quiet);
    let logger = DailyLogger::new(&log_dir);
    let connector = AnyConnector::new(settings.connect_timeout());

    let pairs = config.active_pairs();
    let accounts: Vec<&str> = pairs.iter().map(|p| p.destination.username.as_str()).collect();
    console.pairs_loaded(&accounts);

    let orchestrator = Orchestrator {
        connector: &connector,
        settings: settings.loop_settings(),
        isolate_pair_failures: settings.isolate_pair_failures,
        pause: &*timer,
        logger: &logger,
        console: &console,
    };
    orchestrator.run(&pairs)?;
    if timer.is_cancelled() {
        // Interrupted runs keep the Ctrl-C exit status
        std::process::exit(130);
    }
    Ok(())
}
