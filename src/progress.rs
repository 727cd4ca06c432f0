//! Operator-facing console output
//!
//! Phase and outcome lines scroll; during a transfer batch a bar stays at the
//! bottom and per-file results print above it.

use crossterm::style::{Color, Stylize};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::copy::TransferOutcome;
use crate::remote::RemotePath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Origin,
    Destination,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Origin => "origin",
            Side::Destination => "destination",
        }
    }
}

pub struct Console {
    quiet: bool,
}

impl Console {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn quiet() -> Self {
        Self { quiet: true }
    }

    fn say(&self, s: String) {
        if !self.quiet {
            println!("{}", s);
        }
    }

    pub fn pairs_loaded(&self, accounts: &[&str]) {
        self.say(format!(
            "{} active pair(s): {}",
            accounts.len().to_string().bold(),
            accounts.join(", ")
        ));
        self.say("=".repeat(50));
    }

    pub fn pair_start(&self, account: &str) {
        self.say(format!("\n{}", format!("Starting SFTP sync for {}", account).with(Color::Yellow)));
    }

    pub fn attempt(&self, number: u32, max: u32) {
        self.say(format!("{} {}/{}", "Attempt".bold(), number, max));
    }

    pub fn reading(&self, side: Side) {
        self.say(format!("Reading {} folder...", side.label()));
    }

    pub fn folder_read(&self, side: Side, name: &RemotePath, files: usize) {
        self.say(format!(
            "  {} {} ({} files) {}",
            side.label().with(Color::DarkGrey),
            name,
            files,
            "ok".with(Color::Green)
        ));
    }

    pub fn pending(&self, origin: usize, destination: usize, pending: usize) {
        self.say(format!(
            "{} origin, {} destination, {} to transfer",
            origin,
            destination,
            pending.to_string().bold()
        ));
    }

    pub fn warn(&self, context: &str, err: &anyhow::Error) {
        if !self.quiet {
            eprintln!("{} {}: {:#}", "error".with(Color::Red).bold(), context, err);
        }
    }

    pub fn cooling(&self, attempt: u32, max: u32, wait: Duration) {
        self.say(format!(
            "Attempt {} of {} finished; retrying failed files in {}s...",
            attempt,
            max,
            wait.as_secs()
        ));
    }

    pub fn converged(&self, account: &str, attempts: u32) {
        self.say(format!(
            "{} {} in sync after {} attempt(s)",
            "Done".with(Color::Green).bold(),
            account,
            attempts
        ));
    }

    pub fn exhausted(&self, account: &str, attempts: u32, pending: usize) {
        self.say(format!(
            "{} {}: maximum of {} attempts reached with {} file(s) pending, try again later",
            "Gave up".with(Color::Yellow).bold(),
            account,
            attempts,
            pending
        ));
    }

    pub fn cancelled(&self, account: &str) {
        self.say(format!("{} {}", "Interrupted".with(Color::Red).bold(), account));
    }

    pub fn batch(&self, total: usize) -> BatchProgress {
        let bar = if self.quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        };
        BatchProgress {
            bar,
            quiet: self.quiet,
            start: Instant::now(),
            warnings: AtomicUsize::new(0),
        }
    }
}

/// Progress for one transfer batch; shared by all workers.
///
/// Workers print only through this type so their lines land above the bar.
pub struct BatchProgress {
    bar: ProgressBar,
    quiet: bool,
    start: Instant,
    warnings: AtomicUsize,
}

impl BatchProgress {
    pub fn note(&self, msg: &str) {
        if !self.quiet {
            self.bar
                .suspend(|| println!("  {}", msg.with(Color::DarkGrey)));
        }
    }

    /// A problem that does not by itself fail the file
    pub fn warn(&self, context: &str, err: &anyhow::Error) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        if !self.quiet {
            self.bar.suspend(|| {
                eprintln!("  {} {}: {:#}", "warning".with(Color::Yellow).bold(), context, err)
            });
        }
    }

    pub fn warnings(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    pub fn file_done(&self, path: &RemotePath, outcome: &TransferOutcome) {
        if !self.quiet {
            self.bar.suspend(|| match outcome {
                TransferOutcome::Copied { bytes } => println!(
                    "  {} {} ({} bytes)",
                    "Transferred".with(Color::Green).bold(),
                    path.to_string().with(Color::Cyan),
                    bytes
                ),
                TransferOutcome::Skipped => println!(
                    "  {} {} (already present)",
                    "Skipped".with(Color::DarkGrey),
                    path
                ),
                TransferOutcome::Failed { error } => eprintln!(
                    "  {} {}: {}",
                    "Failed".with(Color::Red).bold(),
                    path,
                    error
                ),
            });
        }
        self.bar.inc(1);
    }

    pub fn finish(&self, copied: usize, skipped: usize, failed: usize) {
        self.bar.finish_and_clear();
        if !self.quiet {
            println!(
                "Batch: {} transferred, {} skipped, {} failed, {} warning(s) in {:.1}s",
                copied,
                skipped,
                failed,
                self.warnings(),
                self.start.elapsed().as_secs_f64()
            );
        }
    }
}
