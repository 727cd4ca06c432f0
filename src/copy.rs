//! Per-file transfer workers and the bounded pool that runs them
//! Each worker owns its own origin and destination sessions.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::io::{self, Write};

use crate::connect::{connect, RetryPolicy};
use crate::logger::{LogKey, Logger};
use crate::pause::Pause;
use crate::progress::{BatchProgress, Console, Side};
use crate::remote::{Connector, Pair, RemoteFs, RemotePath, Scoped};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Copied { bytes: u64 },
    /// Destination already had the path
    Skipped,
    Failed { error: String },
}

/// Everything a worker needs besides the path itself
pub struct TransferContext<'a, C: Connector> {
    pub connector: &'a C,
    pub retry: RetryPolicy,
    pub pause: &'a dyn Pause,
    pub logger: &'a dyn Logger,
    pub console: &'a Console,
    /// Directory on the destination that mirrors the origin's login directory
    pub destination_root: RemotePath,
}

/// One outcome per dispatched path, in dispatch order
#[derive(Debug, Default, Clone)]
pub struct BatchReport {
    pub outcomes: Vec<(RemotePath, TransferOutcome)>,
}

impl BatchReport {
    pub fn copied(&self) -> usize {
        self.count(|o| matches!(o, TransferOutcome::Copied { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TransferOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TransferOutcome::Failed { .. }))
    }

    pub fn bytes(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                TransferOutcome::Copied { bytes } => *bytes,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, f: impl Fn(&TransferOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| f(o)).count()
    }
}

/// Copy one file from origin to destination. Never panics or propagates:
/// failures are logged under the destination account and returned.
pub fn transfer_file<C: Connector>(
    ctx: &TransferContext<'_, C>,
    pair: &Pair,
    path: &RemotePath,
    progress: &BatchProgress,
) -> TransferOutcome {
    let key = LogKey::today(&pair.destination.username);
    match try_transfer(ctx, pair, path, &key, progress) {
        Ok(outcome) => {
            if let TransferOutcome::Copied { bytes } = outcome {
                ctx.logger.copied(&key, path, bytes);
            }
            outcome
        }
        Err(e) => {
            ctx.logger
                .failure(&key, &format!("transfer {}", path), &format!("{:?}", e));
            TransferOutcome::Failed {
                error: format!("{:#}", e),
            }
        }
    }
}

fn try_transfer<C: Connector>(
    ctx: &TransferContext<'_, C>,
    pair: &Pair,
    path: &RemotePath,
    key: &LogKey,
    progress: &BatchProgress,
) -> Result<TransferOutcome> {
    let origin = connect(ctx.connector, &pair.origin, ctx.retry, ctx.pause)?;
    let mut destination = match connect(ctx.connector, &pair.destination, ctx.retry, ctx.pause) {
        Ok(session) => session,
        Err(e) => {
            release(ctx, key, progress, Side::Origin, origin);
            return Err(e);
        }
    };

    let result = copy_between(ctx, &*origin, &mut *destination, path, key, progress);
    release(ctx, key, progress, Side::Origin, origin);
    release(ctx, key, progress, Side::Destination, destination);
    result
}

fn copy_between<S: RemoteFs>(
    ctx: &TransferContext<'_, impl Connector>,
    origin: &S,
    destination: &mut S,
    path: &RemotePath,
    key: &LogKey,
    progress: &BatchProgress,
) -> Result<TransferOutcome> {
    destination.chdir(&ctx.destination_root)?;

    let mut reader = origin.open_read(path)?;

    // Only the immediate parent is created; deeper new trees fail at open_write.
    let parent = path.parent();
    if !parent.is_empty() && !destination.exists(&parent)? {
        match destination.mkdir(&parent) {
            Ok(()) => progress.note(&format!("created {}", parent)),
            Err(e) => {
                let context = format!("create directory {}", parent);
                ctx.logger.failure(key, &context, &format!("{:?}", e));
                progress.warn(&context, &e);
            }
        }
    }

    if destination.exists(path)? {
        return Ok(TransferOutcome::Skipped);
    }

    let mut writer = destination.open_write(path)?;
    let bytes = io::copy(&mut reader, &mut writer)
        .with_context(|| format!("Failed to stream {}", path))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path))?;
    Ok(TransferOutcome::Copied { bytes })
}

fn release<C: Connector>(
    ctx: &TransferContext<'_, C>,
    key: &LogKey,
    progress: &BatchProgress,
    side: Side,
    session: Scoped<C::Session>,
) {
    if let Err(e) = session.release() {
        let context = format!("close {} session", side.label());
        ctx.logger.failure(key, &context, &format!("{:?}", e));
        progress.warn(&context, &e);
    }
}

/// Run every path through a pool of `workers` threads and wait for all of them.
pub fn run_batch<C: Connector>(
    ctx: &TransferContext<'_, C>,
    pair: &Pair,
    paths: &[RemotePath],
    workers: usize,
) -> Result<BatchReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("transfer-{}", i))
        .build()
        .context("Failed to build transfer pool")?;

    let progress = ctx.console.batch(paths.len());
    let outcomes = pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let outcome = transfer_file(ctx, pair, path, &progress);
                progress.file_done(path, &outcome);
                (path.clone(), outcome)
            })
            .collect::<Vec<_>>()
    });

    let report = BatchReport { outcomes };
    progress.finish(report.copied(), report.skipped(), report.failed());
    Ok(report)
}
