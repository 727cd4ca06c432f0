//! Per-pair reconciliation: connect, enumerate both sides, diff, transfer,
//! cool down, and repeat until nothing is pending or attempts run out.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::connect::{connect, RetryPolicy};
use crate::copy::{run_batch, TransferContext};
use crate::diff::{diff, FileSet};
use crate::fs_enum::{enumerate, EnumerationRules};
use crate::logger::{LogKey, Logger};
use crate::pause::Pause;
use crate::progress::{Console, Side};
use crate::remote::{Connector, Pair, RemoteFs, RemotePath, Scoped};

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_attempts: u32,
    pub workers: usize,
    pub cooldown: Duration,
    pub retry: RetryPolicy,
    pub destination_root: RemotePath,
    pub rules: EnumerationRules,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            workers: 4,
            cooldown: Duration::from_secs(20),
            retry: RetryPolicy::default(),
            destination_root: RemotePath::new("arquivos"),
            rules: EnumerationRules::default(),
        }
    }
}

/// 1-based attempt number and its ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub number: u32,
    pub max: u32,
}

impl Attempt {
    pub fn first(max: u32) -> Self {
        Self { number: 1, max }
    }

    pub fn next(self) -> Option<Self> {
        (self.number < self.max).then(|| Self {
            number: self.number + 1,
            max: self.max,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    /// Nothing left to transfer
    Converged { attempts: u32 },
    /// Every attempt used; `pending` files of the last batch did not transfer
    Exhausted { attempts: u32, pending: usize },
    /// Interrupted while waiting
    Cancelled { attempts: u32 },
}

impl PairOutcome {
    pub fn describe(&self) -> String {
        match self {
            PairOutcome::Converged { attempts } => format!("converged attempts={}", attempts),
            PairOutcome::Exhausted { attempts, pending } => {
                format!("exhausted attempts={} pending={}", attempts, pending)
            }
            PairOutcome::Cancelled { attempts } => format!("cancelled attempts={}", attempts),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Enumerating,
    Diffing,
    Transferring,
    Cooling,
    Done,
}

enum State<S: RemoteFs> {
    Connecting,
    Enumerating {
        origin: Scoped<S>,
        destination: Scoped<S>,
    },
    Diffing {
        origin: Scoped<S>,
        destination: Scoped<S>,
        origin_set: FileSet,
        destination_set: FileSet,
    },
    Transferring {
        pending: Vec<RemotePath>,
    },
    Cooling {
        pending: usize,
    },
    Done(PairOutcome),
}

impl<S: RemoteFs> State<S> {
    fn phase(&self) -> Phase {
        match self {
            State::Connecting => Phase::Connecting,
            State::Enumerating { .. } => Phase::Enumerating,
            State::Diffing { .. } => Phase::Diffing,
            State::Transferring { .. } => Phase::Transferring,
            State::Cooling { .. } => Phase::Cooling,
            State::Done(_) => Phase::Done,
        }
    }
}

pub struct Reconciler<'a, C: Connector> {
    pub connector: &'a C,
    pub settings: &'a LoopSettings,
    pub pause: &'a dyn Pause,
    pub logger: &'a dyn Logger,
    pub console: &'a Console,
}

impl<'a, C: Connector> Reconciler<'a, C> {
    pub fn run(&self, pair: &Pair) -> Result<PairOutcome> {
        self.run_observed(pair, &mut |_, _| {})
    }

    /// Like [`run`](Self::run), reporting every state entered.
    ///
    /// A Connecting failure or an unreadable top-level folder on either side
    /// is returned as an error. Failures below the top level and transfer
    /// failures are logged and the loop carries on.
    pub fn run_observed(
        &self,
        pair: &Pair,
        observe: &mut dyn FnMut(Attempt, Phase),
    ) -> Result<PairOutcome> {
        let key = LogKey::today(&pair.destination.username);
        let mut attempt = Attempt::first(self.settings.max_attempts);
        let mut state: State<C::Session> = State::Connecting;

        loop {
            observe(attempt, state.phase());
            state = match state {
                State::Connecting => {
                    self.console.attempt(attempt.number, attempt.max);
                    let (origin, destination) = match self.open_pair(pair, &key) {
                        Ok(sessions) => sessions,
                        Err(e) => {
                            self.logger.failure(&key, "connect", &format!("{:?}", e));
                            self.console.warn("connect", &e);
                            return Err(e);
                        }
                    };
                    State::Enumerating { origin, destination }
                }
                State::Enumerating { origin, destination } => {
                    let sets = self
                        .enumerate_side(&*origin, Side::Origin, &key)
                        .and_then(|o| {
                            Ok((o, self.enumerate_side(&*destination, Side::Destination, &key)?))
                        });
                    match sets {
                        Ok((origin_set, destination_set)) => State::Diffing {
                            origin,
                            destination,
                            origin_set,
                            destination_set,
                        },
                        Err(e) => {
                            self.logger.failure(&key, "enumerate", &format!("{:?}", e));
                            self.console.warn("enumerate", &e);
                            self.release(origin, &key);
                            self.release(destination, &key);
                            return Err(e);
                        }
                    }
                }
                State::Diffing {
                    origin,
                    destination,
                    origin_set,
                    destination_set,
                } => {
                    let pending = diff(&origin_set, &destination_set);
                    self.console
                        .pending(origin_set.len(), destination_set.len(), pending.len());
                    // Enumeration sessions are never reused for transfers.
                    self.release(origin, &key);
                    self.release(destination, &key);
                    if pending.is_empty() {
                        State::Done(PairOutcome::Converged {
                            attempts: attempt.number,
                        })
                    } else {
                        State::Transferring { pending }
                    }
                }
                State::Transferring { pending } => {
                    let ctx = TransferContext {
                        connector: self.connector,
                        retry: self.settings.retry,
                        pause: self.pause,
                        logger: self.logger,
                        console: self.console,
                        destination_root: self.settings.destination_root.clone(),
                    };
                    let failed = match run_batch(&ctx, pair, &pending, self.settings.workers) {
                        Ok(report) => report.failed(),
                        Err(e) => {
                            self.logger.failure(&key, "transfer batch", &format!("{:?}", e));
                            self.console.warn("transfer batch", &e);
                            pending.len()
                        }
                    };
                    State::Cooling { pending: failed }
                }
                State::Cooling { pending } => {
                    if attempt.next().is_some() {
                        self.console
                            .cooling(attempt.number, attempt.max, self.settings.cooldown);
                    }
                    if !self.pause.pause(self.settings.cooldown) {
                        State::Done(PairOutcome::Cancelled {
                            attempts: attempt.number,
                        })
                    } else {
                        match attempt.next() {
                            Some(next) => {
                                attempt = next;
                                State::Connecting
                            }
                            None => State::Done(PairOutcome::Exhausted {
                                attempts: attempt.number,
                                pending,
                            }),
                        }
                    }
                }
                State::Done(outcome) => return Ok(outcome),
            };
        }
    }

    fn open_pair(
        &self,
        pair: &Pair,
        key: &LogKey,
    ) -> Result<(Scoped<C::Session>, Scoped<C::Session>)> {
        let origin = connect(self.connector, &pair.origin, self.settings.retry, self.pause)?;
        let mut destination =
            match connect(self.connector, &pair.destination, self.settings.retry, self.pause) {
                Ok(session) => session,
                Err(e) => {
                    self.release(origin, key);
                    return Err(e);
                }
            };
        let entered = destination
            .chdir(&self.settings.destination_root)
            .with_context(|| {
                format!(
                    "Failed to enter {} on {}",
                    self.settings.destination_root, pair.destination.host
                )
            });
        if let Err(e) = entered {
            self.release(origin, key);
            self.release(destination, key);
            return Err(e);
        }
        Ok((origin, destination))
    }

    /// Enumerate every top-level entry. An unreadable top level is an error;
    /// a failure below it keeps what was collected and stops this side's pass.
    fn enumerate_side(&self, session: &C::Session, side: Side, key: &LogKey) -> Result<FileSet> {
        let mut set = FileSet::new();
        self.console.reading(side);
        let top = session
            .list_dir(&RemotePath::new("."))
            .with_context(|| format!("Failed to list the {} root", side.label()))?;
        for entry in top {
            let start = RemotePath::new(entry.name);
            if !entry.is_dir {
                set.insert(start);
                continue;
            }
            match enumerate(session, &start, &self.settings.rules) {
                Ok(paths) => {
                    self.console.folder_read(side, &start, paths.len());
                    set.extend(paths);
                }
                Err(e) => {
                    let context = format!("enumerate {} {}", side.label(), start);
                    self.logger.failure(key, &context, &format!("{:?}", e));
                    self.console.warn(&context, &e);
                    break;
                }
            }
        }
        Ok(set)
    }

    fn release(&self, session: Scoped<C::Session>, key: &LogKey) {
        if let Err(e) = session.release() {
            self.logger.failure(key, "close session", &format!("{:?}", e));
            self.console.warn("close session", &e);
        }
    }
}
