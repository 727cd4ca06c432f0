//! Runs the reconciliation loop for every active pair, one pair at a time.

use anyhow::{anyhow, Result};

use crate::logger::{LogKey, Logger};
use crate::pause::Pause;
use crate::progress::Console;
use crate::reconcile::{LoopSettings, PairOutcome, Reconciler};
use crate::remote::{Connector, Pair};

#[derive(Debug)]
pub struct PairReport {
    pub account: String,
    pub result: Result<PairOutcome, String>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub pairs: Vec<PairReport>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.pairs.iter().filter(|p| p.result.is_err()).count()
    }
}

pub struct Orchestrator<'a, C: Connector> {
    pub connector: &'a C,
    pub settings: LoopSettings,
    /// Keep going after a pair fails instead of aborting the run
    pub isolate_pair_failures: bool,
    pub pause: &'a dyn Pause,
    pub logger: &'a dyn Logger,
    pub console: &'a Console,
}

impl<'a, C: Connector> Orchestrator<'a, C> {
    pub fn run(&self, pairs: &[Pair]) -> Result<RunSummary> {
        let reconciler = Reconciler {
            connector: self.connector,
            settings: &self.settings,
            pause: self.pause,
            logger: self.logger,
            console: self.console,
        };
        let mut summary = RunSummary::default();

        for pair in pairs {
            let account = pair.destination.username.clone();
            let key = LogKey::today(&account);
            self.console.pair_start(&account);
            self.logger.pair_start(&key, &pair.origin.host, &pair.destination.host);

            match reconciler.run(pair) {
                Ok(outcome) => {
                    match &outcome {
                        PairOutcome::Converged { attempts } => {
                            self.console.converged(&account, *attempts)
                        }
                        PairOutcome::Exhausted { attempts, pending } => {
                            self.console.exhausted(&account, *attempts, *pending)
                        }
                        PairOutcome::Cancelled { .. } => self.console.cancelled(&account),
                    }
                    self.logger.pair_done(&key, &outcome.describe());
                    let cancelled = matches!(outcome, PairOutcome::Cancelled { .. });
                    summary.pairs.push(PairReport {
                        account,
                        result: Ok(outcome),
                    });
                    if cancelled {
                        break;
                    }
                }
                Err(e) => {
                    self.logger.pair_done(&key, "failed");
                    if !self.isolate_pair_failures {
                        return Err(e.context(format!("Sync aborted at pair {}", account)));
                    }
                    summary.pairs.push(PairReport {
                        account,
                        result: Err(format!("{:#}", e)),
                    });
                }
            }
        }

        if summary.failed() > 0 {
            return Err(anyhow!(
                "{} of {} pair(s) failed",
                summary.failed(),
                summary.pairs.len()
            ));
        }
        Ok(summary)
    }
}
