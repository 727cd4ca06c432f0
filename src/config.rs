//! `sftps.toml`: run settings plus the table of origin/destination pairs

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::connect::RetryPolicy;
use crate::fs_enum::EnumerationRules;
use crate::reconcile::LoopSettings;
use crate::remote::{Endpoint, Pair, RemotePath};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub max_attempts: u32,
    pub workers: usize,
    pub cooldown_secs: u64,
    pub connect_retries: u32,
    pub connect_backoff_secs: u64,
    pub connect_timeout_secs: u64,
    pub destination_root: String,
    pub log_dir: PathBuf,
    pub max_depth: usize,
    pub prune_markers: Vec<String>,
    pub isolate_pair_failures: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let loop_defaults = LoopSettings::default();
        Self {
            max_attempts: loop_defaults.max_attempts,
            workers: loop_defaults.workers,
            cooldown_secs: loop_defaults.cooldown.as_secs(),
            connect_retries: loop_defaults.retry.retries,
            connect_backoff_secs: loop_defaults.retry.backoff.as_secs(),
            connect_timeout_secs: 30,
            destination_root: loop_defaults.destination_root.to_string(),
            log_dir: PathBuf::from("logs"),
            max_depth: loop_defaults.rules.max_depth,
            prune_markers: loop_defaults.rules.prune_markers,
            isolate_pair_failures: false,
        }
    }
}

impl Settings {
    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            max_attempts: self.max_attempts,
            workers: self.workers,
            cooldown: Duration::from_secs(self.cooldown_secs),
            retry: RetryPolicy {
                retries: self.connect_retries,
                backoff: Duration::from_secs(self.connect_backoff_secs),
            },
            destination_root: RemotePath::new(self.destination_root.clone()),
            rules: EnumerationRules {
                prune_markers: self.prune_markers.clone(),
                max_depth: self.max_depth,
            },
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// One row of the pairs table; column names match the operator spreadsheet.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PairRow {
    pub active_sftp: bool,
    pub origin: String,
    pub login_origin: String,
    pub password_origin: String,
    pub destin: String,
    pub login_destin: String,
    pub password_destin: String,
}

impl PairRow {
    pub fn to_pair(&self) -> Pair {
        Pair {
            origin: Endpoint::new(&self.origin, &self.login_origin, &self.password_origin),
            destination: Endpoint::new(&self.destin, &self.login_destin, &self.password_destin),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, rename = "pair")]
    pub pairs: Vec<PairRow>,
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(text).context("Invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        let s = &self.settings;
        if s.max_attempts == 0 {
            bail!("settings.max_attempts must be at least 1");
        }
        if s.workers == 0 {
            bail!("settings.workers must be at least 1");
        }
        if s.max_depth == 0 {
            bail!("settings.max_depth must be at least 1");
        }
        Ok(())
    }

    /// Pairs flagged `active_sftp`, in table order.
    pub fn active_pairs(&self) -> Vec<Pair> {
        self.pairs
            .iter()
            .filter(|row| row.active_sftp)
            .map(PairRow::to_pair)
            .collect()
    }
}
