use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::remote::RemotePath;

/// Selects the log store: one file per destination account per day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogKey {
    pub account: String,
    pub date: NaiveDate,
}

impl LogKey {
    pub fn today(account: &str) -> Self {
        Self {
            account: account.to_string(),
            date: Local::now().date_naive(),
        }
    }

    /// `<account>/<YYYY-MM-DD>.log`
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.account).join(format!("{}.log", self.date.format("%Y-%m-%d")))
    }
}

pub trait Logger: Send + Sync {
    fn pair_start(&self, _key: &LogKey, _origin: &str, _destination: &str) {}
    fn copied(&self, _key: &LogKey, _path: &RemotePath, _bytes: u64) {}
    fn failure(&self, _key: &LogKey, _context: &str, _msg: &str) {}
    fn pair_done(&self, _key: &LogKey, _outcome: &str) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

/// Appends to `<root>/<account>/<date>.log`, creating directories and files as needed.
pub struct DailyLogger {
    root: PathBuf,
    run_id: Uuid,
    // Workers log concurrently; one writer at a time keeps entries whole.
    lock: Mutex<()>,
}

impl DailyLogger {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            run_id: Uuid::new_v4(),
            lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, key: &LogKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    fn append(&self, key: &LogKey, text: &str) -> Result<()> {
        let path = self.path_for(key);
        let _guard = self.lock.lock();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        f.write_all(text.as_bytes())?;
        Ok(())
    }

    fn line(&self, key: &LogKey, s: &str) {
        let text = format!("[{}] {}\n", Local::now().to_rfc3339(), s);
        if let Err(e) = self.append(key, &text) {
            eprintln!("log write failed: {:#}", e);
        }
    }
}

impl Logger for DailyLogger {
    fn pair_start(&self, key: &LogKey, origin: &str, destination: &str) {
        self.line(
            key,
            &format!("START run={} origin={} destination={}", self.run_id, origin, destination),
        );
    }

    fn copied(&self, key: &LogKey, path: &RemotePath, bytes: u64) {
        self.line(key, &format!("COPY path={} bytes={}", path, bytes));
    }

    fn failure(&self, key: &LogKey, context: &str, msg: &str) {
        let text = format!(
            "{}\n{} - {}: {}\n\n",
            "=".repeat(30),
            Local::now().to_rfc3339(),
            context,
            msg
        );
        if let Err(e) = self.append(key, &text) {
            eprintln!("log write failed: {:#}", e);
        }
    }

    fn pair_done(&self, key: &LogKey, outcome: &str) {
        self.line(key, &format!("DONE {}", outcome));
    }
}
