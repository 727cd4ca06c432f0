//! In-memory doubles for sessions, pauses and logs

use anyhow::{anyhow, bail, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::logger::{LogKey, Logger};
use crate::pause::Pause;
use crate::remote::{Connector, DirEntry, Endpoint, RemoteFs, RemotePath};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub opens: usize,
    pub closes: usize,
    pub lists: usize,
    pub writes: usize,
    pub mkdirs: Vec<String>,
    pub open_now: usize,
    pub max_open: usize,
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    stats: Stats,
    timeouts_left: usize,
    reject_auth: bool,
    forbid_listing: bool,
    reject_writes: bool,
    failing_close: bool,
    failing_lists: HashSet<String>,
    failing_reads: HashSet<String>,
}

/// A whole server's tree, shared by every session opened against it.
#[derive(Clone, Default)]
pub struct MemFs {
    state: Arc<Mutex<State>>,
}

fn parent_key(key: &str) -> &str {
    match key.rfind('/') {
        Some(idx) => &key[..idx],
        None => "",
    }
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from paths; a trailing `/` makes a directory.
    pub fn with(paths: &[&str]) -> Self {
        let fs = Self::new();
        for p in paths {
            match p.strip_suffix('/') {
                Some(d) => fs.add_dir(d),
                None => fs.add_file(p, p.as_bytes()),
            }
        }
        fs
    }

    pub fn add_dir(&self, path: &str) {
        let mut st = self.state.lock();
        let mut acc = String::new();
        for part in path.split('/') {
            if !acc.is_empty() {
                acc.push('/');
            }
            acc.push_str(part);
            st.nodes.entry(acc.clone()).or_insert(Node::Dir);
        }
    }

    pub fn add_file(&self, path: &str, content: &[u8]) {
        let parent = parent_key(path);
        if !parent.is_empty() {
            self.add_dir(parent);
        }
        self.state
            .lock()
            .nodes
            .insert(path.to_string(), Node::File(content.to_vec()));
    }

    pub fn files(&self) -> Vec<String> {
        self.state
            .lock()
            .nodes
            .iter()
            .filter(|(_, n)| matches!(n, Node::File(_)))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().nodes.get(path) {
            Some(Node::File(b)) => Some(b.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.state.lock().nodes.get(path), Some(Node::Dir))
    }

    pub fn stats(&self) -> Stats {
        self.state.lock().stats.clone()
    }

    pub fn fail_connects_with_timeout(&self, n: usize) {
        self.state.lock().timeouts_left = n;
    }

    pub fn reject_auth(&self) {
        self.state.lock().reject_auth = true;
    }

    pub fn forbid_listing(&self) {
        self.state.lock().forbid_listing = true;
    }

    pub fn reject_writes(&self) {
        self.state.lock().reject_writes = true;
    }

    pub fn fail_close(&self) {
        self.state.lock().failing_close = true;
    }

    pub fn fail_list(&self, path: &str) {
        self.state.lock().failing_lists.insert(path.to_string());
    }

    pub fn fail_read(&self, path: &str) {
        self.state.lock().failing_reads.insert(path.to_string());
    }

    fn open_session(&self) -> Result<MemSession> {
        let mut st = self.state.lock();
        st.stats.opens += 1;
        if st.timeouts_left > 0 {
            st.timeouts_left -= 1;
            return Err(io::Error::new(io::ErrorKind::TimedOut, "connection timed out").into());
        }
        if st.reject_auth {
            bail!("Authentication failed");
        }
        st.stats.open_now += 1;
        st.stats.max_open = st.stats.max_open.max(st.stats.open_now);
        Ok(MemSession {
            fs: self.clone(),
            cwd: String::new(),
        })
    }
}

impl Connector for MemFs {
    type Session = MemSession;

    fn open(&self, _endpoint: &Endpoint) -> Result<MemSession> {
        self.open_session()
    }
}

/// Several servers addressed by `Endpoint.host`.
#[derive(Clone, Default)]
pub struct MemNet {
    hosts: HashMap<String, MemFs>,
}

impl MemNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, name: &str, fs: MemFs) -> Self {
        self.hosts.insert(name.to_string(), fs);
        self
    }
}

impl Connector for MemNet {
    type Session = MemSession;

    fn open(&self, endpoint: &Endpoint) -> Result<MemSession> {
        self.hosts
            .get(&endpoint.host)
            .ok_or_else(|| anyhow!("unknown host {}", endpoint.host))?
            .open_session()
    }
}

pub struct MemSession {
    fs: MemFs,
    cwd: String,
}

impl MemSession {
    fn key(&self, path: &RemotePath) -> String {
        let p = path.as_str();
        if let Some(abs) = p.strip_prefix('/') {
            return abs.to_string();
        }
        if p.is_empty() || p == "." {
            return self.cwd.clone();
        }
        if self.cwd.is_empty() {
            p.to_string()
        } else {
            format!("{}/{}", self.cwd, p)
        }
    }
}

impl RemoteFs for MemSession {
    fn list_dir(&self, path: &RemotePath) -> Result<Vec<DirEntry>> {
        let key = self.key(path);
        let mut st = self.fs.state.lock();
        assert!(!st.forbid_listing, "list_dir({}) called on a session that forbids listing", path);
        st.stats.lists += 1;
        if st.failing_lists.contains(&key) {
            bail!("listing {} failed", key);
        }
        if !key.is_empty() && !matches!(st.nodes.get(&key), Some(Node::Dir)) {
            bail!("No such directory: {}", key);
        }
        Ok(st
            .nodes
            .iter()
            .filter(|(k, _)| k.as_str() != key && parent_key(k) == key)
            .map(|(k, n)| DirEntry {
                name: k.rsplit('/').next().unwrap_or(k).to_string(),
                is_dir: matches!(n, Node::Dir),
            })
            .collect())
    }

    fn exists(&self, path: &RemotePath) -> Result<bool> {
        let key = self.key(path);
        Ok(key.is_empty() || self.fs.state.lock().nodes.contains_key(&key))
    }

    fn mkdir(&self, path: &RemotePath) -> Result<()> {
        let key = self.key(path);
        let mut st = self.fs.state.lock();
        st.stats.mkdirs.push(key.clone());
        let parent = parent_key(&key);
        if !parent.is_empty() && !matches!(st.nodes.get(parent), Some(Node::Dir)) {
            bail!("No such directory: {}", parent);
        }
        if st.nodes.contains_key(&key) {
            bail!("Already exists: {}", key);
        }
        st.nodes.insert(key, Node::Dir);
        Ok(())
    }

    fn open_read(&self, path: &RemotePath) -> Result<Box<dyn Read + '_>> {
        let key = self.key(path);
        let st = self.fs.state.lock();
        if st.failing_reads.contains(&key) {
            bail!("read {} failed", key);
        }
        match st.nodes.get(&key) {
            Some(Node::File(b)) => Ok(Box::new(Cursor::new(b.clone()))),
            _ => bail!("No such file: {}", key),
        }
    }

    fn open_write(&self, path: &RemotePath) -> Result<Box<dyn Write + '_>> {
        let key = self.key(path);
        let mut st = self.fs.state.lock();
        st.stats.writes += 1;
        if st.reject_writes {
            bail!("Permission denied: {}", key);
        }
        let parent = parent_key(&key);
        if !parent.is_empty() && !matches!(st.nodes.get(parent), Some(Node::Dir)) {
            bail!("No such directory: {}", parent);
        }
        Ok(Box::new(MemWriter {
            fs: self.fs.clone(),
            key,
            buf: Vec::new(),
        }))
    }

    fn chdir(&mut self, path: &RemotePath) -> Result<()> {
        let key = self.key(path);
        let st = self.fs.state.lock();
        if !matches!(st.nodes.get(&key), Some(Node::Dir)) {
            bail!("No such directory: {}", key);
        }
        drop(st);
        self.cwd = key;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut st = self.fs.state.lock();
        st.stats.closes += 1;
        st.stats.open_now -= 1;
        if st.failing_close {
            bail!("connection reset while closing");
        }
        Ok(())
    }
}

struct MemWriter {
    fs: MemFs,
    key: String,
    buf: Vec<u8>,
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.fs
            .state
            .lock()
            .nodes
            .insert(self.key.clone(), Node::File(self.buf.clone()));
        Ok(())
    }
}

impl Drop for MemWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Records requested waits without sleeping.
#[derive(Default)]
pub struct RecordingPause {
    waits: Mutex<Vec<Duration>>,
    cancelled: bool,
}

impl RecordingPause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelled() -> Self {
        Self {
            waits: Mutex::new(Vec::new()),
            cancelled: true,
        }
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, d: Duration) -> bool {
        self.waits.lock().push(d);
        !self.cancelled
    }
}

#[derive(Default)]
pub struct MemoryLogger {
    pub failures: Mutex<Vec<(LogKey, String, String)>>,
    pub copies: Mutex<Vec<RemotePath>>,
}

impl MemoryLogger {
    pub fn failure_count(&self) -> usize {
        self.failures.lock().len()
    }
}

impl Logger for MemoryLogger {
    fn copied(&self, _key: &LogKey, path: &RemotePath, _bytes: u64) {
        self.copies.lock().push(path.clone());
    }

    fn failure(&self, key: &LogKey, context: &str, msg: &str) {
        self.failures
            .lock()
            .push((key.clone(), context.to_string(), msg.to_string()));
    }
}
