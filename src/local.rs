//! Local directory backend for `file://` endpoints
//!
//! Gives the reconciliation engine a second real backend: handy for dry runs
//! against a mounted share and for end-to-end tests on temp directories.

use anyhow::{anyhow, bail, Context, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};

use crate::remote::{Connector, DirEntry, Endpoint, RemoteFs, RemotePath};
use crate::url::{parse_target, Target};

#[derive(Debug, Default)]
pub struct LocalConnector;

impl Connector for LocalConnector {
    type Session = LocalSession;

    fn open(&self, endpoint: &Endpoint) -> Result<LocalSession> {
        match parse_target(&endpoint.host)? {
            Target::Local { root } => LocalSession::open(root),
            Target::Sftp { host, .. } => Err(anyhow!("{} is not a file:// endpoint", host)),
        }
    }
}

pub struct LocalSession {
    root: PathBuf,
    cwd: PathBuf,
}

impl LocalSession {
    pub fn open(root: PathBuf) -> Result<Self> {
        if !root.is_dir() {
            bail!("Root directory does not exist: {}", root.display());
        }
        Ok(Self { root, cwd: PathBuf::new() })
    }

    /// Map a remote path onto disk, refusing anything that climbs out of the root.
    fn resolve(&self, path: &RemotePath) -> Result<PathBuf> {
        let p = Path::new(path.as_str());
        let mut rel = if p.is_absolute() { PathBuf::new() } else { self.cwd.clone() };
        for comp in p.components() {
            match comp {
                Component::Normal(c) => rel.push(c),
                Component::CurDir | Component::RootDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    bail!("path escapes endpoint root: {}", path)
                }
            }
        }
        Ok(self.root.join(rel))
    }
}

impl RemoteFs for LocalSession {
    fn list_dir(&self, path: &RemotePath) -> Result<Vec<DirEntry>> {
        let dir = self.resolve(path)?;
        let mut out = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("Failed to list {}", dir.display()))? {
            let entry = entry?;
            let is_dir = entry.file_type()?.is_dir();
            out.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        // read_dir order is unspecified
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn exists(&self, path: &RemotePath) -> Result<bool> {
        let p = self.resolve(path)?;
        match fs::metadata(&p) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to stat {}", p.display()))),
        }
    }

    fn mkdir(&self, path: &RemotePath) -> Result<()> {
        let p = self.resolve(path)?;
        fs::create_dir(&p).with_context(|| format!("Failed to create directory {}", p.display()))
    }

    fn open_read(&self, path: &RemotePath) -> Result<Box<dyn Read + '_>> {
        let p = self.resolve(path)?;
        let f = File::open(&p).with_context(|| format!("Failed to open {} for reading", p.display()))?;
        Ok(Box::new(BufReader::new(f)))
    }

    fn open_write(&self, path: &RemotePath) -> Result<Box<dyn Write + '_>> {
        let p = self.resolve(path)?;
        let f = File::create(&p).with_context(|| format!("Failed to create {}", p.display()))?;
        Ok(Box::new(BufWriter::new(f)))
    }

    fn chdir(&mut self, path: &RemotePath) -> Result<()> {
        let p = self.resolve(path)?;
        if !p.is_dir() {
            bail!("Failed to change directory to {}", p.display());
        }
        self.cwd = p
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .context("working directory outside root")?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
