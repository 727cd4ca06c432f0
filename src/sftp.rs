//! SFTP sessions over libssh2 (`ssh2` crate)

use anyhow::{anyhow, Context, Result};
use ssh2::{ErrorCode, Session, Sftp};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use crate::remote::{Connector, DirEntry, Endpoint, RemoteFs, RemotePath};
use crate::url::{parse_target, Target};

// libssh2 constants
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_FX_NO_SUCH_FILE: i32 = 2;

pub struct SftpConnector {
    connect_timeout: Duration,
}

impl SftpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn open_at(&self, host: &str, port: u16, endpoint: &Endpoint) -> Result<SftpSession> {
        let tcp = connect_tcp(host, port, self.connect_timeout)?;
        let mut sess = Session::new().context("Failed to create SSH session")?;
        sess.set_tcp_stream(tcp);
        sess.set_timeout(self.connect_timeout.as_millis().min(u32::MAX as u128) as u32);
        sess.handshake()
            .map_err(timeout_aware)
            .with_context(|| format!("SSH handshake failed: {}:{}", host, port))?;
        sess.userauth_password(&endpoint.username, &endpoint.password)
            .map_err(timeout_aware)
            .with_context(|| format!("Authentication failed for {}@{}", endpoint.username, host))?;
        if !sess.authenticated() {
            return Err(anyhow!("Authentication rejected for {}@{}", endpoint.username, host));
        }
        let sftp = sess
            .sftp()
            .map_err(timeout_aware)
            .context("Failed to open SFTP subsystem")?;
        // Listings and transfers are not bounded; only connection setup is.
        sess.set_timeout(0);
        Ok(SftpSession {
            session: sess,
            sftp,
            cwd: None,
        })
    }
}

impl Connector for SftpConnector {
    type Session = SftpSession;

    fn open(&self, endpoint: &Endpoint) -> Result<SftpSession> {
        match parse_target(&endpoint.host)? {
            Target::Sftp { host, port } => self.open_at(&host, port, endpoint),
            Target::Local { root } => Err(anyhow!(
                "{} is a local directory, not an SFTP server",
                root.display()
            )),
        }
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addrs = (host, port)
        .to_socket_addrs()
        .with_context(|| format!("Failed to resolve {}:{}", host, port))?;
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(s) => return Ok(s),
            Err(e) => last_err = Some(e),
        }
    }
    let err = last_err
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"));
    Err(anyhow::Error::new(err).context(format!("TCP connect to {}:{} failed", host, port)))
}

/// libssh2 reports timeouts as a session error code; lift them to `TimedOut`.
fn timeout_aware(e: ssh2::Error) -> anyhow::Error {
    if e.code() == ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) {
        anyhow::Error::new(io::Error::new(io::ErrorKind::TimedOut, e.to_string()))
    } else {
        anyhow::Error::new(e)
    }
}

pub struct SftpSession {
    session: Session,
    sftp: Sftp,
    cwd: Option<String>,
}

impl SftpSession {
    fn resolve(&self, path: &RemotePath) -> String {
        let p = path.as_str();
        match &self.cwd {
            _ if p.starts_with('/') => p.to_string(),
            Some(cwd) if p.is_empty() || p == "." => cwd.clone(),
            Some(cwd) => format!("{}/{}", cwd, p),
            None if p.is_empty() => ".".to_string(),
            None => p.to_string(),
        }
    }
}

impl RemoteFs for SftpSession {
    fn list_dir(&self, path: &RemotePath) -> Result<Vec<DirEntry>> {
        let full = self.resolve(path);
        let items = self
            .sftp
            .readdir(Path::new(&full))
            .with_context(|| format!("Failed to list {}", full))?;
        Ok(items
            .into_iter()
            .filter_map(|(p, stat)| {
                let name = p.file_name()?.to_string_lossy().into_owned();
                if name == "." || name == ".." {
                    return None;
                }
                Some(DirEntry { name, is_dir: stat.is_dir() })
            })
            .collect())
    }

    fn exists(&self, path: &RemotePath) -> Result<bool> {
        let full = self.resolve(path);
        match self.sftp.stat(Path::new(&full)) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::SFTP(LIBSSH2_FX_NO_SUCH_FILE) => Ok(false),
            Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to stat {}", full))),
        }
    }

    fn mkdir(&self, path: &RemotePath) -> Result<()> {
        let full = self.resolve(path);
        self.sftp
            .mkdir(Path::new(&full), 0o755)
            .with_context(|| format!("Failed to create directory {}", full))
    }

    fn open_read(&self, path: &RemotePath) -> Result<Box<dyn Read + '_>> {
        let full = self.resolve(path);
        let f = self
            .sftp
            .open(Path::new(&full))
            .with_context(|| format!("Failed to open {} for reading", full))?;
        Ok(Box::new(f))
    }

    fn open_write(&self, path: &RemotePath) -> Result<Box<dyn Write + '_>> {
        let full = self.resolve(path);
        let f = self
            .sftp
            .create(Path::new(&full))
            .with_context(|| format!("Failed to create {}", full))?;
        Ok(Box::new(f))
    }

    fn chdir(&mut self, path: &RemotePath) -> Result<()> {
        let full = self.resolve(path);
        let stat = self
            .sftp
            .stat(Path::new(&full))
            .with_context(|| format!("Failed to change directory to {}", full))?;
        if !stat.is_dir() {
            return Err(anyhow!("{} is not a directory", full));
        }
        self.cwd = Some(full);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.session
            .disconnect(None, "sftp-relay done", None)
            .context("Failed to close SSH session")
    }
}
