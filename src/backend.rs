//! Picks the SFTP or local backend per endpoint.

use anyhow::Result;
use std::io::{Read, Write};
use std::time::Duration;

use crate::local::{LocalConnector, LocalSession};
use crate::remote::{Connector, DirEntry, Endpoint, RemoteFs, RemotePath};
use crate::sftp::{SftpConnector, SftpSession};
use crate::url::{parse_target, Target};

pub struct AnyConnector {
    sftp: SftpConnector,
    local: LocalConnector,
}

impl AnyConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            sftp: SftpConnector::new(connect_timeout),
            local: LocalConnector,
        }
    }
}

impl Connector for AnyConnector {
    type Session = AnySession;

    fn open(&self, endpoint: &Endpoint) -> Result<AnySession> {
        Ok(match parse_target(&endpoint.host)? {
            Target::Sftp { host, port } => AnySession::Sftp(self.sftp.open_at(&host, port, endpoint)?),
            Target::Local { .. } => AnySession::Local(self.local.open(endpoint)?),
        })
    }
}

pub enum AnySession {
    Sftp(SftpSession),
    Local(LocalSession),
}

impl RemoteFs for AnySession {
    fn list_dir(&self, path: &RemotePath) -> Result<Vec<DirEntry>> {
        match self {
            AnySession::Sftp(s) => s.list_dir(path),
            AnySession::Local(s) => s.list_dir(path),
        }
    }

    fn exists(&self, path: &RemotePath) -> Result<bool> {
        match self {
            AnySession::Sftp(s) => s.exists(path),
            AnySession::Local(s) => s.exists(path),
        }
    }

    fn mkdir(&self, path: &RemotePath) -> Result<()> {
        match self {
            AnySession::Sftp(s) => s.mkdir(path),
            AnySession::Local(s) => s.mkdir(path),
        }
    }

    fn open_read(&self, path: &RemotePath) -> Result<Box<dyn Read + '_>> {
        match self {
            AnySession::Sftp(s) => s.open_read(path),
            AnySession::Local(s) => s.open_read(path),
        }
    }

    fn open_write(&self, path: &RemotePath) -> Result<Box<dyn Write + '_>> {
        match self {
            AnySession::Sftp(s) => s.open_write(path),
            AnySession::Local(s) => s.open_write(path),
        }
    }

    fn chdir(&mut self, path: &RemotePath) -> Result<()> {
        match self {
            AnySession::Sftp(s) => s.chdir(path),
            AnySession::Local(s) => s.chdir(path),
        }
    }

    fn close(&mut self) -> Result<()> {
        match self {
            AnySession::Sftp(s) => s.close(),
            AnySession::Local(s) => s.close(),
        }
    }
}
