//! Remote filesystem seam: endpoints, paths, and the session traits every
//! backend implements.

use anyhow::Result;
use serde::Deserialize;
use std::fmt;
use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};

/// One side of a pair: where to connect and who to authenticate as.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub username: String,
    pub password: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One configured origin/destination pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub origin: Endpoint,
    pub destination: Endpoint,
}

/// Path on a remote server, compared as a raw string.
///
/// No normalization happens: `a/b` and `a//b` are different files, and so are
/// `A.txt` and `a.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn join(&self, name: &str) -> Self {
        Self(format!("{}/{}", self.0, name))
    }

    /// Text before the last `/`; empty for a bare name, `/` for root children.
    pub fn parent(&self) -> RemotePath {
        match self.0.rfind('/') {
            Some(0) => Self("/".to_string()),
            Some(idx) => Self(self.0[..idx].to_string()),
            None => Self(String::new()),
        }
    }

    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Any `.` anywhere in the path marks it as a file reference that is not listed.
    pub fn is_file_reference(&self) -> bool {
        self.0.contains('.')
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemotePath {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Immediate child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_dir: false }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_dir: true }
    }
}

/// Operations an open, authenticated session offers.
///
/// Relative paths resolve against the working context set by [`RemoteFs::chdir`]
/// (the login directory until then).
pub trait RemoteFs {
    fn list_dir(&self, path: &RemotePath) -> Result<Vec<DirEntry>>;

    /// `Ok(false)` only when the server reports the path as missing.
    fn exists(&self, path: &RemotePath) -> Result<bool>;

    fn mkdir(&self, path: &RemotePath) -> Result<()>;

    fn open_read(&self, path: &RemotePath) -> Result<Box<dyn Read + '_>>;

    fn open_write(&self, path: &RemotePath) -> Result<Box<dyn Write + '_>>;

    fn chdir(&mut self, path: &RemotePath) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Opens sessions against endpoints. Shared by every transfer worker.
pub trait Connector: Sync {
    type Session: RemoteFs;

    fn open(&self, endpoint: &Endpoint) -> Result<Self::Session>;
}

/// Owned session that is closed when dropped.
pub struct Scoped<S: RemoteFs> {
    session: Option<S>,
}

impl<S: RemoteFs> Scoped<S> {
    pub fn new(session: S) -> Self {
        Self { session: Some(session) }
    }

    /// Close now and surface the close error instead of discarding it.
    pub fn release(mut self) -> Result<()> {
        match self.session.take() {
            Some(mut s) => s.close(),
            None => Ok(()),
        }
    }
}

impl<S: RemoteFs> Deref for Scoped<S> {
    type Target = S;

    fn deref(&self) -> &S {
        // Only `release` and `drop` take the session, and both consume the guard.
        self.session.as_ref().unwrap_or_else(|| unreachable!("session used after release"))
    }
}

impl<S: RemoteFs> DerefMut for Scoped<S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session.as_mut().unwrap_or_else(|| unreachable!("session used after release"))
    }
}

// Fallback for unwinding; normal paths call `release` and report the error.
impl<S: RemoteFs> Drop for Scoped<S> {
    fn drop(&mut self) {
        if let Some(mut s) = self.session.take() {
            let _ = s.close();
        }
    }
}
