//! Endpoint host parsing: `host[:port]`, `sftp://host[:port]`, `file:///dir`

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

pub const DEFAULT_SFTP_PORT: u16 = 22;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Sftp { host: String, port: u16 },
    Local { root: PathBuf },
}

pub fn parse_target(host: &str) -> Result<Target> {
    let s_trim = host.trim();
    let lower = s_trim.to_ascii_lowercase();

    if lower.starts_with("file://") {
        let rest = &s_trim["file://".len()..];
        if rest.is_empty() {
            bail!("file:// endpoint without a directory: {}", host);
        }
        return Ok(Target::Local { root: PathBuf::from(rest) });
    }

    let mut rest = s_trim;
    if lower.starts_with("sftp://") {
        rest = &s_trim["sftp://".len()..];
    }
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        bail!("empty host");
    }
    let (host, port) = split_host_port(rest)
        .with_context(|| format!("invalid endpoint {}", s_trim))?;
    if host.is_empty() {
        bail!("empty host in endpoint {}", s_trim);
    }
    Ok(Target::Sftp { host, port })
}

/// `host`, `host:port`, `[v6]`, `[v6]:port`, or a bare IPv6 literal
fn split_host_port(s: &str) -> Result<(String, u16)> {
    if let Some(bracketed) = s.strip_prefix('[') {
        let (host, tail) = bracketed.split_once(']').context("missing ']'")?;
        let port = match tail {
            "" => DEFAULT_SFTP_PORT,
            _ => tail
                .strip_prefix(':')
                .context("expected ':' after ']'")?
                .parse()
                .context("invalid port")?,
        };
        return Ok((host.to_string(), port));
    }
    // Two or more colons without brackets can only be an IPv6 address.
    if s.matches(':').count() > 1 {
        return Ok((s.to_string(), DEFAULT_SFTP_PORT));
    }
    match s.split_once(':') {
        Some((host, port)) => Ok((host.to_string(), port.parse().context("invalid port")?)),
        None => Ok((s.to_string(), DEFAULT_SFTP_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_defaults_to_port_22() {
        assert_eq!(
            parse_target("sftp.example.com").unwrap(),
            Target::Sftp { host: "sftp.example.com".into(), port: 22 }
        );
    }

    #[test]
    fn scheme_and_port() {
        assert_eq!(
            parse_target("SFTP://files.example:2222/").unwrap(),
            Target::Sftp { host: "files.example".into(), port: 2222 }
        );
    }

    #[test]
    fn local_directory() {
        assert_eq!(
            parse_target("file:///srv/outbox").unwrap(),
            Target::Local { root: PathBuf::from("/srv/outbox") }
        );
    }

    #[test]
    fn ipv6_hosts() {
        assert_eq!(
            parse_target("[::1]:2222").unwrap(),
            Target::Sftp { host: "::1".into(), port: 2222 }
        );
        assert_eq!(
            parse_target("sftp://[fe80::1]").unwrap(),
            Target::Sftp { host: "fe80::1".into(), port: 22 }
        );
        assert_eq!(
            parse_target("::1").unwrap(),
            Target::Sftp { host: "::1".into(), port: 22 }
        );
        assert!(parse_target("[::1").is_err());
        assert!(parse_target("[::1]2222").is_err());
    }

    #[test]
    fn rejects_bad_port_and_empty() {
        assert!(parse_target("host:notaport").is_err());
        assert!(parse_target("  ").is_err());
        assert!(parse_target("file://").is_err());
    }
}
