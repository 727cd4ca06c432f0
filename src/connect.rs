//! Session establishment with bounded retry on connection timeouts

use anyhow::Result;
use std::io;
use std::time::Duration;

use crate::pause::Pause;
use crate::remote::{Connector, Endpoint, Scoped};

/// Fixed-delay retry budget for timeouts. Other failures are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            backoff: Duration::from_secs(5),
        }
    }
}

/// True when any cause in the chain is an I/O timeout.
pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::TimedOut)
    })
}

/// Open a session, retrying timeouts up to `policy.retries` times.
pub fn connect<C: Connector>(
    connector: &C,
    endpoint: &Endpoint,
    policy: RetryPolicy,
    pause: &dyn Pause,
) -> Result<Scoped<C::Session>> {
    let mut failures = 0u32;
    loop {
        match connector.open(endpoint) {
            Ok(s) => return Ok(Scoped::new(s)),
            Err(e) if is_timeout(&e) && failures < policy.retries => {
                failures += 1;
                if !pause.pause(policy.backoff) {
                    return Err(e.context(format!(
                        "connection retry to {} cancelled",
                        endpoint.host
                    )));
                }
            }
            Err(e) => {
                return Err(e.context(format!(
                    "Failed to connect to {} as {}",
                    endpoint.host, endpoint.username
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MemFs, RecordingPause};

    fn ep() -> Endpoint {
        Endpoint::new("origin.example", "acme", "pw")
    }

    #[test]
    fn sixth_timeout_is_fatal() {
        let fs = MemFs::new();
        fs.fail_connects_with_timeout(100);
        let pause = RecordingPause::new();
        let err = connect(&fs, &ep(), RetryPolicy::default(), &pause).err().unwrap();
        assert!(is_timeout(&err));
        assert_eq!(fs.stats().opens, 6);
        assert_eq!(pause.waits(), vec![Duration::from_secs(5); 5]);
    }

    #[test]
    fn recovers_after_transient_timeouts() {
        let fs = MemFs::new();
        fs.fail_connects_with_timeout(2);
        let pause = RecordingPause::new();
        assert!(connect(&fs, &ep(), RetryPolicy::default(), &pause).is_ok());
        assert_eq!(fs.stats().opens, 3);
        assert_eq!(pause.waits().len(), 2);
    }

    #[test]
    fn auth_rejection_is_not_retried() {
        let fs = MemFs::new();
        fs.reject_auth();
        let pause = RecordingPause::new();
        let err = connect(&fs, &ep(), RetryPolicy::default(), &pause).err().unwrap();
        assert!(!is_timeout(&err));
        assert_eq!(fs.stats().opens, 1);
        assert!(pause.waits().is_empty());
    }

    #[test]
    fn cancelled_backoff_stops_retrying() {
        let fs = MemFs::new();
        fs.fail_connects_with_timeout(100);
        let pause = RecordingPause::cancelled();
        assert!(connect(&fs, &ep(), RetryPolicy::default(), &pause).is_err());
        assert_eq!(fs.stats().opens, 1);
    }

    #[test]
    fn session_closes_when_guard_drops() {
        let fs = MemFs::new();
        let pause = RecordingPause::new();
        {
            let _s = connect(&fs, &ep(), RetryPolicy::default(), &pause).unwrap();
            assert_eq!(fs.stats().closes, 0);
        }
        assert_eq!(fs.stats().closes, 1);
    }
}
