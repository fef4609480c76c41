//! Egress proxy credentials and round-robin rotation
//!
//! Every outbound call (signature polling, transaction fetch, marketplace
//! queries, submission) is routed through one credential from a fixed
//! ordered list. The pool hands out the next credential on each call,
//! wrapping around.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};

/// One egress proxy credential, parsed from `host:port:user:pass`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCredential {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ProxyCredential {
    /// Proxy URL without credentials (those go through basic auth)
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Build an HTTP client routing all traffic through this credential.
    ///
    /// Clients are built per call: each pipeline step may run under a
    /// different credential than the previous one.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let proxy = reqwest::Proxy::all(self.url())?.basic_auth(&self.username, &self.password);
        let client = reqwest::Client::builder().proxy(proxy).build()?;
        Ok(client)
    }
}

impl FromStr for ProxyCredential {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 4 {
            return Err(Error::InvalidProxy(format!(
                "expected host:port:user:pass, got {:?}",
                s
            )));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(Error::InvalidProxy(format!("empty field in {:?}", s)));
        }
        let port: u16 = parts[1]
            .parse()
            .map_err(|_| Error::InvalidProxy(format!("invalid port in {:?}", s)))?;

        Ok(Self {
            host: parts[0].to_string(),
            port,
            username: parts[2].to_string(),
            password: parts[3].to_string(),
        })
    }
}

// Password never shows up in logs
impl fmt::Display for ProxyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Fixed ordered credential list with a round-robin cursor.
///
/// The cursor is a single atomic counter, so advancement is serialized
/// without a lock. Two workers drawing at the same instant get distinct
/// positions; simultaneous reuse of one credential can only happen after
/// a full wrap, which is a rate-limit nuisance rather than a safety issue.
pub struct ProxyPool {
    credentials: Vec<ProxyCredential>,
    cursor: AtomicUsize,
}

impl ProxyPool {
    /// Parse a pool from raw `host:port:user:pass` entries.
    ///
    /// An empty list is operator misconfiguration and fails fast.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::Config("proxy list is empty".into()));
        }

        let credentials = entries
            .iter()
            .map(|e| e.as_ref().parse())
            .collect::<Result<Vec<ProxyCredential>>>()?;

        Ok(Self {
            credentials,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Hand out the next credential, wrapping around
    pub fn next(&self) -> &ProxyCredential {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.credentials[idx % self.credentials.len()]
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
