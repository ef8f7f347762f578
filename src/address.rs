//! Network Addresses
//!
//! The unresolved `host:port` form callers hand to `bind` and `connect`.
//! Resolution to a socket address is the transport's job.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::{HostError, Result};

/// A host string and port, resolved lazily by the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Host name or IP literal. Empty means "any address".
    host: String,

    /// UDP port (0 lets the OS choose when binding)
    port: u16,
}

impl Address {
    /// Create an address from a host string and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The wildcard address on the given port
    pub fn any(port: u16) -> Self {
        Self::new(String::new(), port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// True when the host part is empty
    pub fn is_any(&self) -> bool {
        self.host.is_empty()
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Address {
    type Err = HostError;

    /// Parse `host:port`, `[v6]:port` or `:port`
    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| HostError::Resolve(format!("missing port in '{}'", s)))?;

        let port = port
            .parse::<u16>()
            .map_err(|_| HostError::Resolve(format!("invalid port in '{}'", s)))?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        Ok(Self::new(host, port))
    }
}
