//! Actors and remote addresses attached to log entries

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Whoever performed a change
///
/// Entries copy the id and display name at log time, so removing the actor
/// record later leaves existing entries intact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display {
            Some(display) => write!(f, "{} ({})", display, self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// Client address a change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAddr {
    pub ip: IpAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl RemoteAddr {
    pub fn new(ip: IpAddr, port: Option<u16>) -> Self {
        Self { ip, port }
    }

    /// Parse one address as found in proxy headers: `1.2.3.4`,
    /// `1.2.3.4:8080`, `::1` or `[::1]:8080`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(socket) = raw.parse::<SocketAddr>() {
            return Some(Self::from(socket));
        }
        if let Ok(ip) = raw.parse::<IpAddr>() {
            return Some(Self { ip, port: None });
        }
        // Bracketed IPv6 without a port
        raw.strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|inner| inner.parse::<IpAddr>().ok())
            .map(|ip| Self { ip, port: None })
    }
}

impl From<SocketAddr> for RemoteAddr {
    fn from(socket: SocketAddr) -> Self {
        Self {
            ip: socket.ip(),
            port: Some(socket.port()),
        }
    }
}

impl fmt::Display for RemoteAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.ip, self.port) {
            (IpAddr::V6(ip), Some(port)) => write!(f, "[{}]:{}", ip, port),
            (ip, Some(port)) => write!(f, "{}:{}", ip, port),
            (ip, None) => write!(f, "{}", ip),
        }
    }
}
