//! Proxy data models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Proxy protocol enumeration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Socks4,
    Socks5,
}

impl Protocol {
    /// All protocols, in output order
    pub const ALL: [Protocol; 3] = [Protocol::Http, Protocol::Socks4, Protocol::Socks5];

    /// URI scheme used both for list prefixes and for routing checks
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Socks4 => "socks4",
            Protocol::Socks5 => "socks5",
        }
    }

    /// Name of the per-protocol output file
    pub fn file_name(&self) -> String {
        format!("{}.txt", self.scheme())
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "socks4" => Ok(Protocol::Socks4),
            "socks5" => Ok(Protocol::Socks5),
            other => Err(format!(
                "Invalid protocol: {}. Use: http, socks4, socks5",
                other
            )),
        }
    }
}

/// A remote list URL tagged with the protocol its entries speak
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxySource {
    pub url: String,
    pub protocol: Protocol,
}

impl ProxySource {
    pub fn new(url: &str, protocol: Protocol) -> Self {
        Self {
            url: url.trim().to_string(),
            protocol,
        }
    }
}

/// An unvalidated `host:port` entry harvested under a protocol.
///
/// Identity is the literal address text. The port part is kept verbatim and
/// may be missing or non-numeric; a failing check filters those out later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub protocol: Protocol,
    pub address: String,
}

impl Candidate {
    pub fn new(address: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            protocol,
            address: address.into(),
        }
    }

    /// Text before the first `:`
    pub fn host(&self) -> &str {
        self.address
            .split_once(':')
            .map_or(self.address.as_str(), |(host, _)| host)
    }

    /// Proxy URL used to route check traffic through this candidate
    pub fn url(&self) -> String {
        format!("{}://{}", self.protocol, self.address)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// A candidate confirmed by a check, together with its observed exit IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingProxy {
    pub candidate: Candidate,
    pub exit_ip: String,
}

impl WorkingProxy {
    pub fn new(candidate: Candidate, exit_ip: String) -> Self {
        Self { candidate, exit_ip }
    }

    /// Whether the proxy hides its own address from the target
    pub fn is_anonymous(&self) -> bool {
        self.exit_ip != self.candidate.host()
    }

    pub fn address(&self) -> &str {
        &self.candidate.address
    }
}
