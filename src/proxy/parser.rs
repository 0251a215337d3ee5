//! Candidate extraction from proxy list text

use crate::error::HarvestError;
use crate::proxy::address::is_ipv4;
use crate::proxy::models::{Candidate, Protocol};
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Scheme prefix some lists put in front of every entry
static SCHEME_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?|socks[45])://").expect("Invalid scheme prefix regex")
});

/// Parser turning raw list text into candidates
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single list line
    ///
    /// Surrounding whitespace and an optional `http://`, `https://`,
    /// `socks4://` or `socks5://` prefix are removed. The line is kept when
    /// the text before the first `:` is an IPv4 address; the port is not
    /// inspected.
    pub fn parse_line(line: &str, protocol: Protocol) -> Option<Candidate> {
        let line = line.trim();
        let line = SCHEME_PREFIX.replace(line, "");
        let address = line.trim();

        let host = address.split(':').next().unwrap_or_default();
        if !is_ipv4(host) {
            return None;
        }

        Some(Candidate::new(address, protocol))
    }

    /// Parse every line of `content`, collapsing duplicates
    pub fn parse_string(content: &str, protocol: Protocol) -> HashSet<Candidate> {
        content
            .lines()
            .filter_map(|line| Self::parse_line(line, protocol))
            .collect()
    }

    /// Parse candidates from a local file
    pub fn parse_file<P: AsRef<Path>>(path: P, protocol: Protocol) -> Result<HashSet<Candidate>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| HarvestError::Input {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse_string(&content, protocol))
    }
}
