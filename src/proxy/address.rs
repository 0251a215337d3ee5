//! IPv4 address validation

use std::net::Ipv4Addr;

/// Returns true if `s` is exactly a dotted-quad IPv4 address.
///
/// Leading zeros in an octet are rejected, as is any surrounding text.
pub fn is_ipv4(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok()
}
