//! Classification of textual CIDR prefixes as IPv4 or IPv6.

use ipnet::{Ipv4Net, Ipv6Net};

/// Return `true` iff `s` is a well-formed IPv4 address/length CIDR pair. The length must be
/// present; a bare address is not a valid prefix here.
pub fn is_ipv4(s: &str) -> bool {
    s.parse::<Ipv4Net>().is_ok()
}

/// Return `true` iff `s` is a well-formed IPv6 address/length CIDR pair.
pub fn is_ipv6(s: &str) -> bool {
    s.parse::<Ipv6Net>().is_ok()
}

/// Parse `s` as a prefix and return its bit length, if it is valid for the given family.
pub fn prefix_len_v4(s: &str) -> Option<u8> {
    s.parse::<Ipv4Net>().ok().map(|n| n.prefix_len())
}

/// Parse `s` as a prefix and return its bit length, if it is valid for the given family.
pub fn prefix_len_v6(s: &str) -> Option<u8> {
    s.parse::<Ipv6Net>().ok().map(|n| n.prefix_len())
}
