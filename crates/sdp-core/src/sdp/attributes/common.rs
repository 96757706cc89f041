//! Common parsing utilities for SDP attributes
//!
//! This module provides reusable parsers and utilities that are shared
//! among multiple attribute parsers.

use nom::{character::complete::digit1, combinator::map_res, IResult};

/// Parses a positive integer
pub fn positive_integer(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

/// Helper function to validate IPv4 address format
pub fn is_valid_ipv4(addr: &str) -> bool {
    addr.parse::<std::net::Ipv4Addr>().is_ok()
}

/// Helper function to validate IPv6 address format
pub fn is_valid_ipv6(addr: &str) -> bool {
    addr.parse::<std::net::Ipv6Addr>().is_ok()
}

/// Helper function to validate a hostname (also accepts mDNS `.local` names)
pub fn is_valid_hostname(host: &str) -> bool {
    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_integer() {
        assert_eq!(positive_integer("42 rest"), Ok((" rest", 42)));
        assert!(positive_integer("x1").is_err());
        // Overflows u32
        assert!(positive_integer("99999999999").is_err());
    }

    #[test]
    fn test_address_helpers() {
        assert!(is_valid_ipv4("192.168.1.10"));
        assert!(!is_valid_ipv4("192.168.1.256"));
        assert!(is_valid_ipv6("::1"));
        assert!(is_valid_hostname("4f1c3b2a-9d1e-4a57-8b4f-1f2e3d4c5b6a.local"));
        assert!(!is_valid_hostname("bad..host"));
    }
}
