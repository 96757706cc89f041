//! SDP ICE Candidate Attribute Parser
//!
//! Implements parser for ICE candidate attributes as defined in RFC 8839.
//! Format: a=candidate:<foundation> <component-id> <transport> <priority> <conn-addr> <port> typ <cand-type> [raddr <raddr>] [rport <rport>] *(extensions)

use crate::error::{Error, Result};
use crate::sdp::attributes::common::{is_valid_hostname, is_valid_ipv4, is_valid_ipv6};

/// A parsed ICE candidate attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidateAttribute {
    pub foundation: String,
    pub component_id: u32,
    pub transport: String,
    pub priority: u32,
    pub connection_address: String,
    pub port: u16,
    pub candidate_type: String,
    pub related_address: Option<String>,
    pub related_port: Option<u16>,
    /// Remaining `name value` pairs such as `generation 0` or `ufrag abcd`
    pub extensions: Vec<(String, String)>,
}

/// Parses candidate attribute based on RFC 8839
///
/// Accepts the bare value as well as the `candidate:` and `a=candidate:`
/// prefixed forms that engines hand out in trickle events.
pub fn parse_candidate(value: &str) -> Result<IceCandidateAttribute> {
    let value = value.trim();
    let value = value.strip_prefix("a=").unwrap_or(value);
    let value = value.strip_prefix("candidate:").unwrap_or(value);
    let parts: Vec<&str> = value.split_whitespace().collect();

    // Check for minimum number of parts required
    if parts.len() < 8 {
        return Err(Error::SdpParsingError(format!(
            "Invalid candidate format, insufficient parts: {}",
            value
        )));
    }

    let foundation = parts[0].to_string();

    // Parse component ID (1-256)
    let component_id = match parts[1].parse::<u32>() {
        Ok(id) if (1..=256).contains(&id) => id,
        _ => {
            return Err(Error::SdpParsingError(format!(
                "Invalid component ID in candidate: {}",
                parts[1]
            )))
        }
    };

    // Parse transport (only UDP and TCP are valid)
    let transport = parts[2].to_string();
    if !transport.eq_ignore_ascii_case("udp") && !transport.eq_ignore_ascii_case("tcp") {
        return Err(Error::SdpParsingError(format!(
            "Invalid transport in candidate: {}",
            transport
        )));
    }

    let priority = parts[3].parse::<u32>().map_err(|_| {
        Error::SdpParsingError(format!("Invalid priority in candidate: {}", parts[3]))
    })?;

    let connection_address = parts[4].to_string();
    if !is_valid_address(&connection_address) {
        return Err(Error::SdpParsingError(format!(
            "Invalid connection address in candidate: {}",
            connection_address
        )));
    }

    let port = parts[5].parse::<u16>().map_err(|_| {
        Error::SdpParsingError(format!("Invalid port in candidate: {}", parts[5]))
    })?;

    if parts[6] != "typ" {
        return Err(Error::SdpParsingError(format!(
            "Expected 'typ' keyword in candidate, found: {}",
            parts[6]
        )));
    }

    let candidate_type = parts[7].to_string();
    if !["host", "srflx", "prflx", "relay"].contains(&candidate_type.as_str()) {
        return Err(Error::SdpParsingError(format!(
            "Invalid candidate type: {}",
            candidate_type
        )));
    }

    let mut related_address = None;
    let mut related_port = None;
    let mut extensions = Vec::new();

    for pair in parts[8..].chunks(2) {
        let [name, value] = pair else {
            return Err(Error::SdpParsingError(format!(
                "Dangling candidate extension: {}",
                pair[0]
            )));
        };
        match *name {
            "raddr" => {
                if !is_valid_address(value) {
                    return Err(Error::SdpParsingError(format!(
                        "Invalid related address in candidate: {}",
                        value
                    )));
                }
                related_address = Some(value.to_string());
            }
            "rport" => {
                related_port = Some(value.parse::<u16>().map_err(|_| {
                    Error::SdpParsingError(format!("Invalid related port in candidate: {}", value))
                })?);
            }
            _ => extensions.push((name.to_string(), value.to_string())),
        }
    }

    Ok(IceCandidateAttribute {
        foundation,
        component_id,
        transport,
        priority,
        connection_address,
        port,
        candidate_type,
        related_address,
        related_port,
        extensions,
    })
}

fn is_valid_address(addr: &str) -> bool {
    is_valid_ipv4(addr) || is_valid_ipv6(addr) || is_valid_hostname(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_candidate() {
        let c = parse_candidate("candidate:842163049 1 udp 1677729535 192.168.1.2 54400 typ host generation 0").unwrap();
        assert_eq!(c.foundation, "842163049");
        assert_eq!(c.component_id, 1);
        assert_eq!(c.transport, "udp");
        assert_eq!(c.port, 54400);
        assert_eq!(c.candidate_type, "host");
        assert_eq!(c.extensions, vec![("generation".to_string(), "0".to_string())]);
    }

    #[test]
    fn test_parse_srflx_with_related_address() {
        let c = parse_candidate(
            "a=candidate:1 1 UDP 1694498815 203.0.113.5 61665 typ srflx raddr 10.0.1.1 rport 8998",
        )
        .unwrap();
        assert_eq!(c.candidate_type, "srflx");
        assert_eq!(c.related_address.as_deref(), Some("10.0.1.1"));
        assert_eq!(c.related_port, Some(8998));
    }

    #[test]
    fn test_parse_mdns_candidate() {
        let c = parse_candidate(
            "candidate:1 1 udp 2122260223 4f1c3b2a-9d1e-4a57-8b4f-1f2e3d4c5b6a.local 50000 typ host",
        )
        .unwrap();
        assert!(c.connection_address.ends_with(".local"));
    }

    #[test]
    fn test_invalid_candidates() {
        assert!(parse_candidate("").is_err());
        assert!(parse_candidate("candidate:1 0 udp 1 10.0.0.1 9 typ host").is_err());
        assert!(parse_candidate("candidate:1 1 sctp 1 10.0.0.1 9 typ host").is_err());
        assert!(parse_candidate("candidate:1 1 udp 1 10.0.0.1 9 type host").is_err());
        assert!(parse_candidate("candidate:1 1 udp 1 10.0.0.1 9 typ bogus").is_err());
        assert!(parse_candidate("candidate:1 1 udp 1 10.0.0.1 9 typ host generation").is_err());
    }
}
