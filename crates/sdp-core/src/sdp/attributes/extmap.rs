//! SDP ExtMap Attribute Parser
//!
//! Implements parser for RTP header extension map attributes as defined in RFC 8285.
//! Format: a=extmap:<id>[/<direction>] <uri> [<extension parameters>]

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::sdp::attributes::common::positive_integer;
use nom::{bytes::complete::tag, sequence::preceded, IResult};

/// Line prefix of a header extension mapping
pub const EXTMAP_PREFIX: &str = "a=extmap:";

/// Session or media level marker allowing one- and two-byte headers to mix (RFC 8285 §6)
pub const EXTMAP_ALLOW_MIXED: &str = "a=extmap-allow-mixed";

/// Highest id usable with the one-byte header form
pub const ONE_BYTE_MAX_ID: u32 = 14;

/// Highest id usable with the two-byte header form
pub const TWO_BYTE_MAX_ID: u32 = 255;

/// Direction qualifier of an extension mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtMapDirection {
    SendOnly,
    RecvOnly,
    SendRecv,
    Inactive,
}

impl ExtMapDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtMapDirection::SendOnly => "sendonly",
            ExtMapDirection::RecvOnly => "recvonly",
            ExtMapDirection::SendRecv => "sendrecv",
            ExtMapDirection::Inactive => "inactive",
        }
    }
}

impl fmt::Display for ExtMapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtMapDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sendonly" => Ok(ExtMapDirection::SendOnly),
            "recvonly" => Ok(ExtMapDirection::RecvOnly),
            "sendrecv" => Ok(ExtMapDirection::SendRecv),
            "inactive" => Ok(ExtMapDirection::Inactive),
            other => Err(Error::SdpParsingError(format!("Invalid extmap direction: {}", other))),
        }
    }
}

/// A parsed `a=extmap` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtMap {
    pub id: u32,
    pub direction: Option<ExtMapDirection>,
    pub uri: String,
    pub params: Option<String>,
}

impl ExtMap {
    /// Mapping without direction or parameters
    pub fn new(id: u32, uri: impl Into<String>) -> Self {
        Self {
            id,
            direction: None,
            uri: uri.into(),
            params: None,
        }
    }

    /// Whether this id can only be carried in a two-byte header
    pub fn requires_two_byte_header(&self) -> bool {
        self.id > ONE_BYTE_MAX_ID
    }
}

impl fmt::Display for ExtMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", EXTMAP_PREFIX, self.id)?;
        if let Some(direction) = &self.direction {
            write!(f, "/{}", direction)?;
        }
        write!(f, " {}", self.uri)?;
        if let Some(params) = &self.params {
            write!(f, " {}", params)?;
        }
        Ok(())
    }
}

/// Parser for the `a=extmap:<id>` head of a line
fn extmap_id_parser(input: &str) -> IResult<&str, u32> {
    preceded(tag(EXTMAP_PREFIX), positive_integer)(input)
}

/// Extension id of a mapping line, if the line carries one
///
/// Lenient: takes the first `a=extmap:` in the line that is followed by
/// digits and reads those digits, ignoring direction, URI and parameters.
/// Lines such as `a=extmap-allow-mixed` do not match.
pub fn extmap_id(line: &str) -> Option<u32> {
    line.match_indices(EXTMAP_PREFIX)
        .find_map(|(start, _)| extmap_id_parser(&line[start..]).ok())
        .map(|(_, id)| id)
}

/// Parses extmap attribute: a=extmap:<id>[/<direction>] <uri> [<extension parameters>]
///
/// `value` may include or omit the `a=extmap:` prefix.
pub fn parse_extmap(value: &str) -> Result<ExtMap> {
    let value = value.trim();
    let value = value.strip_prefix(EXTMAP_PREFIX).unwrap_or(value);

    // First, split the string by whitespace
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(Error::SdpParsingError(format!("Invalid extmap format: {}", value)));
    }

    // Parse ID and optional direction
    let (id_part, direction_part) = match parts[0].split_once('/') {
        Some((id, direction)) => (id, Some(direction)),
        None => (parts[0], None),
    };

    let id = match id_part.parse::<u32>() {
        Ok(id) if (1..=TWO_BYTE_MAX_ID).contains(&id) => id,
        _ => {
            return Err(Error::SdpParsingError(format!(
                "Extmap id out of range (1-255): {}",
                parts[0]
            )))
        }
    };

    let direction = direction_part.map(str::parse::<ExtMapDirection>).transpose()?;

    // URI is the second part
    let uri = parts[1].to_string();

    // Basic URI validation - should start with urn: or http(s):
    if !uri.starts_with("urn:") && !uri.starts_with("http") {
        return Err(Error::SdpParsingError(format!("Invalid extmap URI: {}", uri)));
    }

    // Join any remaining parts as parameters
    let params = if parts.len() > 2 {
        Some(parts[2..].join(" "))
    } else {
        None
    };

    Ok(ExtMap {
        id,
        direction,
        uri,
        params,
    })
}
