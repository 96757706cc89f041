//! SDP Attribute Parsers
//!
//! Parsers for the attributes the loopback flow inspects: RTP header
//! extension maps (RFC 8285) and ICE candidates (RFC 8839).

pub mod candidate;
pub mod common;
pub mod extmap;

pub use candidate::{parse_candidate, IceCandidateAttribute};
pub use extmap::{
    extmap_id, parse_extmap, ExtMap, ExtMapDirection, EXTMAP_ALLOW_MIXED, EXTMAP_PREFIX,
    ONE_BYTE_MAX_ID, TWO_BYTE_MAX_ID,
};
