//! # loopcall-sdp-core
//!
//! Text-level Session Description Protocol handling for the loopcall
//! workspace.
//!
//! The crate works on the SDP *line sequence* rather than a full
//! session model: offers produced by a browser-grade negotiation engine are
//! munged in place and handed straight back to that engine, so every line the
//! crate does not touch must survive byte for byte.
//!
//! ## Modules
//!
//! - [`sdp::lines`]: CRLF line model and media-section lookup
//! - [`sdp::attributes`]: `a=extmap` and `a=candidate` attribute parsers
//! - [`sdp::augment`]: header-extension augmentation of an offer
//!
//! ## Example
//!
//! ```rust
//! use loopcall_sdp_core::add_header_extension;
//!
//! let offer = "v=0\r\n\
//!     m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
//!     a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level\r\n";
//!
//! let munged = add_header_extension(offer, "urn:example:ext");
//! assert!(munged.contains("a=extmap:2 urn:example:ext\r\n"));
//! ```

pub mod error;
pub mod sdp;

pub use error::{Error, Result};
pub use sdp::augment::{
    add_header_extension, add_header_extension_with_report, SectionAugmentation,
    ABS_CAPTURE_TIME_URI,
};
pub use sdp::attributes::{
    extmap_id, parse_candidate, parse_extmap, ExtMap, ExtMapDirection, IceCandidateAttribute,
    EXTMAP_ALLOW_MIXED,
};
pub use sdp::lines::{MediaKind, MediaSection, SdpLines};

/// Prelude module
///
/// Import common SDP types and functions.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::sdp::attributes::{parse_candidate, parse_extmap, ExtMap, ExtMapDirection};
    pub use crate::sdp::augment::{add_header_extension, ABS_CAPTURE_TIME_URI};
    pub use crate::sdp::lines::{MediaKind, SdpLines};
}
