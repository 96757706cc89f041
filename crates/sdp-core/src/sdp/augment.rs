//! Header-extension augmentation of an SDP offer
//!
//! Engines do not always offer every RTP header extension by default. Before
//! an offer is applied as the local description it can be munged so that the
//! first `audio` and the first `video` media section each advertise an
//! additional extension URI.
//!
//! Per section the new mapping gets `max existing id + 1` and is placed right
//! after the line holding that maximum. When the maximum is already 14, the
//! last one-byte id, `a=extmap-allow-mixed` is inserted first so that the new
//! id 15 is usable with two-byte headers (RFC 8285 §4.3 and §6).
//!
//! Sections without any `a=extmap` line, and absent kinds, are left alone.
//! Augmentation never fails and is not idempotent: every call adds one more
//! mapping per section.

use tracing::debug;

use crate::sdp::attributes::extmap::{extmap_id, ExtMap, EXTMAP_ALLOW_MIXED, ONE_BYTE_MAX_ID};
use crate::sdp::lines::{MediaKind, MediaSection, SdpLines};

/// Absolute capture time header extension
pub const ABS_CAPTURE_TIME_URI: &str =
    "http://www.webrtc.org/experiments/rtp-hdrext/abs-capture-time";

/// What was inserted into one media section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionAugmentation {
    pub kind: MediaKind,
    /// Id bound to the new mapping
    pub assigned_id: u32,
    /// Line index of the new mapping in the returned body
    pub line_index: usize,
    /// Whether `a=extmap-allow-mixed` was inserted ahead of it
    pub allow_mixed_inserted: bool,
}

/// Result of scanning one media section
#[derive(Debug, Default)]
struct SectionScan {
    /// Highest id seen and the line holding its first occurrence
    max: Option<(u32, usize)>,
    allow_mixed: bool,
}

/// Add `uri` as a header extension to the first audio and video sections
pub fn add_header_extension(sdp: &str, uri: &str) -> String {
    add_header_extension_with_report(sdp, uri).0
}

/// Same as [`add_header_extension`], also reporting each insertion
pub fn add_header_extension_with_report(sdp: &str, uri: &str) -> (String, Vec<SectionAugmentation>) {
    let mut lines = SdpLines::parse(sdp);
    let mut report = Vec::new();

    for kind in MediaKind::ALL {
        // Sections are located again after every mutation so that earlier
        // insertions are accounted for.
        let Some(section) = lines.media_section(kind) else {
            debug!("No {} section in SDP, skipping header extension", kind);
            continue;
        };

        if let Some(augmentation) = augment_section(&mut lines, kind, &section, uri) {
            report.push(augmentation);
        }
    }

    (lines.to_body(), report)
}

fn augment_section(
    lines: &mut SdpLines,
    kind: MediaKind,
    section: &MediaSection,
    uri: &str,
) -> Option<SectionAugmentation> {
    let scan = scan_section(lines, section);

    let Some((max_id, max_line)) = scan.max else {
        debug!("No extmap lines in {} section, nothing to anchor on", kind);
        return None;
    };

    let Some(new_id) = max_id.checked_add(1) else {
        debug!("Extmap id {} in {} section cannot be incremented", max_id, kind);
        return None;
    };

    let mut insert_at = max_line + 1;
    let allow_mixed_inserted = max_id == ONE_BYTE_MAX_ID && !scan.allow_mixed;
    if allow_mixed_inserted {
        // One-byte header ids are exhausted
        lines.insert(insert_at, EXTMAP_ALLOW_MIXED);
        insert_at += 1;
    }

    lines.insert(insert_at, ExtMap::new(new_id, uri).to_string());
    debug!("Added extmap {} for {} in {} section", new_id, uri, kind);

    Some(SectionAugmentation {
        kind,
        assigned_id: new_id,
        line_index: insert_at,
        allow_mixed_inserted,
    })
}

fn scan_section(lines: &SdpLines, section: &MediaSection) -> SectionScan {
    let mut scan = SectionScan::default();

    for index in section.body() {
        let Some(line) = lines.get(index) else {
            break;
        };

        if line == EXTMAP_ALLOW_MIXED {
            scan.allow_mixed = true;
        }

        if let Some(id) = extmap_id(line) {
            match scan.max {
                Some((max, _)) if id <= max => {}
                _ => scan.max = Some((id, index)),
            }
        }
    }

    scan
}
