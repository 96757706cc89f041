//! SDP generation and inspection for the simulated engine

use loopcall_sdp_core::{parse_extmap, ExtMap, MediaKind, SdpLines, EXTMAP_ALLOW_MIXED};

use crate::types::StreamId;

/// Media direction attribute of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    fn from_line(line: &str) -> Option<Self> {
        match line {
            "a=sendrecv" => Some(Direction::SendRecv),
            "a=sendonly" => Some(Direction::SendOnly),
            "a=recvonly" => Some(Direction::RecvOnly),
            "a=inactive" => Some(Direction::Inactive),
            _ => None,
        }
    }

    fn as_line(self) -> &'static str {
        match self {
            Direction::SendRecv => "a=sendrecv",
            Direction::SendOnly => "a=sendonly",
            Direction::RecvOnly => "a=recvonly",
            Direction::Inactive => "a=inactive",
        }
    }

    /// Whether the side that wrote this direction sends media
    pub(crate) fn sends(self) -> bool {
        matches!(self, Direction::SendRecv | Direction::SendOnly)
    }

    /// Direction to answer an offered direction with (RFC 3264 §6.1)
    pub(crate) fn answer(self, has_track: bool) -> Self {
        match (self, has_track) {
            (Direction::SendRecv, true) => Direction::SendRecv,
            (Direction::SendRecv, false) => Direction::RecvOnly,
            (Direction::SendOnly, _) => Direction::RecvOnly,
            (Direction::RecvOnly, true) => Direction::SendOnly,
            (Direction::RecvOnly, false) | (Direction::Inactive, _) => Direction::Inactive,
        }
    }
}

/// The parts of a media section the simulated engine cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SectionInfo {
    pub kind: MediaKind,
    pub mid: String,
    pub direction: Direction,
    /// Stream id and track id from `a=msid`
    pub msid: Option<(StreamId, String)>,
    pub extmaps: Vec<ExtMap>,
    pub allow_mixed: bool,
}

impl SectionInfo {
    pub(crate) fn has_extension(&self, uri: &str) -> bool {
        self.extmaps.iter().any(|e| e.uri == uri)
    }
}

/// Transport parameters shared by all sections of one description
#[derive(Debug, Clone)]
pub(crate) struct SessionParams {
    pub session_id: u64,
    pub version: u32,
    pub ice_ufrag: String,
    pub ice_pwd: String,
}

/// Header extensions offered by default, in offer order
pub(crate) fn default_extensions(kind: MediaKind) -> Vec<ExtMap> {
    match kind {
        MediaKind::Audio => vec![
            ExtMap::new(1, "urn:ietf:params:rtp-hdrext:ssrc-audio-level"),
            ExtMap::new(2, "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time"),
            ExtMap::new(3, "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01"),
            ExtMap::new(4, "urn:ietf:params:rtp-hdrext:sdes:mid"),
        ],
        MediaKind::Video => vec![
            ExtMap::new(14, "urn:ietf:params:rtp-hdrext:toffset"),
            ExtMap::new(2, "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time"),
            ExtMap::new(13, "urn:3gpp:video-orientation"),
            ExtMap::new(3, "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01"),
            ExtMap::new(4, "urn:ietf:params:rtp-hdrext:sdes:mid"),
        ],
    }
}

fn codec(kind: MediaKind) -> (u8, &'static str) {
    match kind {
        MediaKind::Audio => (111, "opus/48000/2"),
        MediaKind::Video => (96, "VP8/90000"),
    }
}

/// Render a complete description
pub(crate) fn render(params: &SessionParams, sections: &[SectionInfo]) -> String {
    let mids: Vec<&str> = sections.iter().map(|s| s.mid.as_str()).collect();
    let mut lines = vec![
        "v=0".to_string(),
        format!("o=- {} {} IN IP4 127.0.0.1", params.session_id, params.version),
        "s=-".to_string(),
        "t=0 0".to_string(),
        format!("a=group:BUNDLE {}", mids.join(" ")),
        "a=msid-semantic: WMS".to_string(),
    ];

    for section in sections {
        let (pt, encoding) = codec(section.kind);
        lines.push(format!("m={} 9 UDP/TLS/RTP/SAVPF {}", section.kind, pt));
        lines.push("c=IN IP4 0.0.0.0".to_string());
        lines.push("a=rtcp:9 IN IP4 0.0.0.0".to_string());
        lines.push(format!("a=ice-ufrag:{}", params.ice_ufrag));
        lines.push(format!("a=ice-pwd:{}", params.ice_pwd));
        lines.push(format!("a=mid:{}", section.mid));
        if section.allow_mixed {
            lines.push(EXTMAP_ALLOW_MIXED.to_string());
        }
        lines.extend(section.extmaps.iter().map(ToString::to_string));
        lines.push(section.direction.as_line().to_string());
        if let Some((stream, track)) = &section.msid {
            lines.push(format!("a=msid:{} {}", stream, track));
        }
        lines.push("a=rtcp-mux".to_string());
        lines.push(format!("a=rtpmap:{} {}", pt, encoding));
    }

    lines.push(String::new());
    lines.join("\r\n")
}

/// Audio and video sections of a description, in order
pub(crate) fn parse_sections(sdp: &str) -> Vec<SectionInfo> {
    let lines = SdpLines::parse(sdp);

    lines
        .media_sections()
        .into_iter()
        .filter_map(|section| {
            let kind: MediaKind = section.media.parse().ok()?;
            let mut info = SectionInfo {
                kind,
                mid: String::new(),
                direction: Direction::SendRecv,
                msid: None,
                extmaps: Vec::new(),
                allow_mixed: false,
            };

            for line in section.body().filter_map(|i| lines.get(i)) {
                if let Some(mid) = line.strip_prefix("a=mid:") {
                    info.mid = mid.to_string();
                } else if let Some(direction) = Direction::from_line(line) {
                    info.direction = direction;
                } else if let Some(msid) = line.strip_prefix("a=msid:") {
                    if let Some((stream, track)) = msid.split_once(' ') {
                        info.msid = Some((StreamId::from(stream), track.to_string()));
                    }
                } else if line == EXTMAP_ALLOW_MIXED {
                    info.allow_mixed = true;
                } else if line.starts_with("a=extmap:") {
                    if let Ok(extmap) = parse_extmap(line) {
                        info.extmaps.push(extmap);
                    }
                }
            }

            Some(info)
        })
        .collect()
}
