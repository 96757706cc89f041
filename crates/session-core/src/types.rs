//! Value types exchanged with the negotiation engine

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use loopcall_sdp_core::MediaKind;

/// One of the two local endpoints of a loopback call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointId {
    /// Offering endpoint, owns the local tracks
    Pc1,
    /// Answering endpoint, renders the remote tracks
    Pc2,
}

impl EndpointId {
    /// The endpoint on the other end of the loopback
    pub fn peer(self) -> Self {
        match self {
            EndpointId::Pc1 => EndpointId::Pc2,
            EndpointId::Pc2 => EndpointId::Pc1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointId::Pc1 => "pc1",
            EndpointId::Pc2 => "pc2",
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpType::Offer => write!(f, "offer"),
            SdpType::Answer => write!(f, "answer"),
        }
    }
}

/// A typed SDP body as produced by offer or answer creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A trickled ICE candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// `candidate:` attribute value
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>, sdp_mid: Option<String>, sdp_m_line_index: Option<u16>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid,
            sdp_m_line_index,
        }
    }
}

/// ICE connection state as reported by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

impl fmt::Display for IceConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IceConnectionState::New => "new",
            IceConnectionState::Checking => "checking",
            IceConnectionState::Connected => "connected",
            IceConnectionState::Completed => "completed",
            IceConnectionState::Failed => "failed",
            IceConnectionState::Disconnected => "disconnected",
            IceConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Identifier of a media stream grouping tracks
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub String);

impl StreamId {
    /// Create a new random stream id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single audio or video track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTrack {
    pub id: String,
    pub kind: MediaKind,
    /// Human readable device label
    pub label: String,
}

impl MediaTrack {
    pub fn new(kind: MediaKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
        }
    }
}

/// Local capture result holding the tracks to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStream {
    pub id: StreamId,
    pub tracks: Vec<MediaTrack>,
}

impl LocalStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: StreamId::generate(),
            tracks,
        }
    }

    /// First track of the given kind
    pub fn track(&self, kind: MediaKind) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind == kind)
    }

    pub fn audio_track(&self) -> Option<&MediaTrack> {
        self.track(MediaKind::Audio)
    }

    pub fn video_track(&self) -> Option<&MediaTrack> {
        self.track(MediaKind::Video)
    }
}

/// Contributing or synchronization source of a receiver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynchronizationSource {
    pub source: u32,
    /// Wall clock time the last packet was received, in milliseconds
    pub timestamp_ms: f64,
    /// Sender capture time from the abs-capture-time extension, in milliseconds
    pub capture_timestamp_ms: Option<f64>,
}

/// Options for offer creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfferOptions {
    pub offer_to_receive_audio: bool,
    pub offer_to_receive_video: bool,
}

impl Default for OfferOptions {
    fn default() -> Self {
        Self {
            offer_to_receive_audio: true,
            offer_to_receive_video: true,
        }
    }
}

impl OfferOptions {
    /// Whether a receive slot for `kind` is requested
    pub fn receives(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.offer_to_receive_audio,
            MediaKind::Video => self.offer_to_receive_video,
        }
    }
}

/// SDP dialect requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SdpSemantics {
    UnifiedPlan,
    PlanB,
}

impl fmt::Display for SdpSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpSemantics::UnifiedPlan => write!(f, "unified-plan"),
            SdpSemantics::PlanB => write!(f, "plan-b"),
        }
    }
}

/// Configuration handed to the engine when creating an endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtcConfiguration {
    pub sdp_semantics: Option<SdpSemantics>,
}

/// Which kinds of local media to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

impl MediaConstraints {
    pub fn wants(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.audio,
            MediaKind::Video => self.video,
        }
    }
}

/// Receiver-side delay hints, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayHint {
    pub jitter_buffer_s: f64,
    pub playout_s: f64,
}

impl Default for DelayHint {
    fn default() -> Self {
        Self {
            jitter_buffer_s: 2.0,
            playout_s: 2.0,
        }
    }
}
