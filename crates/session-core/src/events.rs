//! Session events published to observers

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stats::CaptureTimeSample;
use crate::types::{EndpointId, IceConnectionState, MediaKind, MediaTrack, SdpType, StreamId};

/// Offer/answer step that can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NegotiationStage {
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
}

impl fmt::Display for NegotiationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NegotiationStage::CreateOffer => "createOffer",
            NegotiationStage::CreateAnswer => "createAnswer",
            NegotiationStage::SetLocalDescription => "setLocalDescription",
            NegotiationStage::SetRemoteDescription => "setRemoteDescription",
        };
        f.write_str(s)
    }
}

/// Which side a description was applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptionSide {
    Local,
    Remote,
}

impl DescriptionSide {
    pub fn stage(self) -> NegotiationStage {
        match self {
            DescriptionSide::Local => NegotiationStage::SetLocalDescription,
            DescriptionSide::Remote => NegotiationStage::SetRemoteDescription,
        }
    }
}

/// Observable session events
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Local capture succeeded
    LocalStreamReady {
        stream_id: StreamId,
        tracks: Vec<MediaTrack>,
    },
    CallStarted,
    /// Offer after header-extension augmentation
    OfferCreated { sdp: String },
    /// A header extension mapping was added to the offer
    HeaderExtensionAdded {
        kind: MediaKind,
        id: u32,
        allow_mixed_inserted: bool,
    },
    DescriptionApplied {
        endpoint: EndpointId,
        side: DescriptionSide,
        sdp_type: SdpType,
    },
    NegotiationFailed {
        endpoint: EndpointId,
        stage: NegotiationStage,
        message: String,
    },
    /// Candidate from `from` was applied on its peer
    CandidateRelayed {
        from: EndpointId,
        candidate: Option<String>,
    },
    CandidateRelayFailed { from: EndpointId, message: String },
    IceStateChanged {
        endpoint: EndpointId,
        state: IceConnectionState,
    },
    /// A remote stream was routed to the sink for its kind
    RemoteStreamAttached { kind: MediaKind, stream_id: StreamId },
    /// First remote video frame size known
    SetupCompleted { elapsed: Duration },
    CaptureTimes(CaptureTimeSample),
    DelayHintApplied { jitter_buffer_s: f64, playout_s: f64 },
    CallEnded,
}
