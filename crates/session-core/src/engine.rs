//! Negotiation engine seams
//!
//! The session never talks to a media stack directly. Endpoint creation,
//! offer/answer, candidate gathering and media capture are provided by an
//! engine through these traits, and asynchronous notifications arrive on the
//! per-endpoint [`PeerEvent`] channel returned by the factory.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::Result;
use crate::types::{
    EndpointId, IceCandidate, IceConnectionState, LocalStream, MediaConstraints, MediaKind,
    MediaTrack, OfferOptions, RtcConfiguration, SessionDescription, StreamId,
    SynchronizationSource,
};

/// Notification emitted by an endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// Locally gathered candidate, `None` marks the end of gathering
    IceCandidate(Option<IceCandidate>),
    IceConnectionStateChange(IceConnectionState),
    /// A remote track became available
    Track {
        track: MediaTrack,
        streams: Vec<StreamId>,
    },
    /// The rendered remote video changed size
    VideoResized { width: u32, height: u32 },
}

/// Creates endpoints and their event channels
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        endpoint: EndpointId,
        config: &RtcConfiguration,
    ) -> Result<(Arc<dyn PeerConnection>, mpsc::Receiver<PeerEvent>)>;
}

/// One negotiation endpoint
#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn endpoint(&self) -> EndpointId;

    async fn create_offer(&self, options: &OfferOptions) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: &SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()>;

    /// Apply a remote candidate, `None` signals end of candidates
    async fn add_ice_candidate(&self, candidate: Option<&IceCandidate>) -> Result<()>;

    async fn add_track(&self, track: &MediaTrack, stream: &StreamId) -> Result<()>;

    fn receivers(&self) -> Vec<Arc<dyn RtpReceiver>>;

    fn ice_connection_state(&self) -> IceConnectionState;

    async fn close(&self);
}

/// Receiving side of one remote track
pub trait RtpReceiver: Send + Sync {
    fn kind(&self) -> MediaKind;

    fn synchronization_sources(&self) -> Vec<SynchronizationSource>;

    fn set_jitter_buffer_delay_hint(&self, seconds: f64);

    fn set_playout_delay_hint(&self, seconds: f64);
}

/// Local capture device access
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalStream>;
}
