//! In-process negotiation engine
//!
//! Behaves enough like a browser engine to drive a [`LoopbackSession`]
//! end to end without sockets or codecs: descriptions are generated and
//! inspected as SDP text, candidates are trickled through the endpoint event
//! channel, and receivers report capture timestamps only when the
//! abs-capture-time extension was negotiated on both sides.
//!
//! [`LoopbackSession`]: crate::LoopbackSession

mod media;
mod peer;
mod sdp;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

pub use media::SimulatedMediaSource;
pub use peer::{SimulatedPeer, SimulatedReceiver};

use crate::engine::{PeerConnection, PeerConnectionFactory, PeerEvent};
use crate::errors::Result;
use crate::types::{EndpointId, RtcConfiguration};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Behaviour knobs of the simulated engine
#[derive(Debug, Clone)]
pub struct SimulatedOptions {
    /// Host candidates gathered per endpoint
    pub host_candidates: usize,
    /// Whether answers keep the abs-capture-time extension
    pub abs_capture_time_supported: bool,
    pub video_size: (u32, u32),
    /// Extra capture-to-receive latency of video over audio
    pub video_capture_lag_ms: f64,
    pub fail_create_offer: bool,
    pub fail_create_answer: bool,
    pub fail_set_remote_on: Option<EndpointId>,
    pub fail_add_candidate_on: Option<EndpointId>,
}

impl Default for SimulatedOptions {
    fn default() -> Self {
        Self {
            host_candidates: 2,
            abs_capture_time_supported: true,
            video_size: (640, 480),
            video_capture_lag_ms: 40.0,
            fail_create_offer: false,
            fail_create_answer: false,
            fail_set_remote_on: None,
            fail_add_candidate_on: None,
        }
    }
}

/// Factory for [`SimulatedPeer`] endpoints
///
/// Created endpoints stay reachable through [`SimulatedEngine::peer`] so
/// callers can inspect what was negotiated.
#[derive(Debug, Clone, Default)]
pub struct SimulatedEngine {
    options: SimulatedOptions,
    peers: Arc<Mutex<Vec<Arc<SimulatedPeer>>>>,
}

impl SimulatedEngine {
    pub fn new(options: SimulatedOptions) -> Self {
        Self {
            options,
            peers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Most recently created endpoint with the given id
    pub fn peer(&self, endpoint: EndpointId) -> Option<Arc<SimulatedPeer>> {
        self.peers
            .lock()
            .iter()
            .rev()
            .find(|p| p.endpoint() == endpoint)
            .cloned()
    }

    /// Number of endpoints created so far
    pub fn created(&self) -> usize {
        self.peers.lock().len()
    }
}

#[async_trait]
impl PeerConnectionFactory for SimulatedEngine {
    async fn create(
        &self,
        endpoint: EndpointId,
        config: &RtcConfiguration,
    ) -> Result<(Arc<dyn PeerConnection>, mpsc::Receiver<PeerEvent>)> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let peer = Arc::new(SimulatedPeer::new(endpoint, self.options.clone(), config.clone(), tx));
        debug!("Simulated engine created {} with {:?}", endpoint, config);

        self.peers.lock().push(peer.clone());
        let peer: Arc<dyn PeerConnection> = peer;
        Ok((peer, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RtpReceiver;
    use crate::types::{IceConnectionState, MediaKind, MediaTrack, OfferOptions, StreamId};
    use loopcall_sdp_core::{add_header_extension, ABS_CAPTURE_TIME_URI};

    async fn pair(
        engine: &SimulatedEngine,
    ) -> (
        Arc<dyn PeerConnection>,
        mpsc::Receiver<PeerEvent>,
        Arc<dyn PeerConnection>,
        mpsc::Receiver<PeerEvent>,
    ) {
        let config = RtcConfiguration::default();
        let (pc1, rx1) = engine.create(EndpointId::Pc1, &config).await.unwrap();
        let (pc2, rx2) = engine.create(EndpointId::Pc2, &config).await.unwrap();
        for kind in MediaKind::ALL {
            pc1.add_track(&MediaTrack::new(kind, "device"), &StreamId::generate())
                .await
                .unwrap();
        }
        (pc1, rx1, pc2, rx2)
    }

    fn drain(rx: &mut mpsc::Receiver<PeerEvent>) -> Vec<PeerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn negotiate(pc1: &Arc<dyn PeerConnection>, pc2: &Arc<dyn PeerConnection>, munge: bool) {
        let mut offer = pc1.create_offer(&OfferOptions::default()).await.unwrap();
        if munge {
            offer.sdp = add_header_extension(&offer.sdp, ABS_CAPTURE_TIME_URI);
        }
        pc1.set_local_description(&offer).await.unwrap();
        pc2.set_remote_description(&offer).await.unwrap();
        let answer = pc2.create_answer().await.unwrap();
        pc2.set_local_description(&answer).await.unwrap();
        pc1.set_remote_description(&answer).await.unwrap();
    }

    #[tokio::test]
    async fn test_offer_carries_tracks_and_extensions() {
        let engine = SimulatedEngine::default();
        let (pc1, _rx1, _pc2, _rx2) = pair(&engine).await;

        let offer = pc1.create_offer(&OfferOptions::default()).await.unwrap();
        assert_eq!(offer.sdp.matches("a=msid:").count(), 2);
        assert!(offer.sdp.contains("m=audio "));
        assert!(offer.sdp.contains("a=extmap:14 urn:ietf:params:rtp-hdrext:toffset"));
        assert!(!offer.sdp.contains(ABS_CAPTURE_TIME_URI));
    }

    #[tokio::test]
    async fn test_answer_requires_remote_offer() {
        let engine = SimulatedEngine::default();
        let (_pc1, _rx1, pc2, _rx2) = pair(&engine).await;
        assert!(pc2.create_answer().await.is_err());
    }

    #[tokio::test]
    async fn test_negotiation_produces_receivers_and_events() {
        let engine = SimulatedEngine::default();
        let (pc1, mut rx1, pc2, mut rx2) = pair(&engine).await;
        negotiate(&pc1, &pc2, true).await;

        let pc1_events = drain(&mut rx1);
        let candidates: Vec<_> = pc1_events
            .iter()
            .filter_map(|e| match e {
                PeerEvent::IceCandidate(c) => Some(c.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(candidates.len(), 3);
        assert!(candidates[..2].iter().all(Option::is_some));
        assert_eq!(candidates[2], None);

        let pc2_events = drain(&mut rx2);
        let tracks = pc2_events
            .iter()
            .filter(|e| matches!(e, PeerEvent::Track { .. }))
            .count();
        assert_eq!(tracks, 2);
        assert!(pc2_events.contains(&PeerEvent::VideoResized { width: 640, height: 480 }));
        assert!(pc2_events.contains(&PeerEvent::IceConnectionStateChange(IceConnectionState::Checking)));

        let receivers = pc2.receivers();
        assert_eq!(receivers.len(), 2);
        for receiver in &receivers {
            let sources = receiver.synchronization_sources();
            assert!(sources[0].capture_timestamp_ms.is_some(), "{} has capture time", receiver.kind());
        }
        assert!(pc1.receivers().is_empty());
    }

    #[tokio::test]
    async fn test_capture_time_needs_munged_offer() {
        let engine = SimulatedEngine::default();
        let (pc1, _rx1, pc2, _rx2) = pair(&engine).await;
        negotiate(&pc1, &pc2, false).await;

        let receivers = pc2.receivers();
        assert_eq!(receivers.len(), 2);
        assert!(receivers
            .iter()
            .all(|r| r.synchronization_sources()[0].capture_timestamp_ms.is_none()));
    }

    #[tokio::test]
    async fn test_capture_time_needs_answer_support() {
        let engine = SimulatedEngine::new(SimulatedOptions {
            abs_capture_time_supported: false,
            ..Default::default()
        });
        let (pc1, _rx1, pc2, _rx2) = pair(&engine).await;
        negotiate(&pc1, &pc2, true).await;

        let simulated_pc2 = engine.peer(EndpointId::Pc2).unwrap();
        let answer = simulated_pc2.local_description().unwrap();
        assert!(!answer.sdp.contains(ABS_CAPTURE_TIME_URI));
        assert!(simulated_pc2
            .simulated_receivers()
            .iter()
            .all(|r| !r.reports_capture_time()));
    }

    #[tokio::test]
    async fn test_ice_connects_after_remote_candidate() {
        let engine = SimulatedEngine::default();
        let (pc1, _rx1, pc2, mut rx2) = pair(&engine).await;
        negotiate(&pc1, &pc2, true).await;
        drain(&mut rx2);

        let candidate = engine.peer(EndpointId::Pc1).unwrap().host_candidates().remove(0);
        pc2.add_ice_candidate(Some(&candidate)).await.unwrap();

        assert_eq!(pc2.ice_connection_state(), IceConnectionState::Connected);
        assert_eq!(
            drain(&mut rx2),
            vec![PeerEvent::IceConnectionStateChange(IceConnectionState::Connected)]
        );
    }

    #[tokio::test]
    async fn test_closed_peer_rejects_calls() {
        let engine = SimulatedEngine::default();
        let (pc1, _rx1, _pc2, _rx2) = pair(&engine).await;
        pc1.close().await;

        assert!(pc1.create_offer(&OfferOptions::default()).await.is_err());
        assert!(pc1.add_ice_candidate(None).await.is_err());
        assert_eq!(pc1.ice_connection_state(), IceConnectionState::Closed);
        assert!(engine.peer(EndpointId::Pc1).unwrap().is_closed());
        assert_eq!(engine.created(), 2);
    }
}
