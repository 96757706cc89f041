//! Per-call control loop
//!
//! One task per call drains the event channels of both endpoints. Candidates
//! are relayed to the opposite endpoint in the order they were gathered,
//! remote tracks are routed to the sinks, and the capture-time poller is
//! (re)armed once the answering endpoint has both receivers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use loopcall_sdp_core::parse_candidate;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{PeerConnection, PeerEvent, RtpReceiver};
use crate::events::SessionEvent;
use crate::sinks::RemoteSinks;
use crate::stats::CaptureTimePoller;
use crate::types::{EndpointId, IceCandidate, MediaKind, MediaTrack, StreamId};

/// State owned by the control task of one call
pub(crate) struct ControlLoop {
    pc1: Arc<dyn PeerConnection>,
    pc2: Arc<dyn PeerConnection>,
    events: broadcast::Sender<SessionEvent>,
    stats_interval: Duration,
    started_at: Instant,
    sinks: RemoteSinks,
    poller: Option<CaptureTimePoller>,
    setup_reported: bool,
    token: CancellationToken,
}

impl ControlLoop {
    pub(crate) fn new(
        pc1: Arc<dyn PeerConnection>,
        pc2: Arc<dyn PeerConnection>,
        events: broadcast::Sender<SessionEvent>,
        stats_interval: Duration,
        started_at: Instant,
        token: CancellationToken,
    ) -> Self {
        Self {
            pc1,
            pc2,
            events,
            stats_interval,
            started_at,
            sinks: RemoteSinks::new(),
            poller: None,
            setup_reported: false,
            token,
        }
    }

    /// Drain both endpoint channels until cancelled or both are closed
    pub(crate) async fn run(
        mut self,
        mut pc1_events: mpsc::Receiver<PeerEvent>,
        mut pc2_events: mpsc::Receiver<PeerEvent>,
    ) {
        info!("Call control loop started");

        let token = self.token.clone();
        let mut pc1_open = true;
        let mut pc2_open = true;

        while pc1_open || pc2_open {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                event = pc1_events.recv(), if pc1_open => match event {
                    Some(event) => self.handle_event(EndpointId::Pc1, event).await,
                    None => pc1_open = false,
                },
                event = pc2_events.recv(), if pc2_open => match event {
                    Some(event) => self.handle_event(EndpointId::Pc2, event).await,
                    None => pc2_open = false,
                },
            }
        }

        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
        info!("Call control loop ended");
    }

    async fn handle_event(&mut self, from: EndpointId, event: PeerEvent) {
        match event {
            PeerEvent::IceCandidate(candidate) => self.relay_candidate(from, candidate).await,
            PeerEvent::IceConnectionStateChange(state) => {
                info!("{} ICE state: {}", from, state);
                self.emit(SessionEvent::IceStateChanged { endpoint: from, state });
            }
            PeerEvent::Track { track, streams } => self.on_track(from, track, streams),
            PeerEvent::VideoResized { width, height } => self.on_video_resized(from, width, height),
        }
    }

    async fn relay_candidate(&mut self, from: EndpointId, candidate: Option<IceCandidate>) {
        let target = self.endpoint(from.peer());

        if let Some(c) = &candidate {
            match parse_candidate(&c.candidate) {
                Ok(attr) => debug!(
                    "{} ICE candidate: {} {}:{} typ {}",
                    from, attr.transport, attr.connection_address, attr.port, attr.candidate_type
                ),
                Err(e) => debug!("{} ICE candidate not parsed ({}): {}", from, e, c.candidate),
            }
        } else {
            debug!("{} ICE candidate gathering complete", from);
        }

        match target.add_ice_candidate(candidate.as_ref()).await {
            Ok(()) => {
                debug!("{} addIceCandidate success", from.peer());
                self.emit(SessionEvent::CandidateRelayed {
                    from,
                    candidate: candidate.map(|c| c.candidate),
                });
            }
            Err(e) => {
                warn!("{} failed to add ICE Candidate: {}", from.peer(), e);
                self.emit(SessionEvent::CandidateRelayFailed {
                    from,
                    message: e.to_string(),
                });
            }
        }
    }

    fn on_track(&mut self, from: EndpointId, track: MediaTrack, streams: Vec<StreamId>) {
        if from != EndpointId::Pc2 {
            debug!("Ignoring {} track on {}", track.kind, from);
            return;
        }
        let Some(stream) = streams.first() else {
            debug!("{} track {} has no stream, ignoring", track.kind, track.id);
            return;
        };
        if !self.sinks.attach(track.kind, stream) {
            return;
        }

        info!("pc2 received remote {} stream {}", track.kind, stream);
        self.emit(SessionEvent::RemoteStreamAttached {
            kind: track.kind,
            stream_id: stream.clone(),
        });

        let receivers = self.pc2.receivers();
        if receivers.len() == 2 {
            self.arm_poller(&receivers);
        }
    }

    fn arm_poller(&mut self, receivers: &[Arc<dyn RtpReceiver>]) {
        let find = |kind: MediaKind| receivers.iter().find(|r| r.kind() == kind).cloned();
        let (Some(audio), Some(video)) = (find(MediaKind::Audio), find(MediaKind::Video)) else {
            debug!("pc2 receivers are not one audio and one video, capture times not polled");
            return;
        };

        if let Some(previous) = self.poller.take() {
            previous.stop();
        }
        debug!("Polling capture times every {:?}", self.stats_interval);
        self.poller = Some(CaptureTimePoller::start(
            audio,
            video,
            self.stats_interval,
            self.events.clone(),
            &self.token,
        ));
    }

    fn on_video_resized(&mut self, from: EndpointId, width: u32, height: u32) {
        if from != EndpointId::Pc2 {
            return;
        }
        info!("Remote video size changed to {}x{}", width, height);

        if !self.setup_reported {
            self.setup_reported = true;
            let elapsed = self.started_at.elapsed();
            info!("Setup time: {:.3}ms", elapsed.as_secs_f64() * 1000.0);
            self.emit(SessionEvent::SetupCompleted { elapsed });
        }
    }

    fn endpoint(&self, id: EndpointId) -> &Arc<dyn PeerConnection> {
        match id {
            EndpointId::Pc1 => &self.pc1,
            EndpointId::Pc2 => &self.pc2,
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }
}
