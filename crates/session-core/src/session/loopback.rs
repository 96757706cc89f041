//! Loopback call between two local endpoints

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use loopcall_infra_common::tasks::ScopedTask;
use loopcall_sdp_core::add_header_extension_with_report;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::control::ControlLoop;
use crate::config::SessionConfig;
use crate::engine::{MediaSource, PeerConnection, PeerConnectionFactory};
use crate::errors::{Result, SessionError};
use crate::events::{DescriptionSide, NegotiationStage, SessionEvent};
use crate::types::{EndpointId, LocalStream, MediaKind, SessionDescription, StreamId};

const CONTROL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of a [`LoopbackSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No local media yet
    Idle,
    /// Local media acquired, no call
    Ready,
    InCall,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::InCall => write!(f, "in call"),
        }
    }
}

/// Resources that live exactly as long as one call
struct ActiveCall {
    pc1: Arc<dyn PeerConnection>,
    pc2: Arc<dyn PeerConnection>,
    control: ScopedTask,
    delay_hint_applied: bool,
}

/// Two local endpoints negotiating with each other
///
/// `pc1` captures and sends local media, `pc2` receives it. The offer from
/// `pc1` is augmented with the configured header extension before it is
/// applied on either side.
pub struct LoopbackSession {
    config: SessionConfig,
    factory: Arc<dyn PeerConnectionFactory>,
    media: Arc<dyn MediaSource>,
    events: broadcast::Sender<SessionEvent>,
    state: SessionState,
    local_stream: Option<LocalStream>,
    call: Option<ActiveCall>,
}

impl LoopbackSession {
    /// Create a session in the idle state
    pub fn new(
        config: SessionConfig,
        factory: Arc<dyn PeerConnectionFactory>,
        media: Arc<dyn MediaSource>,
    ) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_channel_capacity);

        Ok(Self {
            config,
            factory,
            media,
            events,
            state: SessionState::Idle,
            local_stream: None,
            call: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn local_stream(&self) -> Option<&LocalStream> {
        self.local_stream.as_ref()
    }

    /// Receive session events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Acquire local media
    pub async fn start(&mut self) -> Result<()> {
        self.ensure_state("start", SessionState::Idle)?;

        info!("Requesting local stream");
        let stream = self.media.acquire(&self.config.media).await.map_err(|e| {
            warn!("Local media acquisition failed: {}", e);
            match e {
                SessionError::MediaAcquisition { .. } => e,
                other => SessionError::media_acquisition(other.to_string()),
            }
        })?;

        info!("Received local stream {}", stream.id);
        self.emit(SessionEvent::LocalStreamReady {
            stream_id: stream.id.clone(),
            tracks: stream.tracks.clone(),
        });
        self.local_stream = Some(stream);
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Create both endpoints and run offer/answer between them
    pub async fn call(&mut self) -> Result<()> {
        self.ensure_state("call", SessionState::Ready)?;
        let Some(stream) = self.local_stream.clone() else {
            return Err(SessionError::invalid_state("call", "no local stream is held"));
        };

        info!("Starting call");
        let started_at = Instant::now();
        for kind in MediaKind::ALL {
            if let Some(track) = stream.track(kind) {
                info!("Using {} device: {}", kind, track.label);
            }
        }

        let rtc = self.config.rtc_configuration();
        info!("RTCPeerConnection configuration: {:?}", rtc);

        let (pc1, pc1_events) = self.factory.create(EndpointId::Pc1, &rtc).await?;
        info!("Created local peer connection object pc1");
        let (pc2, pc2_events) = match self.factory.create(EndpointId::Pc2, &rtc).await {
            Ok(created) => created,
            Err(e) => {
                pc1.close().await;
                return Err(e);
            }
        };
        info!("Created remote peer connection object pc2");

        // One stream per track so the receiver does not group audio and
        // video for lip sync
        for track in &stream.tracks {
            let stream_id = StreamId::generate();
            if let Err(e) = pc1.add_track(track, &stream_id).await {
                warn!("Failed to add {} track to pc1: {}", track.kind, e);
                pc1.close().await;
                pc2.close().await;
                return Err(e);
            }
            debug!("Added {} track {} to pc1 as stream {}", track.kind, track.id, stream_id);
        }

        let control = {
            let (pc1, pc2) = (pc1.clone(), pc2.clone());
            let events = self.events.clone();
            let stats_interval = self.config.stats_interval();
            ScopedTask::spawn("call-control", move |token| {
                ControlLoop::new(pc1, pc2, events, stats_interval, started_at, token)
                    .run(pc1_events, pc2_events)
            })
        };

        self.call = Some(ActiveCall {
            pc1: pc1.clone(),
            pc2: pc2.clone(),
            control,
            delay_hint_applied: false,
        });
        self.state = SessionState::InCall;
        self.emit(SessionEvent::CallStarted);

        if let Err(e) = self.negotiate(&pc1, &pc2).await {
            self.end_call().await;
            return Err(e);
        }
        Ok(())
    }

    /// Apply the configured delay hints to the audio receiver of `pc2`
    ///
    /// Only the first successful application per call has an effect.
    /// Returns whether the hints were applied now.
    pub fn apply_delay_hint(&mut self) -> Result<bool> {
        let hint = self.config.delay_hint;
        let Some(call) = self.call.as_mut() else {
            return Err(SessionError::invalid_state("apply delay hint", self.state));
        };
        if call.delay_hint_applied {
            debug!("Delay hint already applied for this call");
            return Ok(false);
        }

        let Some(audio) = call
            .pc2
            .receivers()
            .into_iter()
            .find(|r| r.kind() == MediaKind::Audio)
        else {
            debug!("pc2 has no audio receiver yet, delay hint not applied");
            return Ok(false);
        };

        audio.set_jitter_buffer_delay_hint(hint.jitter_buffer_s);
        audio.set_playout_delay_hint(hint.playout_s);
        call.delay_hint_applied = true;

        info!(
            "Applied delay hint to pc2 audio receiver: jitter buffer {} s, playout {} s",
            hint.jitter_buffer_s, hint.playout_s
        );
        self.emit(SessionEvent::DelayHintApplied {
            jitter_buffer_s: hint.jitter_buffer_s,
            playout_s: hint.playout_s,
        });
        Ok(true)
    }

    /// End the current call and return to the ready state
    pub async fn hangup(&mut self) -> Result<()> {
        self.ensure_state("hang up", SessionState::InCall)?;
        info!("Ending call");
        self.end_call().await;
        Ok(())
    }

    async fn negotiate(&self, pc1: &Arc<dyn PeerConnection>, pc2: &Arc<dyn PeerConnection>) -> Result<()> {
        debug!("pc1 createOffer start");
        let offer = pc1
            .create_offer(&self.config.offer)
            .await
            .map_err(|e| self.negotiation_failed(EndpointId::Pc1, NegotiationStage::CreateOffer, e))?;

        let offer = self.augment_offer(offer);
        debug!("Offer from pc1\n{}", offer.sdp);

        self.apply_description(pc1, DescriptionSide::Local, &offer).await;
        self.apply_description(pc2, DescriptionSide::Remote, &offer).await;

        debug!("pc2 createAnswer start");
        let answer = pc2
            .create_answer()
            .await
            .map_err(|e| self.negotiation_failed(EndpointId::Pc2, NegotiationStage::CreateAnswer, e))?;
        debug!("Answer from pc2\n{}", answer.sdp);

        self.apply_description(pc2, DescriptionSide::Local, &answer).await;
        self.apply_description(pc1, DescriptionSide::Remote, &answer).await;
        Ok(())
    }

    fn augment_offer(&self, mut offer: SessionDescription) -> SessionDescription {
        if let Some(uri) = &self.config.header_extension_uri {
            let (sdp, report) = add_header_extension_with_report(&offer.sdp, uri);
            for added in &report {
                debug!("Offer {} section gained extmap {} for {}", added.kind, added.assigned_id, uri);
                self.emit(SessionEvent::HeaderExtensionAdded {
                    kind: added.kind,
                    id: added.assigned_id,
                    allow_mixed_inserted: added.allow_mixed_inserted,
                });
            }
            offer.sdp = sdp;
        }

        self.emit(SessionEvent::OfferCreated {
            sdp: offer.sdp.clone(),
        });
        offer
    }

    /// Apply a description, reporting but not propagating failures
    async fn apply_description(
        &self,
        pc: &Arc<dyn PeerConnection>,
        side: DescriptionSide,
        description: &SessionDescription,
    ) {
        let endpoint = pc.endpoint();
        debug!("{} {} start", endpoint, side.stage());

        let result = match side {
            DescriptionSide::Local => pc.set_local_description(description).await,
            DescriptionSide::Remote => pc.set_remote_description(description).await,
        };

        match result {
            Ok(()) => {
                debug!("{} {} complete", endpoint, side.stage());
                self.emit(SessionEvent::DescriptionApplied {
                    endpoint,
                    side,
                    sdp_type: description.sdp_type,
                });
            }
            Err(e) => {
                warn!("Failed to set session description on {}: {}", endpoint, e);
                self.emit(SessionEvent::NegotiationFailed {
                    endpoint,
                    stage: side.stage(),
                    message: e.to_string(),
                });
            }
        }
    }

    fn negotiation_failed(&self, endpoint: EndpointId, stage: NegotiationStage, error: SessionError) -> SessionError {
        warn!("Failed to {} on {}: {}", stage, endpoint, error);
        let message = error.to_string();
        self.emit(SessionEvent::NegotiationFailed {
            endpoint,
            stage,
            message: message.clone(),
        });
        SessionError::Negotiation {
            endpoint,
            stage,
            message,
        }
    }

    async fn end_call(&mut self) {
        let Some(call) = self.call.take() else {
            return;
        };

        if let Err(e) = call.control.shutdown(CONTROL_SHUTDOWN_TIMEOUT).await {
            warn!("Call control loop did not stop cleanly: {}", e);
        }
        call.pc1.close().await;
        call.pc2.close().await;

        self.state = SessionState::Ready;
        self.emit(SessionEvent::CallEnded);
    }

    fn ensure_state(&self, operation: &str, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::invalid_state(operation, self.state))
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

impl fmt::Debug for LoopbackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackSession")
            .field("state", &self.state)
            .field("local_stream", &self.local_stream)
            .field("in_call", &self.call.is_some())
            .finish()
    }
}
