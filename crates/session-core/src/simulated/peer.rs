//! In-process endpoint and receiver

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use loopcall_sdp_core::ABS_CAPTURE_TIME_URI;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::sdp::{default_extensions, parse_sections, render, Direction, SectionInfo, SessionParams};
use super::SimulatedOptions;
use crate::engine::{PeerConnection, PeerEvent, RtpReceiver};
use crate::errors::{Result, SessionError};
use crate::types::{
    EndpointId, IceCandidate, IceConnectionState, MediaKind, MediaTrack, OfferOptions,
    RtcConfiguration, SdpType, SessionDescription, StreamId, SynchronizationSource,
};

/// Capture-to-receive latency of the simulated audio path
const AUDIO_LATENCY_MS: f64 = 20.0;

#[derive(Debug)]
struct PeerState {
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    tracks: Vec<(MediaTrack, StreamId)>,
    remote_candidates: Vec<Option<IceCandidate>>,
    receivers: Vec<Arc<SimulatedReceiver>>,
    ice_state: IceConnectionState,
    description_version: u32,
    gathered: bool,
    media_started: bool,
    closed: bool,
}

/// Endpoint of the simulated engine
///
/// Applying a local description "gathers" host candidates; once both
/// descriptions are set, remote tracks from the remote description become
/// receivers and ICE advances as remote candidates arrive.
#[derive(Debug)]
pub struct SimulatedPeer {
    endpoint: EndpointId,
    options: SimulatedOptions,
    configuration: RtcConfiguration,
    params: SessionParams,
    events: mpsc::Sender<PeerEvent>,
    state: Mutex<PeerState>,
}

impl SimulatedPeer {
    pub(crate) fn new(
        endpoint: EndpointId,
        options: SimulatedOptions,
        configuration: RtcConfiguration,
        events: mpsc::Sender<PeerEvent>,
    ) -> Self {
        let params = SessionParams {
            session_id: rand::random::<u64>() >> 1,
            version: 1,
            ice_ufrag: format!("{}{:04x}", endpoint, rand::random::<u16>()),
            ice_pwd: format!("{:032x}", rand::random::<u128>()),
        };

        Self {
            endpoint,
            options,
            configuration,
            params,
            events,
            state: Mutex::new(PeerState {
                local: None,
                remote: None,
                tracks: Vec::new(),
                remote_candidates: Vec::new(),
                receivers: Vec::new(),
                ice_state: IceConnectionState::New,
                description_version: 1,
                gathered: false,
                media_started: false,
                closed: false,
            }),
        }
    }

    pub fn configuration(&self) -> &RtcConfiguration {
        &self.configuration
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.state.lock().local.clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.state.lock().remote.clone()
    }

    /// Remote candidates in the order they were applied
    pub fn applied_candidates(&self) -> Vec<Option<IceCandidate>> {
        self.state.lock().remote_candidates.clone()
    }

    /// Tracks added for sending
    pub fn tracks(&self) -> Vec<(MediaTrack, StreamId)> {
        self.state.lock().tracks.clone()
    }

    pub fn simulated_receivers(&self) -> Vec<Arc<SimulatedReceiver>> {
        self.state.lock().receivers.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Host candidates this endpoint gathers, in emission order
    pub fn host_candidates(&self) -> Vec<IceCandidate> {
        let base_port: u16 = match self.endpoint {
            EndpointId::Pc1 => 50000,
            EndpointId::Pc2 => 51000,
        };
        (0..self.options.host_candidates)
            .map(|i| {
                let port = base_port.saturating_add(u16::try_from(i).unwrap_or(u16::MAX));
                let priority = 2_122_260_223u32.saturating_sub(u32::try_from(i).unwrap_or(u32::MAX));
                IceCandidate::new(
                    format!(
                        "candidate:{} 1 udp {} 127.0.0.1 {} typ host generation 0 ufrag {}",
                        1000 + i,
                        priority,
                        port,
                        self.params.ice_ufrag
                    ),
                    Some("0".to_string()),
                    Some(0),
                )
            })
            .collect()
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.state.lock().closed {
            return Err(SessionError::engine(format!(
                "{} called on closed {}",
                operation, self.endpoint
            )));
        }
        Ok(())
    }

    fn emit(&self, event: PeerEvent) {
        if let Err(e) = self.events.try_send(event) {
            debug!("{} dropped event: {}", self.endpoint, e);
        }
    }

    fn next_params(&self, state: &mut PeerState) -> SessionParams {
        state.description_version += 1;
        SessionParams {
            version: state.description_version,
            ..self.params.clone()
        }
    }

    /// Start media once both descriptions are in place
    fn maybe_start_media(&self) {
        let mut pending = Vec::new();
        {
            let mut state = self.state.lock();
            let (Some(local), Some(remote)) = (&state.local, &state.remote) else {
                return;
            };
            if state.media_started {
                return;
            }

            let local_sections = parse_sections(&local.sdp);
            let remote_sections = parse_sections(&remote.sdp);
            state.media_started = true;

            for remote_section in remote_sections.iter().filter(|s| s.direction.sends()) {
                let Some((stream, track_id)) = &remote_section.msid else {
                    continue;
                };
                let capture_time = remote_section.has_extension(ABS_CAPTURE_TIME_URI)
                    && local_sections
                        .iter()
                        .find(|s| s.mid == remote_section.mid)
                        .is_some_and(|s| s.has_extension(ABS_CAPTURE_TIME_URI));

                let latency_ms = match remote_section.kind {
                    MediaKind::Audio => AUDIO_LATENCY_MS,
                    MediaKind::Video => AUDIO_LATENCY_MS + self.options.video_capture_lag_ms,
                };
                state
                    .receivers
                    .push(Arc::new(SimulatedReceiver::new(remote_section.kind, capture_time, latency_ms)));
                debug!(
                    "{} receiving {} track {} (capture time {})",
                    self.endpoint, remote_section.kind, track_id, capture_time
                );

                pending.push(PeerEvent::Track {
                    track: MediaTrack {
                        id: track_id.clone(),
                        kind: remote_section.kind,
                        label: format!("remote {}", remote_section.kind),
                    },
                    streams: vec![stream.clone()],
                });
            }

            pending.extend(advance_ice(&mut state));

            if state.receivers.iter().any(|r| r.kind() == MediaKind::Video) {
                let (width, height) = self.options.video_size;
                pending.push(PeerEvent::VideoResized { width, height });
            }
        }

        for event in pending {
            self.emit(event);
        }
    }
}

fn advance_ice(state: &mut PeerState) -> Vec<PeerEvent> {
    let mut changes = Vec::new();
    if !state.media_started || state.closed {
        return changes;
    }
    if state.ice_state == IceConnectionState::New {
        state.ice_state = IceConnectionState::Checking;
        changes.push(PeerEvent::IceConnectionStateChange(IceConnectionState::Checking));
    }
    if state.ice_state == IceConnectionState::Checking && state.remote_candidates.iter().any(Option::is_some) {
        state.ice_state = IceConnectionState::Connected;
        changes.push(PeerEvent::IceConnectionStateChange(IceConnectionState::Connected));
    }
    changes
}

#[async_trait]
impl PeerConnection for SimulatedPeer {
    fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    async fn create_offer(&self, options: &OfferOptions) -> Result<SessionDescription> {
        self.ensure_open("createOffer")?;
        if self.options.fail_create_offer {
            return Err(SessionError::engine("createOffer rejected by simulated engine"));
        }

        let mut state = self.state.lock();
        let mut sections = Vec::new();
        for kind in MediaKind::ALL {
            let track = state.tracks.iter().find(|(t, _)| t.kind == kind);
            if track.is_none() && !options.receives(kind) {
                continue;
            }
            sections.push(SectionInfo {
                kind,
                mid: sections.len().to_string(),
                direction: if track.is_some() {
                    Direction::SendRecv
                } else {
                    Direction::RecvOnly
                },
                msid: track.map(|(t, stream)| (stream.clone(), t.id.clone())),
                extmaps: default_extensions(kind),
                allow_mixed: false,
            });
        }

        let params = self.next_params(&mut state);
        Ok(SessionDescription::offer(render(&params, &sections)))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.ensure_open("createAnswer")?;
        if self.options.fail_create_answer {
            return Err(SessionError::engine("createAnswer rejected by simulated engine"));
        }

        let mut state = self.state.lock();
        let offer = match &state.remote {
            Some(remote) if remote.sdp_type == SdpType::Offer => remote.sdp.clone(),
            _ => return Err(SessionError::engine("createAnswer called without a remote offer")),
        };

        let supported = |uri: &str| {
            (uri == ABS_CAPTURE_TIME_URI && self.options.abs_capture_time_supported)
                || MediaKind::ALL
                    .iter()
                    .any(|kind| default_extensions(*kind).iter().any(|e| e.uri == uri))
        };

        let sections: Vec<SectionInfo> = parse_sections(&offer)
            .into_iter()
            .map(|offered| {
                let track = state.tracks.iter().find(|(t, _)| t.kind == offered.kind);
                let extmaps: Vec<_> = offered
                    .extmaps
                    .iter()
                    .filter(|e| supported(&e.uri))
                    .cloned()
                    .collect();
                SectionInfo {
                    kind: offered.kind,
                    direction: offered.direction.answer(track.is_some()),
                    msid: track.map(|(t, stream)| (stream.clone(), t.id.clone())),
                    allow_mixed: offered.allow_mixed && extmaps.iter().any(|e| e.requires_two_byte_header()),
                    extmaps,
                    mid: offered.mid,
                }
            })
            .collect();

        let params = self.next_params(&mut state);
        Ok(SessionDescription::answer(render(&params, &sections)))
    }

    async fn set_local_description(&self, description: &SessionDescription) -> Result<()> {
        self.ensure_open("setLocalDescription")?;
        if parse_sections(&description.sdp).is_empty() {
            return Err(SessionError::engine("local description has no audio or video section"));
        }

        let gather = {
            let mut state = self.state.lock();
            state.local = Some(description.clone());
            !std::mem::replace(&mut state.gathered, true)
        };

        if gather {
            for candidate in self.host_candidates() {
                self.emit(PeerEvent::IceCandidate(Some(candidate)));
            }
            self.emit(PeerEvent::IceCandidate(None));
        }

        self.maybe_start_media();
        Ok(())
    }

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()> {
        self.ensure_open("setRemoteDescription")?;
        if self.options.fail_set_remote_on == Some(self.endpoint) {
            return Err(SessionError::engine("setRemoteDescription rejected by simulated engine"));
        }
        if parse_sections(&description.sdp).is_empty() {
            return Err(SessionError::engine("remote description has no audio or video section"));
        }

        self.state.lock().remote = Some(description.clone());
        self.maybe_start_media();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: Option<&IceCandidate>) -> Result<()> {
        self.ensure_open("addIceCandidate")?;
        if self.options.fail_add_candidate_on == Some(self.endpoint) {
            return Err(SessionError::engine("addIceCandidate rejected by simulated engine"));
        }

        let changes = {
            let mut state = self.state.lock();
            state.remote_candidates.push(candidate.cloned());
            advance_ice(&mut state)
        };
        for change in changes {
            self.emit(change);
        }
        Ok(())
    }

    async fn add_track(&self, track: &MediaTrack, stream: &StreamId) -> Result<()> {
        self.ensure_open("addTrack")?;
        self.state.lock().tracks.push((track.clone(), stream.clone()));
        Ok(())
    }

    fn receivers(&self) -> Vec<Arc<dyn RtpReceiver>> {
        self.state
            .lock()
            .receivers
            .iter()
            .map(|r| r.clone() as Arc<dyn RtpReceiver>)
            .collect()
    }

    fn ice_connection_state(&self) -> IceConnectionState {
        self.state.lock().ice_state
    }

    async fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            debug!("{} closed", self.endpoint);
        }
        state.closed = true;
        state.ice_state = IceConnectionState::Closed;
    }
}

/// Receiver whose capture clock follows the wall clock
#[derive(Debug)]
pub struct SimulatedReceiver {
    kind: MediaKind,
    ssrc: u32,
    capture_time: bool,
    latency_ms: f64,
    origin: Instant,
    origin_ms: f64,
    hints: Mutex<(Option<f64>, Option<f64>)>,
}

impl SimulatedReceiver {
    fn new(kind: MediaKind, capture_time: bool, latency_ms: f64) -> Self {
        let origin_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or_else(|e| {
                warn!("System clock before UNIX epoch: {}", e);
                0.0
            });

        Self {
            kind,
            ssrc: rand::random(),
            capture_time,
            latency_ms,
            origin: Instant::now(),
            origin_ms,
            hints: Mutex::new((None, None)),
        }
    }

    /// Whether abs-capture-time was negotiated for this receiver
    pub fn reports_capture_time(&self) -> bool {
        self.capture_time
    }

    pub fn jitter_buffer_delay_hint(&self) -> Option<f64> {
        self.hints.lock().0
    }

    pub fn playout_delay_hint(&self) -> Option<f64> {
        self.hints.lock().1
    }
}

impl RtpReceiver for SimulatedReceiver {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn synchronization_sources(&self) -> Vec<SynchronizationSource> {
        let now_ms = self.origin_ms + self.origin.elapsed().as_secs_f64() * 1000.0;
        vec![SynchronizationSource {
            source: self.ssrc,
            timestamp_ms: now_ms,
            capture_timestamp_ms: self.capture_time.then(|| now_ms - self.latency_ms),
        }]
    }

    fn set_jitter_buffer_delay_hint(&self, seconds: f64) {
        self.hints.lock().0 = Some(seconds);
    }

    fn set_playout_delay_hint(&self, seconds: f64) {
        self.hints.lock().1 = Some(seconds);
    }
}
