//! End-to-end loopback session tests against the simulated engine
//!
//! Covers:
//! - start / call / hangup lifecycle and state checks
//! - offer munging and offer/answer ordering
//! - candidate relay order
//! - remote stream attachment, setup time and capture-time polling
//! - delay hint application
//! - negotiation failure handling

use std::sync::Arc;
use std::time::Duration;

use loopcall_sdp_core::ABS_CAPTURE_TIME_URI;
use loopcall_session_core::prelude::*;
use loopcall_session_core::simulated::SimulatedPeer;
use loopcall_session_core::{DescriptionSide, NegotiationStage, PeerConnection, RtpReceiver};
use pretty_assertions::assert_eq;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(3);

fn test_config() -> SessionConfig {
    SessionConfig::default().with_stats_interval(Duration::from_millis(20))
}

fn new_session(options: SimulatedOptions, config: SessionConfig) -> (LoopbackSession, SimulatedEngine) {
    let engine = SimulatedEngine::new(options);
    let session = LoopbackSession::new(
        config,
        Arc::new(engine.clone()),
        Arc::new(SimulatedMediaSource::new()),
    )
    .expect("valid config");
    (session, engine)
}

fn peer(engine: &SimulatedEngine, endpoint: EndpointId) -> Arc<SimulatedPeer> {
    engine.peer(endpoint).expect("endpoint created")
}

/// Receive events until one matches, returning everything seen on the way
async fn collect_until<F>(rx: &mut broadcast::Receiver<SessionEvent>, mut done: F) -> Vec<SessionEvent>
where
    F: FnMut(&[SessionEvent]) -> bool,
{
    let mut seen = Vec::new();
    timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    seen.push(event);
                    if done(&seen) {
                        return;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("expected events before timeout");
    seen
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return events,
        }
    }
}

fn capture_samples(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::CaptureTimes(_)))
        .count()
}

#[tokio::test]
async fn test_call_lifecycle() {
    let (mut session, engine) = new_session(SimulatedOptions::default(), test_config());
    let mut events = session.subscribe();

    assert_eq!(session.state(), SessionState::Idle);
    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.local_stream().unwrap().tracks.len(), 2);

    session.call().await.unwrap();
    assert_eq!(session.state(), SessionState::InCall);

    let seen = collect_until(&mut events, |seen| capture_samples(seen) >= 3).await;

    // Offer/answer applied in order on both endpoints
    let applied: Vec<(EndpointId, DescriptionSide, SdpType)> = seen
        .iter()
        .filter_map(|e| match e {
            SessionEvent::DescriptionApplied { endpoint, side, sdp_type } => Some((*endpoint, *side, *sdp_type)),
            _ => None,
        })
        .collect();
    assert_eq!(
        applied,
        vec![
            (EndpointId::Pc1, DescriptionSide::Local, SdpType::Offer),
            (EndpointId::Pc2, DescriptionSide::Remote, SdpType::Offer),
            (EndpointId::Pc2, DescriptionSide::Local, SdpType::Answer),
            (EndpointId::Pc1, DescriptionSide::Remote, SdpType::Answer),
        ]
    );

    // Both remote streams attached exactly once
    let attached: Vec<MediaKind> = seen
        .iter()
        .filter_map(|e| match e {
            SessionEvent::RemoteStreamAttached { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(attached, vec![MediaKind::Audio, MediaKind::Video]);

    let setups = seen
        .iter()
        .filter(|e| matches!(e, SessionEvent::SetupCompleted { .. }))
        .count();
    assert_eq!(setups, 1);

    // Simulated video lags audio by 40 ms
    let sample = seen
        .iter()
        .find_map(|e| match e {
            SessionEvent::CaptureTimes(sample) => Some(*sample),
            _ => None,
        })
        .unwrap();
    assert!((sample.diff_s + 0.040).abs() < 0.005, "diff {}", sample.diff_s);

    session.hangup().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert!(peer(&engine, EndpointId::Pc1).is_closed());
    assert!(peer(&engine, EndpointId::Pc2).is_closed());
    assert!(drain(&mut events).contains(&SessionEvent::CallEnded));
}

#[tokio::test]
async fn test_offer_is_augmented_before_use() {
    let (mut session, engine) = new_session(SimulatedOptions::default(), test_config());
    let mut events = session.subscribe();

    session.start().await.unwrap();
    session.call().await.unwrap();

    let pc1_local = peer(&engine, EndpointId::Pc1).local_description().unwrap();
    let pc2_remote = peer(&engine, EndpointId::Pc2).remote_description().unwrap();
    assert_eq!(pc1_local, pc2_remote);
    assert!(pc1_local.sdp.contains(&format!("a=extmap:5 {}", ABS_CAPTURE_TIME_URI)));
    assert!(pc1_local.sdp.contains(&format!(
        "a=extmap:14 urn:ietf:params:rtp-hdrext:toffset\r\na=extmap-allow-mixed\r\na=extmap:15 {}",
        ABS_CAPTURE_TIME_URI
    )));

    let seen = drain(&mut events);
    assert!(seen.contains(&SessionEvent::HeaderExtensionAdded {
        kind: MediaKind::Audio,
        id: 5,
        allow_mixed_inserted: false,
    }));
    assert!(seen.contains(&SessionEvent::HeaderExtensionAdded {
        kind: MediaKind::Video,
        id: 15,
        allow_mixed_inserted: true,
    }));
    assert!(seen.contains(&SessionEvent::OfferCreated { sdp: pc1_local.sdp.clone() }));

    session.hangup().await.unwrap();
}

#[tokio::test]
async fn test_tracks_sent_on_separate_streams() {
    let (mut session, engine) = new_session(SimulatedOptions::default(), test_config());
    session.start().await.unwrap();
    session.call().await.unwrap();

    let tracks = peer(&engine, EndpointId::Pc1).tracks();
    assert_eq!(tracks.len(), 2);
    assert_ne!(tracks[0].1, tracks[1].1);

    session.hangup().await.unwrap();
}

#[tokio::test]
async fn test_candidates_relayed_in_order() {
    let (mut session, engine) = new_session(SimulatedOptions::default(), test_config());
    let mut events = session.subscribe();
    session.start().await.unwrap();
    session.call().await.unwrap();

    // Two host candidates plus end-of-candidates from each side
    collect_until(&mut events, |seen| {
        seen.iter()
            .filter(|e| matches!(e, SessionEvent::CandidateRelayed { .. }))
            .count()
            == 6
    })
    .await;

    for from in [EndpointId::Pc1, EndpointId::Pc2] {
        let mut expected: Vec<Option<IceCandidate>> =
            peer(&engine, from).host_candidates().into_iter().map(Some).collect();
        expected.push(None);
        assert_eq!(peer(&engine, from.peer()).applied_candidates(), expected);
    }

    assert_eq!(
        peer(&engine, EndpointId::Pc2).ice_connection_state(),
        IceConnectionState::Connected
    );
    session.hangup().await.unwrap();
}

#[tokio::test]
async fn test_hangup_stops_polling_and_allows_new_call() {
    let (mut session, engine) = new_session(SimulatedOptions::default(), test_config());
    let mut events = session.subscribe();
    session.start().await.unwrap();

    session.call().await.unwrap();
    collect_until(&mut events, |seen| capture_samples(seen) >= 1).await;
    session.hangup().await.unwrap();
    drain(&mut events);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(capture_samples(&drain(&mut events)), 0);

    session.call().await.unwrap();
    assert_eq!(engine.created(), 4);
    let seen = collect_until(&mut events, |seen| capture_samples(seen) >= 1).await;
    assert!(seen.iter().any(|e| matches!(e, SessionEvent::SetupCompleted { .. })));
    session.hangup().await.unwrap();
}

#[tokio::test]
async fn test_delay_hint_applies_once_to_audio() {
    let (mut session, engine) = new_session(SimulatedOptions::default(), test_config());
    session.start().await.unwrap();

    assert!(matches!(
        session.apply_delay_hint(),
        Err(SessionError::InvalidState { .. })
    ));

    session.call().await.unwrap();
    assert!(session.apply_delay_hint().unwrap());
    assert!(!session.apply_delay_hint().unwrap());

    for receiver in peer(&engine, EndpointId::Pc2).simulated_receivers() {
        match receiver.kind() {
            MediaKind::Audio => {
                assert_eq!(receiver.jitter_buffer_delay_hint(), Some(2.0));
                assert_eq!(receiver.playout_delay_hint(), Some(2.0));
            }
            MediaKind::Video => {
                assert_eq!(receiver.jitter_buffer_delay_hint(), None);
                assert_eq!(receiver.playout_delay_hint(), None);
            }
        }
    }

    // A new call gets a fresh hint
    session.hangup().await.unwrap();
    session.call().await.unwrap();
    assert!(session.apply_delay_hint().unwrap());
    session.hangup().await.unwrap();
}

#[tokio::test]
async fn test_operations_rejected_in_wrong_state() {
    let (mut session, _engine) = new_session(SimulatedOptions::default(), test_config());

    assert!(matches!(session.call().await, Err(SessionError::InvalidState { .. })));
    assert!(matches!(session.hangup().await, Err(SessionError::InvalidState { .. })));

    session.start().await.unwrap();
    assert!(matches!(session.start().await, Err(SessionError::InvalidState { .. })));
    assert!(matches!(session.hangup().await, Err(SessionError::InvalidState { .. })));

    session.call().await.unwrap();
    assert!(matches!(session.call().await, Err(SessionError::InvalidState { .. })));
    session.hangup().await.unwrap();
}

#[tokio::test]
async fn test_media_failure_keeps_session_idle() {
    let mut session = LoopbackSession::new(
        test_config(),
        Arc::new(SimulatedEngine::default()),
        Arc::new(SimulatedMediaSource::failing("NotAllowedError")),
    )
    .unwrap();

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, SessionError::MediaAcquisition { .. }));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.local_stream().is_none());
}

#[tokio::test]
async fn test_offer_failure_tears_down_call() {
    let options = SimulatedOptions {
        fail_create_offer: true,
        ..Default::default()
    };
    let (mut session, engine) = new_session(options, test_config());
    let mut events = session.subscribe();
    session.start().await.unwrap();

    let err = session.call().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Negotiation {
            endpoint: EndpointId::Pc1,
            stage: NegotiationStage::CreateOffer,
            ..
        }
    ));
    assert_eq!(session.state(), SessionState::Ready);
    assert!(peer(&engine, EndpointId::Pc1).is_closed());
    assert!(peer(&engine, EndpointId::Pc2).is_closed());

    let seen = drain(&mut events);
    assert!(seen.contains(&SessionEvent::CallEnded));
    assert!(!seen.iter().any(|e| matches!(e, SessionEvent::DescriptionApplied { .. })));
}

#[tokio::test]
async fn test_set_description_failure_is_reported_and_negotiation_continues() {
    let options = SimulatedOptions {
        fail_set_remote_on: Some(EndpointId::Pc1),
        ..Default::default()
    };
    let (mut session, _engine) = new_session(options, test_config());
    let mut events = session.subscribe();
    session.start().await.unwrap();

    session.call().await.unwrap();
    assert_eq!(session.state(), SessionState::InCall);

    let seen = collect_until(&mut events, |seen| {
        seen.iter()
            .filter(|e| matches!(e, SessionEvent::RemoteStreamAttached { .. }))
            .count()
            == 2
    })
    .await;
    assert!(seen.iter().any(|e| matches!(
        e,
        SessionEvent::NegotiationFailed {
            endpoint: EndpointId::Pc1,
            stage: NegotiationStage::SetRemoteDescription,
            ..
        }
    )));
    session.hangup().await.unwrap();
}

#[tokio::test]
async fn test_rejected_remote_offer_fails_answer() {
    let options = SimulatedOptions {
        fail_set_remote_on: Some(EndpointId::Pc2),
        ..Default::default()
    };
    let (mut session, _engine) = new_session(options, test_config());
    let mut events = session.subscribe();
    session.start().await.unwrap();

    let err = session.call().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Negotiation {
            endpoint: EndpointId::Pc2,
            stage: NegotiationStage::CreateAnswer,
            ..
        }
    ));

    let failures: Vec<NegotiationStage> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::NegotiationFailed { stage, .. } => Some(stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        failures,
        vec![NegotiationStage::SetRemoteDescription, NegotiationStage::CreateAnswer]
    );
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_candidate_relay_failure_is_reported() {
    let options = SimulatedOptions {
        fail_add_candidate_on: Some(EndpointId::Pc2),
        ..Default::default()
    };
    let (mut session, _engine) = new_session(options, test_config());
    let mut events = session.subscribe();
    session.start().await.unwrap();
    session.call().await.unwrap();

    let seen = collect_until(&mut events, |seen| {
        seen.iter()
            .any(|e| matches!(e, SessionEvent::CandidateRelayFailed { from: EndpointId::Pc1, .. }))
    })
    .await;
    assert!(!seen
        .iter()
        .any(|e| matches!(e, SessionEvent::CandidateRelayed { from: EndpointId::Pc1, .. })));
    session.hangup().await.unwrap();
}

#[tokio::test]
async fn test_without_header_extension_no_capture_times() {
    let config = test_config().with_header_extension_uri(None::<String>);
    let (mut session, engine) = new_session(SimulatedOptions::default(), config);
    let mut events = session.subscribe();
    session.start().await.unwrap();
    session.call().await.unwrap();

    let offer = peer(&engine, EndpointId::Pc1).local_description().unwrap();
    assert!(!offer.sdp.contains(ABS_CAPTURE_TIME_URI));
    assert!(!offer.sdp.contains("a=extmap-allow-mixed"));

    collect_until(&mut events, |seen| {
        seen.iter().any(|e| matches!(e, SessionEvent::SetupCompleted { .. }))
    })
    .await;
    sleep(Duration::from_millis(100)).await;
    assert_eq!(capture_samples(&drain(&mut events)), 0);

    session.hangup().await.unwrap();
}

#[tokio::test]
async fn test_sdp_semantics_reach_both_endpoints() {
    let config = test_config().with_sdp_semantics(SdpSemantics::PlanB);
    let (mut session, engine) = new_session(SimulatedOptions::default(), config);
    session.start().await.unwrap();
    session.call().await.unwrap();

    for endpoint in [EndpointId::Pc1, EndpointId::Pc2] {
        assert_eq!(
            peer(&engine, endpoint).configuration().sdp_semantics,
            Some(SdpSemantics::PlanB)
        );
    }

    session.hangup().await.unwrap();
    session.call().await.unwrap();
    // The second call creates fresh endpoints with the same configuration
    assert_eq!(engine.created(), 4);
    assert_eq!(
        peer(&engine, EndpointId::Pc1).configuration().sdp_semantics,
        Some(SdpSemantics::PlanB)
    );
    session.hangup().await.unwrap();
}
