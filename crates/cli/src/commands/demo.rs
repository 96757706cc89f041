//! Demo command - Run a loopback call against the simulated engine

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use loopcall_infra_common::tasks::ScopedTask;
use loopcall_session_core::prelude::*;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

/// Execute demo command
pub async fn execute(config_path: Option<&Path>, duration: Duration, delay_hint: bool) -> Result<()> {
    let config = match config_path {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("Failed to load session config from {}", path.display()))?,
        None => SessionConfig::default(),
    };

    let engine = Arc::new(SimulatedEngine::default());
    let media = Arc::new(SimulatedMediaSource::new());
    let mut session = LoopbackSession::new(config, engine, media)?;

    let events = session.subscribe();
    let reporter = ScopedTask::spawn("event-reporter", |_| report_events(events));

    session.start().await.context("Failed to start session")?;
    session.call().await.context("Call failed")?;

    let interrupted = if delay_hint {
        let half = duration / 2;
        if wait_or_interrupt(half).await {
            true
        } else {
            if !session.apply_delay_hint()? {
                warn!("Delay hint could not be applied yet");
            }
            wait_or_interrupt(duration.saturating_sub(half)).await
        }
    } else {
        wait_or_interrupt(duration).await
    };
    if interrupted {
        info!("Interrupted, hanging up");
    }

    session.hangup().await.context("Hangup failed")?;

    // Let the reporter print the final events
    tokio::task::yield_now().await;
    reporter.cancel();
    Ok(())
}

/// Sleep for `duration`, returning `true` if Ctrl+C arrived first
async fn wait_or_interrupt(duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = tokio::signal::ctrl_c() => true,
    }
}

async fn report_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => report(&event),
            Err(RecvError::Lagged(missed)) => warn!("Event reporter lagged, {} events missed", missed),
            Err(RecvError::Closed) => break,
        }
    }
}

fn report(event: &SessionEvent) {
    match event {
        SessionEvent::LocalStreamReady { stream_id, tracks } => {
            info!("Local stream {} with {} track(s)", stream_id, tracks.len())
        }
        SessionEvent::CallStarted => info!("Call started"),
        SessionEvent::OfferCreated { sdp } => info!("Offer ready ({} lines)", sdp.split("\r\n").count()),
        SessionEvent::HeaderExtensionAdded {
            kind,
            id,
            allow_mixed_inserted,
        } => info!(
            "Offer {} section: header extension id {}{}",
            kind,
            id,
            if *allow_mixed_inserted { ", extmap-allow-mixed added" } else { "" }
        ),
        SessionEvent::DescriptionApplied {
            endpoint,
            side,
            sdp_type,
        } => info!("{} applied {:?} {}", endpoint, side, sdp_type),
        SessionEvent::NegotiationFailed {
            endpoint,
            stage,
            message,
        } => warn!("{} {} failed: {}", endpoint, stage, message),
        SessionEvent::CandidateRelayed { from, candidate } => match candidate {
            Some(candidate) => info!("{} -> {}: {}", from, from.peer(), candidate),
            None => info!("{} -> {}: end of candidates", from, from.peer()),
        },
        SessionEvent::CandidateRelayFailed { from, message } => {
            warn!("{} -> {} candidate failed: {}", from, from.peer(), message)
        }
        SessionEvent::IceStateChanged { endpoint, state } => info!("{} ICE state {}", endpoint, state),
        SessionEvent::RemoteStreamAttached { kind, stream_id } => {
            info!("Remote {} stream {} attached", kind, stream_id)
        }
        SessionEvent::SetupCompleted { elapsed } => {
            info!("Setup time: {:.3}ms", elapsed.as_secs_f64() * 1000.0)
        }
        SessionEvent::CaptureTimes(sample) => println!(
            "audio {:.3} s  video {:.3} s  diff {:+.3} s",
            sample.audio_s, sample.video_s, sample.diff_s
        ),
        SessionEvent::DelayHintApplied {
            jitter_buffer_s,
            playout_s,
        } => info!(
            "Delay hint applied: jitter buffer {} s, playout {} s",
            jitter_buffer_s, playout_s
        ),
        SessionEvent::CallEnded => info!("Call ended"),
    }
}
