//! Capture-time polling
//!
//! With the abs-capture-time header extension negotiated, each receiver's
//! synchronization source carries the sender's capture clock. Sampling the
//! audio and video receivers side by side shows the A/V offset as the
//! receiving endpoint sees it.

use std::sync::Arc;
use std::time::Duration;

use loopcall_infra_common::tasks::ScopedTask;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::RtpReceiver;
use crate::errors::{Result, SessionError};
use crate::events::SessionEvent;

/// Capture times of the most recent audio and video packets, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureTimeSample {
    pub audio_s: f64,
    pub video_s: f64,
    /// `video_s - audio_s`
    pub diff_s: f64,
}

impl CaptureTimeSample {
    pub fn new(audio_s: f64, video_s: f64) -> Self {
        Self {
            audio_s,
            video_s,
            diff_s: video_s - audio_s,
        }
    }

    /// Read the first synchronization source of both receivers
    pub fn read(audio: &dyn RtpReceiver, video: &dyn RtpReceiver) -> Result<Self> {
        let audio_s = capture_time_s(audio)?;
        let video_s = capture_time_s(video)?;
        Ok(Self::new(audio_s, video_s))
    }
}

fn capture_time_s(receiver: &dyn RtpReceiver) -> Result<f64> {
    receiver
        .synchronization_sources()
        .first()
        .and_then(|source| source.capture_timestamp_ms)
        .map(|ms| ms / 1000.0)
        .ok_or(SessionError::MissingCaptureTime {
            kind: receiver.kind(),
        })
}

/// Periodic capture-time sampler running as a scoped task
#[derive(Debug)]
pub struct CaptureTimePoller {
    task: ScopedTask,
}

impl CaptureTimePoller {
    /// Start sampling every `period`, the first sample one period from now
    pub fn start(
        audio: Arc<dyn RtpReceiver>,
        video: Arc<dyn RtpReceiver>,
        period: Duration,
        events: broadcast::Sender<SessionEvent>,
        parent: &CancellationToken,
    ) -> Self {
        let task = ScopedTask::spawn_child("capture-time-poller", parent, move |token| {
            poll_capture_times(audio, video, period, events, token)
        });
        Self { task }
    }

    pub fn stop(&self) {
        self.task.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_cancelled() && !self.task.is_finished()
    }
}

async fn poll_capture_times(
    audio: Arc<dyn RtpReceiver>,
    video: Arc<dyn RtpReceiver>,
    period: Duration,
    events: broadcast::Sender<SessionEvent>,
    token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match CaptureTimeSample::read(audio.as_ref(), video.as_ref()) {
            Ok(sample) => {
                debug!(
                    "audio capture {:.3} s, video capture {:.3} s, diff {:.3} s",
                    sample.audio_s, sample.video_s, sample.diff_s
                );
                let _ = events.send(SessionEvent::CaptureTimes(sample));
            }
            Err(e) => warn!("Capture time sample skipped: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MediaKind, SynchronizationSource};

    struct FixedReceiver {
        kind: MediaKind,
        capture_ms: Option<f64>,
    }

    impl RtpReceiver for FixedReceiver {
        fn kind(&self) -> MediaKind {
            self.kind
        }

        fn synchronization_sources(&self) -> Vec<SynchronizationSource> {
            match self.capture_ms {
                Some(ms) => vec![SynchronizationSource {
                    source: 1,
                    timestamp_ms: ms,
                    capture_timestamp_ms: Some(ms),
                }],
                None => Vec::new(),
            }
        }

        fn set_jitter_buffer_delay_hint(&self, _seconds: f64) {}

        fn set_playout_delay_hint(&self, _seconds: f64) {}
    }

    fn receiver(kind: MediaKind, capture_ms: Option<f64>) -> Arc<dyn RtpReceiver> {
        Arc::new(FixedReceiver { kind, capture_ms })
    }

    #[test]
    fn test_sample_converts_to_seconds() {
        let audio = receiver(MediaKind::Audio, Some(1_000.0));
        let video = receiver(MediaKind::Video, Some(1_250.0));

        let sample = CaptureTimeSample::read(audio.as_ref(), video.as_ref()).unwrap();
        assert_eq!(sample.audio_s, 1.0);
        assert_eq!(sample.video_s, 1.25);
        assert_eq!(sample.diff_s, 0.25);
    }

    #[test]
    fn test_missing_source_is_reported() {
        let audio = receiver(MediaKind::Audio, Some(1_000.0));
        let video = receiver(MediaKind::Video, None);

        let err = CaptureTimeSample::read(audio.as_ref(), video.as_ref()).unwrap_err();
        assert!(matches!(err, SessionError::MissingCaptureTime { kind: MediaKind::Video }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_emits_every_period() {
        let (tx, mut rx) = broadcast::channel(16);
        let parent = CancellationToken::new();
        let poller = CaptureTimePoller::start(
            receiver(MediaKind::Audio, Some(2_000.0)),
            receiver(MediaKind::Video, Some(1_900.0)),
            Duration::from_millis(100),
            tx,
            &parent,
        );

        for _ in 0..3 {
            match rx.recv().await.unwrap() {
                SessionEvent::CaptureTimes(sample) => assert!((sample.diff_s + 0.1).abs() < 1e-9),
                other => panic!("unexpected event {:?}", other),
            }
        }

        poller.stop();
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_keeps_going_without_timestamps() {
        let (tx, mut rx) = broadcast::channel(16);
        let parent = CancellationToken::new();
        let poller = CaptureTimePoller::start(
            receiver(MediaKind::Audio, None),
            receiver(MediaKind::Video, None),
            Duration::from_millis(100),
            tx,
            &parent,
        );

        tokio::time::sleep(Duration::from_millis(550)).await;
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
        assert!(poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancel_stops_poller() {
        let (tx, _rx) = broadcast::channel(16);
        let parent = CancellationToken::new();
        let poller = CaptureTimePoller::start(
            receiver(MediaKind::Audio, Some(1.0)),
            receiver(MediaKind::Video, Some(1.0)),
            Duration::from_millis(100),
            tx,
            &parent,
        );

        parent.cancel();
        assert!(!poller.is_running());
    }
}
