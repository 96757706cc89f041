//! Simulated capture devices

use async_trait::async_trait;
use tracing::debug;

use crate::engine::MediaSource;
use crate::errors::{Result, SessionError};
use crate::types::{LocalStream, MediaConstraints, MediaKind, MediaTrack};

/// Media source handing out one track per requested kind
#[derive(Debug, Clone, Default)]
pub struct SimulatedMediaSource {
    failure: Option<String>,
}

impl SimulatedMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose every acquisition fails with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
        }
    }

    fn device_label(kind: MediaKind) -> &'static str {
        match kind {
            MediaKind::Audio => "Simulated Microphone",
            MediaKind::Video => "Simulated Camera",
        }
    }
}

#[async_trait]
impl MediaSource for SimulatedMediaSource {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalStream> {
        if let Some(reason) = &self.failure {
            return Err(SessionError::media_acquisition(reason.clone()));
        }

        let tracks: Vec<MediaTrack> = MediaKind::ALL
            .into_iter()
            .filter(|kind| constraints.wants(*kind))
            .map(|kind| MediaTrack::new(kind, Self::device_label(kind)))
            .collect();
        if tracks.is_empty() {
            return Err(SessionError::media_acquisition("No audio or video requested"));
        }

        debug!("Simulated capture of {} track(s)", tracks.len());
        Ok(LocalStream::new(tracks))
    }
}
