//! Session configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! header_extension_uri = "http://www.webrtc.org/experiments/rtp-hdrext/abs-capture-time"
//! sdp_semantics = "unified-plan"
//! stats_interval_ms = 100
//!
//! [offer]
//! offer_to_receive_audio = true
//! offer_to_receive_video = true
//!
//! [media]
//! audio = true
//! video = true
//!
//! [delay_hint]
//! jitter_buffer_s = 2.0
//! playout_s = 2.0
//! ```

use std::path::Path;
use std::time::Duration;

use loopcall_sdp_core::ABS_CAPTURE_TIME_URI;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SessionError};
use crate::types::{DelayHint, MediaConstraints, OfferOptions, RtcConfiguration, SdpSemantics};

/// Configuration of a [`LoopbackSession`](crate::LoopbackSession)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Header extension added to the offer before it is applied,
    /// `None` leaves the offer untouched
    pub header_extension_uri: Option<String>,
    pub sdp_semantics: Option<SdpSemantics>,
    /// Capture-time polling period
    pub stats_interval_ms: u64,
    /// Capacity of the observer broadcast channel
    pub event_channel_capacity: usize,
    pub offer: OfferOptions,
    pub media: MediaConstraints,
    pub delay_hint: DelayHint,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            header_extension_uri: Some(ABS_CAPTURE_TIME_URI.to_string()),
            sdp_semantics: None,
            stats_interval_ms: 100,
            event_channel_capacity: 256,
            offer: OfferOptions::default(),
            media: MediaConstraints::default(),
            delay_hint: DelayHint::default(),
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(text)
            .map_err(|e| SessionError::config(format!("Invalid session config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stats_interval_ms == 0 {
            return Err(SessionError::config("stats_interval_ms must be greater than zero"));
        }
        if self.event_channel_capacity == 0 {
            return Err(SessionError::config("event_channel_capacity must be greater than zero"));
        }
        if let Some(uri) = &self.header_extension_uri {
            if uri.trim().is_empty() {
                return Err(SessionError::config("header_extension_uri must not be empty"));
            }
        }
        let hint = &self.delay_hint;
        if !(hint.jitter_buffer_s >= 0.0 && hint.playout_s >= 0.0) {
            return Err(SessionError::config(format!(
                "Delay hints must be non-negative, got jitter buffer {} s and playout {} s",
                hint.jitter_buffer_s, hint.playout_s
            )));
        }
        if !self.media.audio && !self.media.video {
            return Err(SessionError::config("At least one of media.audio and media.video is required"));
        }
        Ok(())
    }

    /// Set or clear the header extension added to offers
    pub fn with_header_extension_uri(mut self, uri: Option<impl Into<String>>) -> Self {
        self.header_extension_uri = uri.map(Into::into);
        self
    }

    pub fn with_sdp_semantics(mut self, semantics: SdpSemantics) -> Self {
        self.sdp_semantics = Some(semantics);
        self
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }

    /// Endpoint configuration derived from this session config
    pub fn rtc_configuration(&self) -> RtcConfiguration {
        RtcConfiguration {
            sdp_semantics: self.sdp_semantics,
        }
    }
}
