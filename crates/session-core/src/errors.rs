//! Error types for loopback session orchestration

use thiserror::Error;

use crate::events::NegotiationStage;
use crate::types::{EndpointId, MediaKind};

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while driving a loopback session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation not allowed in the current session state
    #[error("Cannot {operation} while {state}")]
    InvalidState { operation: String, state: String },

    /// Local media could not be acquired
    #[error("Media acquisition failed: {message}")]
    MediaAcquisition { message: String },

    /// An offer/answer step failed on one endpoint
    #[error("Negotiation failed on {endpoint} during {stage}: {message}")]
    Negotiation {
        endpoint: EndpointId,
        stage: NegotiationStage,
        message: String,
    },

    /// Failure reported by the negotiation engine
    #[error("Engine error: {message}")]
    Engine { message: String },

    /// Receiver has no synchronization source with a capture timestamp
    #[error("No capture timestamp available for {kind} receiver")]
    MissingCaptureTime { kind: MediaKind },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("SDP error: {0}")]
    Sdp(#[from] loopcall_sdp_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Create an invalid state error
    pub fn invalid_state(operation: impl Into<String>, state: impl std::fmt::Display) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state: state.to_string(),
        }
    }

    /// Create a media acquisition error
    pub fn media_acquisition(message: impl Into<String>) -> Self {
        Self::MediaAcquisition {
            message: message.into(),
        }
    }

    /// Create an engine error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
