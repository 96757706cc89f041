//! # loopcall-session-core
//!
//! Orchestrates a loopback call between two local negotiation endpoints:
//! `pc1` captures and offers, `pc2` answers and renders. The offer is munged
//! with an extra RTP header extension (abs-capture-time by default) before it
//! is applied, and the receiving side polls capture timestamps to report the
//! audio/video capture offset.
//!
//! The negotiation engine itself is external and reached through the traits
//! in [`engine`]. The [`simulated`] module provides an in-process engine for
//! tests and demos.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use loopcall_session_core::prelude::*;
//!
//! # async fn run() -> loopcall_session_core::Result<()> {
//! let engine = Arc::new(SimulatedEngine::default());
//! let media = Arc::new(SimulatedMediaSource::new());
//! let mut session = LoopbackSession::new(SessionConfig::default(), engine, media)?;
//!
//! let mut events = session.subscribe();
//! session.start().await?;
//! session.call().await?;
//! while let Ok(event) = events.recv().await {
//!     if let SessionEvent::CaptureTimes(sample) = event {
//!         println!("A/V capture offset: {:.3} s", sample.diff_s);
//!         break;
//!     }
//! }
//! session.hangup().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod session;
pub mod simulated;
pub mod sinks;
pub mod stats;
pub mod types;

pub use config::SessionConfig;
pub use engine::{MediaSource, PeerConnection, PeerConnectionFactory, PeerEvent, RtpReceiver};
pub use errors::{Result, SessionError};
pub use events::{DescriptionSide, NegotiationStage, SessionEvent};
pub use session::{LoopbackSession, SessionState};
pub use stats::{CaptureTimePoller, CaptureTimeSample};

/// Prelude module
///
/// Import everything needed to run a loopback session.
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::errors::{Result, SessionError};
    pub use crate::events::SessionEvent;
    pub use crate::session::{LoopbackSession, SessionState};
    pub use crate::simulated::{SimulatedEngine, SimulatedMediaSource, SimulatedOptions};
    pub use crate::types::*;
}
