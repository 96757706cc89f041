//! Loopback session orchestration
//!
//! [`LoopbackSession`] owns the local media and, while a call is up, both
//! endpoints plus the control task that wires their events together.

mod control;
mod loopback;

pub use loopback::{LoopbackSession, SessionState};
