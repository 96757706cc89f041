//! # loopcall-infra-common
//!
//! Infrastructure shared by the loopcall crates:
//!
//! - [`logging`]: `tracing-subscriber` installation with env-filter and
//!   optional JSON output
//! - [`tasks`]: cancellable, owned tokio tasks
//! - [`errors`]: the error type for the above

pub mod errors;
pub mod logging;
pub mod tasks;

pub use errors::{Error, Result};
