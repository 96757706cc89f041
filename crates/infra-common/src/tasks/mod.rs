//! Task lifecycle management
//!
//! Every long-running task spawned by the session layer is owned by a
//! [`ScopedTask`] so that it can be cancelled when superseded or when its
//! owner is torn down.

pub mod scoped;

pub use scoped::ScopedTask;
