//! Error types shared by the loopcall infrastructure

pub mod types;

pub use types::{Error, Result};
