//! Command implementations

pub mod augment;
pub mod demo;
