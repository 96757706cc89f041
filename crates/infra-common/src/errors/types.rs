use thiserror::Error;

/// Result type for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the shared infrastructure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// A tracked task failed to stop or panicked
    #[error("Task error: {0}")]
    Task(String),
}
