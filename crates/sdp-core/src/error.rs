use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing SDP lines and attributes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed SDP attribute or line
    #[error("SDP parsing error: {0}")]
    SdpParsingError(String),

    /// Parser error
    #[error("Parser error: {0}")]
    Parser(String),

    /// Unknown media kind token
    #[error("Invalid media kind: {0}")]
    InvalidMediaKind(String),

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl From<nom::Err<nom::error::Error<&str>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&str>>) -> Self {
        Error::Parser(format!("Parsing failed: {err}"))
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
