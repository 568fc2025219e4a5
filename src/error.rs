//! Crate-level error types.

use std::error::Error as StdError;

/// Crate-level error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The device library reported zero attached DACs.
    #[error("no Helios DAC devices found")]
    NoDevices,

    /// The vendor library could not be loaded or is missing a symbol.
    #[error("device library error: {0}")]
    Library(#[source] Box<dyn StdError + Send + Sync>),

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration or recording file could not be parsed.
    #[error("failed to parse {what}: {source}")]
    Config {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// The frame source failed (not a timeout).
    #[error("capture failed: {0}")]
    Capture(#[source] Box<dyn StdError + Send + Sync>),

    /// The detector failed on a captured frame.
    #[error("detection failed: {0}")]
    Detector(#[source] Box<dyn StdError + Send + Sync>),

    /// The output sink failed to render a frame.
    #[error("render failed: {0}")]
    Sink(#[source] Box<dyn StdError + Send + Sync>),

    /// I/O error while reading or writing a local file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error with context describing what operation failed.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A simple error message.
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Create a simple message error.
    pub fn msg(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    /// Create an error with context wrapping another error.
    pub fn context(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Wrap a device library failure.
    pub fn library(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Library(Box::new(source))
    }

    /// Wrap a frame source failure.
    pub fn capture(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Capture(Box::new(source))
    }

    /// Wrap a detector failure.
    pub fn detector(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Detector(Box::new(source))
    }

    /// Wrap a sink failure.
    pub fn sink(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Sink(Box::new(source))
    }

    /// Wrap a JSON parse failure, naming what was being parsed.
    pub fn config(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Config {
            what: what.into(),
            source,
        }
    }
}

/// Crate-level result type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_error_includes_both_messages() {
        let err = Error::context(
            "loading recording",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing.jsonl"),
        );
        assert_eq!(err.to_string(), "loading recording: missing.jsonl");
    }

    #[test]
    fn invalid_config_names_the_problem() {
        let err = Error::invalid_config("frame_width must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration: frame_width must be positive"
        );
    }
}
