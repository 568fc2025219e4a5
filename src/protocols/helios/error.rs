//! Error types for the Helios vendor library binding.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading `libHeliosDacAPI`.
#[derive(Error, Debug)]
pub enum Error {
    /// The shared library could not be opened.
    #[error("failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// A required entry point is missing from the library.
    #[error("missing symbol `{name}`: {source}")]
    MissingSymbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },

    /// `OpenDevices` returned a negative code.
    #[error("OpenDevices failed with code {0}")]
    OpenFailed(i32),
}

/// Result type alias for Helios library operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for crate::Error {
    fn from(e: Error) -> Self {
        crate::Error::library(e)
    }
}
