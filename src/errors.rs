/*!
 * Error types for the subfetch application.
 *
 * Each stage of subtitle acquisition has its own error enum so the
 * orchestrator can decide per stage whether a failure aborts the item,
 * triggers a retry or only costs a single candidate.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while fingerprinting a media file
#[derive(Error, Debug)]
#[error("Failed to fingerprint {path:?}: {source}")]
pub struct FingerprintError {
    /// The media file being read
    pub path: PathBuf,
    /// Underlying I/O failure
    #[source]
    pub source: std::io::Error,
}

/// Errors that can occur when talking to the subtitle repository
#[derive(Error, Debug)]
pub enum TransportError {
    /// DNS, connect or TLS failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The server answered with a non-success status
    #[error("Server responded with status {status_code}")]
    Status {
        /// HTTP status code
        status_code: u16,
    },

    /// The response body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_body() || error.is_decode() {
            Self::Body(error.to_string())
        } else if let Some(status) = error.status() {
            Self::Status { status_code: status.as_u16() }
        } else {
            Self::Connection(error.to_string())
        }
    }
}

/// Errors in the packaged binary response
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// A field ran past the end of the response body
    #[error("Truncated package while reading {field}: needed {needed} byte(s), {available} available")]
    Truncated {
        /// Name of the field being read
        field: &'static str,
        /// Bytes the field requires
        needed: usize,
        /// Bytes left in the body
        available: usize,
    },
}

/// Errors writing a single subtitle to disk
#[derive(Error, Debug)]
pub enum PersistError {
    /// Creating or writing the target file failed
    #[error("Failed to write subtitle {path:?}: {source}")]
    Io {
        /// Target path
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Every disambiguated name was already taken
    #[error("No free file name left for {base:?}")]
    NoFreeName {
        /// Base path that kept colliding
        base: PathBuf,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error while fingerprinting
    #[error("Fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    /// Error from the transport
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Error decoding a response
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error persisting a subtitle
    #[error("Persist error: {0}")]
    Persist(#[from] PersistError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
