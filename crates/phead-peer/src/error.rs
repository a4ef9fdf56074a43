use std::path::PathBuf;

use phead_frame::ErrorCode;

/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] phead_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] phead_frame::FrameError),

    /// The other end closed the link.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// No (valid) frame arrived in time.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The device answered with an error response.
    #[error("device error: {0}")]
    Device(ErrorCode),

    /// The device answered, but not with what the request calls for.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A device profile failed validation.
    #[error("invalid device profile: {0}")]
    InvalidProfile(String),

    /// A device profile file could not be read.
    #[error("cannot read profile {path}: {source}")]
    ProfileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PeerError {
    /// True when the failure is a timeout at any layer.
    pub fn is_timeout(&self) -> bool {
        match self {
            PeerError::Timeout(_) => true,
            PeerError::Frame(err) => err.is_timeout(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
