/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The first byte is not a start marker valid for the decoded direction.
    #[error("bad start marker 0x{0:02X}")]
    BadStart(u8),

    /// The byte where the end marker belongs is something else.
    #[error("bad end marker 0x{0:02X} (expected 0xCC)")]
    BadEnd(u8),

    /// Not enough bytes buffered yet for a whole frame. Resumable: buffer
    /// more input and decode again.
    #[error("incomplete frame ({needed} more bytes needed)")]
    Incomplete { needed: usize },

    /// The payload exceeds what a one-byte length can carry on this link.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An error response must carry exactly one error code byte.
    #[error("error response carries {0} payload bytes (expected 1)")]
    MalformedError(usize),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for framing faults that require discarding bytes to resynchronise
    /// with the stream.
    pub fn needs_resync(&self) -> bool {
        matches!(
            self,
            FrameError::BadStart(_) | FrameError::BadEnd(_) | FrameError::PayloadTooLarge { .. }
        )
    }

    /// True when the error only reflects a read timeout on the link.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
