use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::codec::{
    decode_frame_limited, resync, Direction, Frame, FrameConfig, FRAME_OVERHEAD, MAX_PAYLOAD,
};
use crate::error::{FrameError, Result};
use crate::message::{Command, Response};

const READ_CHUNK_SIZE: usize = MAX_PAYLOAD + FRAME_OVERHEAD;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// After a framing error the buffer is already resynchronised, so the next
/// call picks up at the next start marker.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    direction: Direction,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Reader for the device side of a link (decodes `0xBD` frames).
    pub fn requests(inner: T) -> Self {
        Self::with_config(inner, Direction::Request, FrameConfig::default())
    }

    /// Reader for the host side of a link (decodes `0xA0`/`0xA1` frames).
    pub fn responses(inner: T) -> Self {
        Self::with_config(inner, Direction::Response, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, direction: Direction, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            direction,
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. Read
    /// timeouts surface as `FrameError::Io` with any partial frame kept in
    /// the buffer.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            let decoded =
                decode_frame_limited(&mut self.buf, self.direction, self.config.max_payload_size);
            match decoded {
                Ok(Some(frame)) => {
                    trace!(start = frame.start, len = frame.payload.len(), "frame decoded");
                    return Ok(frame);
                }
                Ok(None) => {}
                Err(err) => {
                    if err.needs_resync() {
                        let dropped = resync(&mut self.buf, self.direction);
                        debug!(%err, dropped, "resynchronised frame buffer");
                    }
                    return Err(err);
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read the next request frame as a [`Command`].
    pub fn read_command(&mut self) -> Result<Command> {
        let frame = self.read_frame()?;
        Command::from_frame(&frame)
    }

    /// Read the next response frame as a [`Response`].
    pub fn read_response(&mut self) -> Result<Response> {
        let frame = self.read_frame()?;
        Response::from_frame(&frame)
    }

    /// Drop everything buffered so far. Used before re-sending a request
    /// whose reply never arrived.
    pub fn clear(&mut self) -> usize {
        let dropped = self.buf.len();
        self.buf.clear();
        dropped
    }

    /// Number of bytes buffered but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
