use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_frame, Frame, FrameConfig, FRAME_OVERHEAD, MAX_PAYLOAD};
use crate::error::{FrameError, Result};
use crate::message::{Command, Response};

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MAX_PAYLOAD + FRAME_OVERHEAD),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.start, frame.payload.as_ref())
    }

    /// Encode and send a request.
    pub fn send_command(&mut self, command: &Command) -> Result<()> {
        self.write_frame(&command.to_frame())
    }

    /// Encode and send a response.
    pub fn send_response(&mut self, response: &Response) -> Result<()> {
        self.write_frame(&response.to_frame())
    }

    /// Encode and send `payload` behind `start`.
    ///
    /// A write timeout before the first byte leaves the wire untouched and is
    /// reported as `FrameError::Io`. Once part of a frame is out, timeouts are
    /// retried until the rest follows, so the peer never sees a torn frame.
    pub fn send(&mut self, start: u8, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(start, payload, &mut self.buf)?;
        trace!(start, len = payload.len(), "writing frame");

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if offset > 0 && is_write_timeout(&err) => {
                    trace!(offset, total = self.buf.len(), "partial frame, retrying write");
                    continue;
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

fn is_write_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::category::{print, Category};
    use crate::codec::{REQUEST_START, RESPONSE_OK};
    use crate::message::ErrorCode;

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        writer.into_inner().into_inner()
    }

    #[test]
    fn write_command_bytes() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        let start = Command::invoke(Category::Print, print::START, &[0xFF, 0x00]);

        writer.send_command(&start).unwrap();

        assert_eq!(written(writer), [0xBD, 0x04, 0x04, 0x01, 0xFF, 0x00, 0xCC]);
    }

    #[test]
    fn write_multiple_responses() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));

        writer.send_response(&Response::ack()).unwrap();
        writer
            .send_response(&Response::error(ErrorCode::NoBattery))
            .unwrap();

        assert_eq!(
            written(writer),
            [0xA0, 0x01, 0x00, 0xCC, 0xA1, 0x01, 0x04, 0xCC]
        );
    }

    #[test]
    fn write_frame_method() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.write_frame(&Frame::new(RESPONSE_OK, vec![0x2Au8])).unwrap();
        assert_eq!(written(writer), [0xA0, 0x01, 0x2A, 0xCC]);
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::new()), cfg);

        let err = writer.send(REQUEST_START, b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
        assert!(written(writer).is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send_command(&Command::Ping).unwrap();

        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(writer.get_ref().data, [0xBD, 0x00, 0xCC]);
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = FrameWriter::new(writer_impl);
        writer.send_response(&Response::ack()).unwrap();

        assert_eq!(writer.into_inner().data, [0xA0, 0x01, 0x00, 0xCC]);
    }

    #[test]
    fn write_timeout_is_reported() {
        let mut writer = FrameWriter::new(BlockedWriter);
        let err = writer.send_command(&Command::Ping).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn partial_frame_is_finished_after_a_timeout() {
        let mut writer = FrameWriter::new(HalfThenBlock::default());
        let start = Command::invoke(Category::Print, print::START, &[0xFF, 0x00]);

        writer.send_command(&start).unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data, [0xBD, 0x04, 0x04, 0x01, 0xFF, 0x00, 0xCC]);
        assert!(inner.blocked >= 1);
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send_command(&Command::Ping).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn written_bytes_decode() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        let description = Response::data(&b"\x10\x10SD-PHEAD-1"[..]);
        writer.send_response(&description).unwrap();

        let mut framed = crate::reader::FrameReader::responses(Cursor::new(written(writer)));
        assert_eq!(framed.read_response().unwrap(), description);
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    /// Takes half of the first buffer, times out once, then takes the rest.
    #[derive(Default)]
    struct HalfThenBlock {
        data: Vec<u8>,
        blocked: usize,
        block_next: bool,
    }

    impl Write for HalfThenBlock {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.data.is_empty() {
                let half = buf.len() / 2;
                self.data.extend_from_slice(&buf[..half]);
                self.block_next = true;
                return Ok(half);
            }
            if self.block_next {
                self.block_next = false;
                self.blocked += 1;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BlockedWriter;

    impl Write for BlockedWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
