//! `tokio_util::codec` adapter for async links.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{decode_frame_limited, encode_frame, resync, Direction, Frame, MAX_PAYLOAD};
use crate::error::FrameError;
use crate::message::{Command, Response};

/// Frames a byte stream for `FramedRead` / `FramedWrite`.
///
/// Corrupted frames are skipped rather than returned as errors, since a
/// decoder error ends a `FramedRead` stream and serial links pick up line
/// noise.
#[derive(Debug, Clone)]
pub struct PheadCodec {
    direction: Direction,
    max_payload_size: usize,
}

impl PheadCodec {
    /// Codec decoding frames travelling in `direction`.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            max_payload_size: MAX_PAYLOAD,
        }
    }

    /// Device side: decodes requests.
    pub fn device() -> Self {
        Self::new(Direction::Request)
    }

    /// Host side: decodes responses.
    pub fn host() -> Self {
        Self::new(Direction::Response)
    }

    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }
}

impl Decoder for PheadCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        loop {
            match decode_frame_limited(src, self.direction, self.max_payload_size) {
                Err(err) if err.needs_resync() => {
                    let dropped = resync(src, self.direction);
                    warn!(%err, dropped, "skipping corrupted frame");
                }
                other => return other,
            }
        }
    }
}

impl Encoder<Frame> for PheadCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(item.start, &item.payload, dst)
    }
}

impl Encoder<Command> for PheadCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), FrameError> {
        item.encode(dst)
    }
}

impl Encoder<Response> for PheadCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), FrameError> {
        item.encode(dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::category::{general, Category};

    #[tokio::test]
    async fn framed_read_decodes_requests() {
        let wire: &[u8] = &[0xBD, 0x00, 0xCC, 0xBD, 0x02, 0x01, 0x03, 0xCC];
        let mut framed = FramedRead::new(wire, PheadCodec::device());

        let ping = framed.next().await.unwrap().unwrap();
        assert!(ping.is_ping());

        let frame = framed.next().await.unwrap().unwrap();
        assert_eq!(
            Command::from_frame(&frame).unwrap(),
            Command::invoke(Category::General, general::DESCRIPTION, &[])
        );
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn corrupted_frame_does_not_end_the_stream() {
        let wire: &[u8] = &[0x55, 0xBD, 0x02, 0x04, 0x03, 0xFF, 0x00, 0xCC, 0xBD, 0x00, 0xCC];
        let mut framed = FramedRead::new(wire, PheadCodec::device());

        let frame = framed.next().await.unwrap().unwrap();
        assert!(frame.is_ping());
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn framed_write_encodes_responses() {
        let mut framed = FramedWrite::new(Vec::new(), PheadCodec::device());

        framed.send(Response::ack()).await.unwrap();
        framed
            .send(Response::error(crate::message::ErrorCode::UvDisabled))
            .await
            .unwrap();

        assert_eq!(
            framed.get_ref().as_slice(),
            &[0xA0, 0x01, 0x00, 0xCC, 0xA1, 0x01, 0x06, 0xCC]
        );
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_on_encode() {
        let mut framed = FramedWrite::new(Vec::new(), PheadCodec::host());
        let err = framed
            .send(Frame::new(crate::codec::REQUEST_START, vec![0u8; 300]))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }
}
