use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Start marker of every host → device frame.
pub const REQUEST_START: u8 = 0xBD;

/// Start marker of a successful device → host frame.
pub const RESPONSE_OK: u8 = 0xA0;

/// Start marker of an error device → host frame.
pub const RESPONSE_ERROR: u8 = 0xA1;

/// Terminal byte of every frame.
pub const END_MARKER: u8 = 0xCC;

/// Start (1) + length (1) + end (1).
pub const FRAME_OVERHEAD: usize = 3;

/// Largest payload a one-byte length can describe while keeping the whole
/// frame within 256 bytes.
pub const MAX_PAYLOAD: usize = 253;

/// Which side of the link a byte stream comes from. Selects the start
/// markers a decoder accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Host → device: frames start with `0xBD`.
    Request,
    /// Device → host: frames start with `0xA0` or `0xA1`.
    Response,
}

impl Direction {
    /// True if `byte` can open a frame travelling in this direction.
    pub fn accepts(self, byte: u8) -> bool {
        match self {
            Direction::Request => byte == REQUEST_START,
            Direction::Response => byte == RESPONSE_OK || byte == RESPONSE_ERROR,
        }
    }

    /// The direction a start marker belongs to, if any.
    pub fn of(start: u8) -> Option<Self> {
        match start {
            REQUEST_START => Some(Direction::Request),
            RESPONSE_OK | RESPONSE_ERROR => Some(Direction::Response),
            _ => None,
        }
    }
}

/// One delimited frame: start marker plus payload. The length byte and the
/// end marker are implied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// `0xBD`, `0xA0` or `0xA1`.
    pub start: u8,
    /// The bytes between the length byte and the end marker.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(start: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            start,
            payload: payload.into(),
        }
    }

    /// The zero-length liveness probe `BD 00 CC`.
    pub fn ping() -> Self {
        Self::new(REQUEST_START, Bytes::new())
    }

    /// True for the zero-length request frame.
    pub fn is_ping(&self) -> bool {
        self.start == REQUEST_START && self.payload.is_empty()
    }

    /// Direction implied by the start marker.
    pub fn direction(&self) -> Option<Direction> {
        Direction::of(self.start)
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_frame(self.start, &self.payload, &mut dst)?;
        Ok(dst.freeze())
    }
}

/// Encode a frame into the wire format.
///
/// ```text
/// ┌───────────┬──────────┬──────────────────┬──────┐
/// │ Start     │ Length   │ Payload          │ End  │
/// │ BD/A0/A1  │ (1B)     │ (Length bytes)   │ CC   │
/// └───────────┴──────────┴──────────────────┴──────┘
/// ```
///
/// There is no checksum; the markers and the length are all a receiver has
/// to stay in sync.
pub fn encode_frame(start: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(FRAME_OVERHEAD + payload.len());
    dst.put_u8(start);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    dst.put_u8(END_MARKER);
    Ok(())
}

/// Validate the frame at the front of `src` and return its total wire size.
fn check_frame(src: &[u8], direction: Direction, max_payload: usize) -> Result<usize> {
    let Some(&start) = src.first() else {
        return Err(FrameError::Incomplete {
            needed: FRAME_OVERHEAD,
        });
    };
    if !direction.accepts(start) {
        return Err(FrameError::BadStart(start));
    }

    let Some(&length) = src.get(1) else {
        return Err(FrameError::Incomplete {
            needed: FRAME_OVERHEAD - src.len(),
        });
    };
    let length = length as usize;
    if length > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: length,
            max: max_payload,
        });
    }

    let total = length + FRAME_OVERHEAD;
    if src.len() < total {
        return Err(FrameError::Incomplete {
            needed: total - src.len(),
        });
    }

    let end = src[total - 1];
    if end != END_MARKER {
        return Err(FrameError::BadEnd(end));
    }
    Ok(total)
}

/// Decode the frame at the front of `src` without consuming anything.
///
/// `Incomplete` is resumable: append more bytes and call again. `BadStart`,
/// `BadEnd` and `PayloadTooLarge` are not; see [`resync`].
pub fn parse_frame(src: &[u8], direction: Direction) -> Result<Frame> {
    let total = check_frame(src, direction, MAX_PAYLOAD)?;
    Ok(Frame {
        start: src[0],
        payload: Bytes::copy_from_slice(&src[2..total - 1]),
    })
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet, in
/// which case the buffer is left untouched. On success, consumes exactly the
/// frame bytes.
pub fn decode_frame(src: &mut BytesMut, direction: Direction) -> Result<Option<Frame>> {
    decode_frame_limited(src, direction, MAX_PAYLOAD)
}

/// [`decode_frame`] with a tighter payload limit, for peers with small
/// receive buffers.
pub fn decode_frame_limited(
    src: &mut BytesMut,
    direction: Direction,
    max_payload: usize,
) -> Result<Option<Frame>> {
    let total = match check_frame(src, direction, max_payload.min(MAX_PAYLOAD)) {
        Ok(total) => total,
        Err(FrameError::Incomplete { .. }) => return Ok(None),
        Err(err) => return Err(err),
    };

    let mut raw = src.split_to(total);
    let start = raw.get_u8();
    raw.advance(1);
    raw.truncate(total - FRAME_OVERHEAD);

    Ok(Some(Frame {
        start,
        payload: raw.freeze(),
    }))
}

/// Drop the leading byte of `src` and everything up to the next plausible
/// start marker. Returns the number of bytes discarded.
pub fn resync(src: &mut BytesMut, direction: Direction) -> usize {
    if src.is_empty() {
        return 0;
    }
    let skip = src[1..]
        .iter()
        .position(|&b| direction.accepts(b))
        .map_or(src.len(), |pos| pos + 1);
    src.advance(skip);
    skip
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest payload accepted or sent. Default and ceiling: 253 bytes.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_init_request() {
        let mut buf = BytesMut::new();
        encode_frame(REQUEST_START, &[0x01, 0x01], &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0xBD, 0x02, 0x01, 0x01, 0xCC]);
    }

    #[test]
    fn encode_ping_is_three_bytes() {
        let bytes = Frame::ping().to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), &[0xBD, 0x00, 0xCC]);
    }

    #[test]
    fn decode_roundtrip() {
        let frame = Frame::new(RESPONSE_OK, &b"\x10\x10SD-PHEAD-1"[..]);
        let mut buf = BytesMut::from(frame.to_bytes().unwrap().as_ref());

        let decoded = decode_frame(&mut buf, Direction::Response).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn roundtrip_every_length_and_marker() {
        for start in [REQUEST_START, RESPONSE_OK, RESPONSE_ERROR] {
            let direction = Direction::of(start).unwrap();
            for len in 0..=MAX_PAYLOAD {
                // markers inside the payload must not confuse the decoder
                let payload: Vec<u8> = (0..len).map(|i| [0xCC, 0xBD, i as u8][i % 3]).collect();
                let frame = Frame::new(start, payload);
                let wire = frame.to_bytes().unwrap();
                assert_eq!(wire.len(), len + FRAME_OVERHEAD);

                assert_eq!(parse_frame(&wire, direction).unwrap(), frame, "{start:02X}/{len}");
                let mut buf = BytesMut::from(wire.as_ref());
                assert_eq!(decode_frame(&mut buf, direction).unwrap(), Some(frame));
                assert!(buf.is_empty());
            }
        }
    }

    #[test]
    fn parse_ping() {
        let frame = parse_frame(&[0xBD, 0x00, 0xCC], Direction::Request).unwrap();
        assert!(frame.is_ping());
    }

    #[test]
    fn parse_bad_start() {
        let err = parse_frame(&[0xA0, 0x01, 0x00, 0xCC], Direction::Request).unwrap_err();
        assert!(matches!(err, FrameError::BadStart(0xA0)));

        let err = parse_frame(&[0xBD, 0x00, 0xCC], Direction::Response).unwrap_err();
        assert!(matches!(err, FrameError::BadStart(0xBD)));
    }

    #[test]
    fn parse_bad_end() {
        let err =
            parse_frame(&[0xBD, 0x02, 0x04, 0x03, 0xFF, 0x00, 0xCC], Direction::Request).unwrap_err();
        assert!(matches!(err, FrameError::BadEnd(0xFF)));
    }

    #[test]
    fn parse_incomplete_reports_missing_bytes() {
        for (input, needed) in [
            (&[][..], 3),
            (&[0xBD][..], 2),
            (&[0xBD, 0x03][..], 4),
            (&[0xBD, 0x03, 0x02, 0x01, 0x02][..], 1),
        ] {
            match parse_frame(input, Direction::Request) {
                Err(FrameError::Incomplete { needed: n }) => assert_eq!(n, needed, "{input:02X?}"),
                other => panic!("expected Incomplete for {input:02X?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn incomplete_then_complete_yields_same_frame() {
        let wire = [0xBD, 0x03, 0x02, 0x01, 0x64, 0xCC];
        let whole = parse_frame(&wire, Direction::Request).unwrap();

        for split in 0..wire.len() {
            let mut buf = BytesMut::from(&wire[..split]);
            assert!(decode_frame(&mut buf, Direction::Request).unwrap().is_none());
            assert_eq!(buf.len(), split, "incomplete decode must not consume");

            buf.extend_from_slice(&wire[split..]);
            let frame = decode_frame(&mut buf, Direction::Request).unwrap().unwrap();
            assert_eq!(frame, whole);
        }
    }

    #[test]
    fn decode_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(RESPONSE_OK, &[0x00], &mut buf).unwrap();
        encode_frame(RESPONSE_ERROR, &[0x07], &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, Direction::Response).unwrap().unwrap();
        let f2 = decode_frame(&mut buf, Direction::Response).unwrap().unwrap();
        assert_eq!((f1.start, f1.payload.as_ref()), (RESPONSE_OK, &[0x00][..]));
        assert_eq!((f2.start, f2.payload.as_ref()), (RESPONSE_ERROR, &[0x07][..]));
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let mut buf = BytesMut::new();
        let err = encode_frame(REQUEST_START, &[0u8; MAX_PAYLOAD + 1], &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 254, max: 253 }));
        assert!(buf.is_empty());

        encode_frame(REQUEST_START, &[0u8; MAX_PAYLOAD], &mut buf).unwrap();
        assert_eq!(buf.len(), 256);
    }

    #[test]
    fn limited_decode_rejects_long_declared_length() {
        let mut buf = BytesMut::from(&[0xBD, 0x20][..]);
        let err = decode_frame_limited(&mut buf, Direction::Request, 16).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 32, max: 16 }));
        assert!(err.needs_resync());
    }

    #[test]
    fn resync_skips_to_next_start_marker() {
        let mut buf = BytesMut::from(&[0xBD, 0x02, 0x04, 0x03, 0xBD, 0x00, 0xCC][..]);
        assert!(decode_frame(&mut buf, Direction::Request).is_err());

        assert_eq!(resync(&mut buf, Direction::Request), 4);
        let frame = decode_frame(&mut buf, Direction::Request).unwrap().unwrap();
        assert!(frame.is_ping());
    }

    #[test]
    fn resync_without_marker_drains_buffer() {
        let mut buf = BytesMut::from(&[0xBD, 0x02, 0x04, 0x03, 0xFF, 0x00, 0xCC][..]);
        assert_eq!(resync(&mut buf, Direction::Request), 7);
        assert!(buf.is_empty());
        assert_eq!(resync(&mut buf, Direction::Request), 0);
    }

    #[test]
    fn direction_of_markers() {
        assert_eq!(Direction::of(0xBD), Some(Direction::Request));
        assert_eq!(Direction::of(0xA0), Some(Direction::Response));
        assert_eq!(Direction::of(0xA1), Some(Direction::Response));
        assert_eq!(Direction::of(0xCC), None);
        assert_eq!(Frame::new(RESPONSE_ERROR, vec![1u8]).direction(), Some(Direction::Response));
    }
}
