//! Framing for the print head command/response protocol.
//!
//! Every frame on the wire is:
//! - a start marker: `0xBD` for requests, `0xA0` (ok) / `0xA1` (error) for
//!   responses
//! - a 1-byte payload length
//! - the payload
//! - the end marker `0xCC`
//!
//! There is no checksum. A request payload is `category | subcommand | args`;
//! the zero-length request `BD 00 CC` is the ping probe.

pub mod category;
pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use category::{category_name, parse_subcommand, subcommand_name, Category};
pub use codec::{
    decode_frame, decode_frame_limited, encode_frame, parse_frame, resync, Direction, Frame,
    FrameConfig, END_MARKER, FRAME_OVERHEAD, MAX_PAYLOAD, REQUEST_START, RESPONSE_ERROR,
    RESPONSE_OK,
};
pub use error::{FrameError, Result};
pub use message::{Command, ErrorCode, Response};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use tokio_codec::PheadCodec;
