//! Decoded requests and responses.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::category::{category_name, subcommand_name, Category};
use crate::codec::{encode_frame, Frame, REQUEST_START, RESPONSE_ERROR, RESPONSE_OK};
use crate::error::{FrameError, Result};

/// Error codes carried by an `ERROR (0xA1)` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Unknown category or subcommand, or a malformed argument length.
    BadCommand,
    /// Link-level failure reported by the firmware.
    BadComms,
    /// UV map selector out of range.
    BadUvMap,
    /// Battery read while running on external power.
    NoBattery,
    /// Temperature command while the subsystem is disabled.
    TempDisabled,
    /// UV command while the subsystem is disabled.
    UvDisabled,
    /// Argument out of its accepted range.
    InvalidArg,
    /// Catch-all firmware failure.
    Other,
    /// A code this library does not know.
    Unknown(u8),
}

impl ErrorCode {
    /// Wire value.
    pub fn code(self) -> u8 {
        match self {
            ErrorCode::BadCommand => 0x01,
            ErrorCode::BadComms => 0x02,
            ErrorCode::BadUvMap => 0x03,
            ErrorCode::NoBattery => 0x04,
            ErrorCode::TempDisabled => 0x05,
            ErrorCode::UvDisabled => 0x06,
            ErrorCode::InvalidArg => 0x07,
            ErrorCode::Other => 0xFF,
            ErrorCode::Unknown(code) => code,
        }
    }

    /// Upper-case protocol name.
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::BadCommand => "BAD_COMMAND",
            ErrorCode::BadComms => "BAD_COMMS",
            ErrorCode::BadUvMap => "BAD_UV_MAP",
            ErrorCode::NoBattery => "NO_BATTERY",
            ErrorCode::TempDisabled => "TEMP_DISABLED",
            ErrorCode::UvDisabled => "UV_DISABLED",
            ErrorCode::InvalidArg => "INVALID_ARG",
            ErrorCode::Other => "OTHER",
            ErrorCode::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for ErrorCode {
    fn from(code: u8) -> Self {
        match code {
            0x01 => ErrorCode::BadCommand,
            0x02 => ErrorCode::BadComms,
            0x03 => ErrorCode::BadUvMap,
            0x04 => ErrorCode::NoBattery,
            0x05 => ErrorCode::TempDisabled,
            0x06 => ErrorCode::UvDisabled,
            0x07 => ErrorCode::InvalidArg,
            0xFF => ErrorCode::Other,
            other => ErrorCode::Unknown(other),
        }
    }
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.code())
    }
}

/// A decoded request.
///
/// The ping probe has no category or subcommand at all, so it is its own
/// variant rather than a request with an empty payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `BD 00 CC`.
    Ping,
    /// Any other request; the payload is `category | subcommand | args`, but
    /// may be shorter when the host sent garbage.
    Request(Bytes),
}

impl Command {
    /// Build a category command.
    pub fn invoke(category: Category, subcommand: u8, args: &[u8]) -> Self {
        let mut payload = BytesMut::with_capacity(2 + args.len());
        payload.put_u8(category.code());
        payload.put_u8(subcommand);
        payload.put_slice(args);
        Command::Request(payload.freeze())
    }

    /// Interpret a request frame. A zero-length request is always `Ping`.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        if frame.start != REQUEST_START {
            return Err(FrameError::BadStart(frame.start));
        }
        if frame.payload.is_empty() {
            return Ok(Command::Ping);
        }
        Ok(Command::Request(frame.payload.clone()))
    }

    /// The frame carrying this command.
    pub fn to_frame(&self) -> Frame {
        Frame::new(REQUEST_START, self.payload().clone())
    }

    /// Encode onto the end of `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        encode_frame(REQUEST_START, self.payload(), dst)
    }

    /// Raw payload (empty for ping).
    pub fn payload(&self) -> &Bytes {
        static EMPTY: Bytes = Bytes::from_static(&[]);
        match self {
            Command::Ping => &EMPTY,
            Command::Request(payload) => payload,
        }
    }

    pub fn is_ping(&self) -> bool {
        matches!(self, Command::Ping)
    }

    /// Category byte, if present.
    pub fn category(&self) -> Option<u8> {
        self.payload().first().copied()
    }

    /// Subcommand byte, if present.
    pub fn subcommand(&self) -> Option<u8> {
        self.payload().get(1).copied()
    }

    /// Everything after category and subcommand.
    pub fn args(&self) -> &[u8] {
        self.payload().get(2..).unwrap_or_default()
    }

    /// `category/subcommand` name for logs.
    pub fn describe(&self) -> String {
        match (self, self.category(), self.subcommand()) {
            (Command::Ping, _, _) => "ping".to_string(),
            (_, Some(cat), Some(sub)) => match subcommand_name(cat, sub) {
                Some(name) => format!("{}/{name}", category_name(cat)),
                None => format!("{}/0x{sub:02X}", category_name(cat)),
            },
            _ => "truncated".to_string(),
        }
    }
}

/// A reply to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `A0 | len | payload | CC`.
    Ok(Bytes),
    /// `A1 | 01 | code | CC`.
    Error(ErrorCode),
}

impl Response {
    /// The plain acknowledgement: `OK` with a single `0x00`.
    pub fn ack() -> Self {
        Response::Ok(Bytes::from_static(&[0x00]))
    }

    /// `OK` carrying `payload`.
    pub fn data(payload: impl Into<Bytes>) -> Self {
        Response::Ok(payload.into())
    }

    pub fn error(code: ErrorCode) -> Self {
        Response::Error(code)
    }

    /// Interpret a response frame.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        match frame.start {
            RESPONSE_OK => Ok(Response::Ok(frame.payload.clone())),
            RESPONSE_ERROR => match frame.payload.as_ref() {
                [code] => Ok(Response::Error(ErrorCode::from(*code))),
                other => Err(FrameError::MalformedError(other.len())),
            },
            other => Err(FrameError::BadStart(other)),
        }
    }

    /// The frame carrying this response.
    pub fn to_frame(&self) -> Frame {
        match self {
            Response::Ok(payload) => Frame::new(RESPONSE_OK, payload.clone()),
            Response::Error(code) => Frame::new(RESPONSE_ERROR, vec![code.code()]),
        }
    }

    /// Encode onto the end of `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        match self {
            Response::Ok(payload) => encode_frame(RESPONSE_OK, payload, dst),
            Response::Error(code) => encode_frame(RESPONSE_ERROR, &[code.code()], dst),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }

    /// Success payload, or the error code.
    pub fn into_result(self) -> std::result::Result<Bytes, ErrorCode> {
        match self {
            Response::Ok(payload) => Ok(payload),
            Response::Error(code) => Err(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_frame, Direction};
    use crate::category::{calibration, general};

    fn wire_of(response: &Response) -> Vec<u8> {
        let mut buf = BytesMut::new();
        response.encode(&mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn invoke_builds_request_bytes() {
        let cmd = Command::invoke(Category::Calibration, calibration::CALIBRATE, &[0x64]);
        let mut buf = BytesMut::new();
        cmd.encode(&mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0xBD, 0x03, 0x02, 0x01, 0x64, 0xCC]);
        assert_eq!(cmd.category(), Some(0x02));
        assert_eq!(cmd.subcommand(), Some(0x01));
        assert_eq!(cmd.args(), &[0x64]);
    }

    #[test]
    fn ping_is_distinct_from_category_commands() {
        let mut buf = BytesMut::from(&[0xBD, 0x00, 0xCC][..]);
        let frame = decode_frame(&mut buf, Direction::Request).unwrap().unwrap();
        let cmd = Command::from_frame(&frame).unwrap();

        assert_eq!(cmd, Command::Ping);
        assert_eq!(cmd.category(), None);
        assert!(cmd.args().is_empty());
        assert_eq!(cmd.to_frame(), Frame::ping());
    }

    #[test]
    fn short_payload_has_no_subcommand() {
        let cmd = Command::Request(Bytes::from_static(&[0x01]));
        assert_eq!(cmd.category(), Some(0x01));
        assert_eq!(cmd.subcommand(), None);
        assert!(cmd.args().is_empty());
        assert_eq!(cmd.describe(), "truncated");
    }

    #[test]
    fn describe_names_known_commands() {
        assert_eq!(Command::Ping.describe(), "ping");
        assert_eq!(
            Command::invoke(Category::General, general::DESCRIPTION, &[]).describe(),
            "general/description"
        );
        assert_eq!(
            Command::invoke(Category::Print, 0x05, &[]).describe(),
            "print/0x05"
        );
    }

    #[test]
    fn response_wire_format() {
        assert_eq!(wire_of(&Response::ack()), [0xA0, 0x01, 0x00, 0xCC]);
        assert_eq!(
            wire_of(&Response::error(ErrorCode::InvalidArg)),
            [0xA1, 0x01, 0x07, 0xCC]
        );
    }

    #[test]
    fn response_from_frame() {
        let ok = Frame::new(RESPONSE_OK, vec![0x2Au8, 0x00]);
        assert_eq!(
            Response::from_frame(&ok).unwrap(),
            Response::data(vec![0x2Au8, 0x00])
        );

        let err = Frame::new(RESPONSE_ERROR, vec![0x04u8]);
        assert_eq!(
            Response::from_frame(&err).unwrap(),
            Response::Error(ErrorCode::NoBattery)
        );
    }

    #[test]
    fn error_response_must_carry_one_byte() {
        let empty = Frame::new(RESPONSE_ERROR, Bytes::new());
        assert!(matches!(
            Response::from_frame(&empty),
            Err(FrameError::MalformedError(0))
        ));

        let long = Frame::new(RESPONSE_ERROR, vec![0x01u8, 0x02]);
        assert!(matches!(
            Response::from_frame(&long),
            Err(FrameError::MalformedError(2))
        ));
    }

    #[test]
    fn request_frame_is_not_a_response() {
        assert!(matches!(
            Response::from_frame(&Frame::ping()),
            Err(FrameError::BadStart(0xBD))
        ));
        let ok = Frame::new(RESPONSE_OK, vec![0x00u8]);
        assert!(matches!(
            Command::from_frame(&ok),
            Err(FrameError::BadStart(0xA0))
        ));
    }

    #[test]
    fn error_codes_roundtrip_through_bytes() {
        for code in [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0xFF, 0x42] {
            assert_eq!(ErrorCode::from(code).code(), code);
        }
        assert_eq!(ErrorCode::from(0x42), ErrorCode::Unknown(0x42));
        assert_eq!(ErrorCode::UvDisabled.to_string(), "UV_DISABLED (0x06)");
    }
}
