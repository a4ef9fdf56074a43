use std::fmt;
use std::io;

use phead_frame::FrameError;
use phead_peer::PeerError;
use phead_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
/// The device answered with an error response.
pub const DEVICE_ERROR: i32 = 20;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidAddress(_) | TransportError::PathTooLong { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        FrameError::PayloadTooLarge { .. }
        | FrameError::BadStart(_)
        | FrameError::BadEnd(_)
        | FrameError::Incomplete { .. }
        | FrameError::MalformedError(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        PeerError::Device(_) => CliError::new(DEVICE_ERROR, format!("{context}: {err}")),
        PeerError::Disconnected(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        PeerError::UnexpectedResponse(_)
        | PeerError::InvalidProfile(_)
        | PeerError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        PeerError::ProfileIo { .. } => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use phead_frame::ErrorCode;

    use super::*;

    #[test]
    fn device_errors_map_to_20() {
        let err = peer_error("send failed", PeerError::Device(ErrorCode::NoBattery));
        assert_eq!(err.code, DEVICE_ERROR);
        assert!(err.message.contains("NO_BATTERY"));
    }

    #[test]
    fn timeouts_map_to_124() {
        let err = peer_error("ping failed", PeerError::Timeout(Duration::from_secs(1)));
        assert_eq!(err.code, TIMEOUT);

        let io = io::Error::from(io::ErrorKind::WouldBlock);
        assert_eq!(frame_error("read", FrameError::Io(io)).code, TIMEOUT);
    }

    #[test]
    fn missing_socket_is_a_transport_error() {
        let err = TransportError::Connect {
            target: "/tmp/nope.sock".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(transport_error("connect failed", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn bad_profile_is_invalid_data() {
        let err = peer_error("profile", PeerError::InvalidProfile("uv_map".to_string()));
        assert_eq!(err.code, DATA_INVALID);
    }
}
