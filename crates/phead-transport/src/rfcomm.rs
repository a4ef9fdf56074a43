//! Bluetooth RFCOMM client sockets (Linux, BlueZ).
//!
//! The print head ships with an HC-05 style serial bridge, which shows up as
//! an RFCOMM service. Connecting needs nothing beyond the socket API, so this
//! talks to the kernel directly instead of pulling in a Bluetooth stack.

use std::fmt;
use std::fs::File;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

const AF_BLUETOOTH: libc::c_int = 31;
const BTPROTO_RFCOMM: libc::c_int = 3;

/// Channel the HC-05 bridge advertises its serial service on.
pub const DEFAULT_CHANNEL: u8 = 1;

/// `struct sockaddr_rc` from `<bluetooth/rfcomm.h>`.
#[repr(C)]
struct SockaddrRc {
    rc_family: libc::sa_family_t,
    rc_bdaddr: [u8; 6],
    rc_channel: u8,
}

/// A Bluetooth device address, e.g. `98:D3:31:FC:23:18`.
///
/// Stored in display order; the kernel wants it reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    fn to_kernel_order(self) -> [u8; 6] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }
}

impl FromStr for BdAddr {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts
                .next()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| TransportError::InvalidAddress(s.to_string()))?;
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| TransportError::InvalidAddress(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(TransportError::InvalidAddress(s.to_string()));
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Open an RFCOMM connection to `addr` on `channel` (blocking).
///
/// `timeout` becomes the read and write timeout of the returned link.
pub fn connect(addr: BdAddr, channel: u8, timeout: Option<Duration>) -> Result<LinkStream> {
    let connect_err = |source: std::io::Error| TransportError::Connect {
        target: format!("{addr} channel {channel}"),
        source,
    };

    // SAFETY: plain socket(2) call; the result is checked before use.
    let fd = unsafe {
        libc::socket(
            AF_BLUETOOTH,
            libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
            BTPROTO_RFCOMM,
        )
    };
    if fd < 0 {
        return Err(connect_err(std::io::Error::last_os_error()));
    }
    // SAFETY: `fd` is a freshly created descriptor owned by nobody else.
    let socket = unsafe { OwnedFd::from_raw_fd(fd) };

    let sockaddr = SockaddrRc {
        rc_family: AF_BLUETOOTH as libc::sa_family_t,
        rc_bdaddr: addr.to_kernel_order(),
        rc_channel: channel,
    };
    // SAFETY: `sockaddr` is a valid `sockaddr_rc` that outlives the call and
    // the length passed matches its size.
    let rc = unsafe {
        libc::connect(
            socket.as_raw_fd(),
            (&sockaddr as *const SockaddrRc).cast::<libc::sockaddr>(),
            std::mem::size_of::<SockaddrRc>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(connect_err(std::io::Error::last_os_error()));
    }

    debug!(%addr, channel, "rfcomm link up");

    let mut link = LinkStream::from_rfcomm(File::from(socket));
    link.set_read_timeout(timeout)?;
    link.set_write_timeout(timeout)?;
    Ok(link)
}

/// Apply `SO_RCVTIMEO` / `SO_SNDTIMEO` to a socket held as a `File`.
pub(crate) fn set_socket_timeout(
    socket: &File,
    option: libc::c_int,
    timeout: Option<Duration>,
) -> Result<()> {
    let tv = match timeout {
        Some(d) if d.is_zero() => {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "zero timeout is not allowed",
            )))
        }
        Some(d) => libc::timeval {
            tv_sec: d.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_usec: d.subsec_micros() as libc::suseconds_t,
        },
        None => libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
    };

    // SAFETY: `tv` is a valid timeval and the length passed matches its size.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            option,
            (&tv as *const libc::timeval).cast::<libc::c_void>(),
            std::mem::size_of::<libc::timeval>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_address() {
        let addr: BdAddr = "98:D3:31:FC:23:18".parse().unwrap();
        assert_eq!(addr.0, [0x98, 0xD3, 0x31, 0xFC, 0x23, 0x18]);
        assert_eq!(addr.to_string(), "98:D3:31:FC:23:18");
    }

    #[test]
    fn kernel_order_is_reversed() {
        let addr: BdAddr = "98:d3:31:fc:23:18".parse().unwrap();
        assert_eq!(addr.to_kernel_order(), [0x18, 0x23, 0xFC, 0x31, 0xD3, 0x98]);
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "98:D3:31:FC:23", "98:D3:31:FC:23:18:00", "98-D3-31-FC-23-18", "9:D3:31:FC:23:18", "ZZ:D3:31:FC:23:18"] {
            assert!(
                matches!(bad.parse::<BdAddr>(), Err(TransportError::InvalidAddress(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn sockaddr_layout_matches_kernel() {
        assert_eq!(std::mem::size_of::<SockaddrRc>(), 10);
    }
}
