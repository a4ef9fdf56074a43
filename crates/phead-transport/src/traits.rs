use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A connected link to a print head (or to a host, on the device side).
///
/// Every transport the device supports is a plain byte pipe; this type hides
/// which one is in use so the framing layer only ever sees `Read + Write`.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    #[cfg(target_os = "linux")]
    Rfcomm(std::fs::File),
    #[cfg(feature = "serial")]
    Serial(Box<dyn serialport::SerialPort>),
}

/// serialport has no "block forever"; an hour is close enough for an idle link.
#[cfg(feature = "serial")]
const SERIAL_BLOCKING_TIMEOUT: Duration = Duration::from_secs(3600);

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.read(buf),
            #[cfg(target_os = "linux")]
            LinkStreamInner::Rfcomm(socket) => socket.read(buf),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.write(buf),
            #[cfg(target_os = "linux")]
            LinkStreamInner::Rfcomm(socket) => socket.write(buf),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.flush(),
            #[cfg(target_os = "linux")]
            LinkStreamInner::Rfcomm(socket) => socket.flush(),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port.flush(),
        }
    }
}

impl LinkStream {
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: LinkStreamInner::Unix(stream),
        }
    }

    #[cfg(target_os = "linux")]
    pub(crate) fn from_rfcomm(socket: std::fs::File) -> Self {
        Self {
            inner: LinkStreamInner::Rfcomm(socket),
        }
    }

    #[cfg(feature = "serial")]
    pub(crate) fn from_serial(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: LinkStreamInner::Serial(port),
        }
    }

    /// Wrap one end of an in-process socket pair. Handy for tests and for
    /// running a simulated device on a thread.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Set the read timeout. `None` blocks until data arrives.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(target_os = "linux")]
            LinkStreamInner::Rfcomm(socket) => {
                crate::rfcomm::set_socket_timeout(socket, libc::SO_RCVTIMEO, timeout)
            }
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port
                .set_timeout(timeout.unwrap_or(SERIAL_BLOCKING_TIMEOUT))
                .map_err(|err| std::io::Error::from(err).into()),
        }
    }

    /// Set the write timeout. Serial ports share one timeout for both
    /// directions, so this is a no-op there.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(target_os = "linux")]
            LinkStreamInner::Rfcomm(socket) => {
                crate::rfcomm::set_socket_timeout(socket, libc::SO_SNDTIMEO, timeout)
            }
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(_) => {
                let _ = timeout;
                Ok(())
            }
        }
    }

    /// Duplicate the handle so reads and writes can be owned separately.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
            #[cfg(target_os = "linux")]
            LinkStreamInner::Rfcomm(socket) => Ok(Self::from_rfcomm(socket.try_clone()?)),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => {
                let cloned = port.try_clone().map_err(std::io::Error::from)?;
                Ok(Self::from_serial(cloned))
            }
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(_) => "unix-domain-socket",
            #[cfg(target_os = "linux")]
            LinkStreamInner::Rfcomm(_) => "rfcomm",
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(_) => "serial",
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
