//! UART links through the `serialport` crate.
//!
//! Covers USB-serial adapters wired to the head's UART as well as
//! `/dev/rfcommN` devices created by `rfcomm bind`.

use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

/// Baud rate the print head firmware configures its UART with.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Open `port_name` at `baud_rate` (8N1, no flow control).
///
/// Bytes already sitting in the input buffer are dropped so a stale reply
/// from a previous session cannot be mistaken for the next response.
pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<LinkStream> {
    let connect_err = |err: serialport::Error| TransportError::Connect {
        target: port_name.to_string(),
        source: err.into(),
    };

    let port = serialport::new(port_name, baud_rate)
        .timeout(timeout)
        .open()
        .map_err(connect_err)?;
    port.clear(serialport::ClearBuffer::Input)
        .map_err(connect_err)?;

    debug!(port = port_name, baud_rate, "serial link up");
    Ok(LinkStream::from_serial(port))
}
