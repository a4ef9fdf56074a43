//! Byte-stream links between a host and a print head controller.
//!
//! The print head speaks the same protocol over every link it supports:
//! - Unix domain sockets (local simulator, tests)
//! - Serial ports / UART (behind the `serial` feature)
//! - Bluetooth RFCOMM sockets (Linux)
//!
//! This is the lowest layer. Nothing here knows about frames; everything
//! else reads and writes through the [`LinkStream`] type provided here.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

#[cfg(target_os = "linux")]
pub mod rfcomm;

#[cfg(feature = "serial")]
pub mod serial;

pub use error::{Result, TransportError};
pub use traits::LinkStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;

#[cfg(target_os = "linux")]
pub use rfcomm::BdAddr;
