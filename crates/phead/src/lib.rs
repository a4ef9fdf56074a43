//! Host tools and device simulator for the SmallDrop print head protocol.
//!
//! The print head is driven over a byte link (UART, Bluetooth RFCOMM, or a
//! local socket for the simulator) with small `0xBD`-framed requests, each
//! answered by one `0xA0` (OK) or `0xA1` (error) frame.
//!
//! # Crate Structure
//!
//! - [`transport`]: Links to a head: Unix sockets, serial ports, RFCOMM
//! - [`frame`]: Frame codec, command/response types, category tables
//! - [`peer`]: Device dispatcher and sessions, host request link (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use phead_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use phead_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use phead_peer::*;
}
