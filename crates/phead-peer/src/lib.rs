//! Both ends of a print head link.
//!
//! The device side turns request frames into response frames: a static
//! dispatch table, per-connection [`DeviceState`], and sessions that serve
//! one host each. The host side sends commands and waits for answers,
//! re-sending when a response is lost.

pub mod dispatch;
pub mod error;
pub mod host;
#[cfg(unix)]
pub mod listener;
pub mod profile;
pub mod session;
pub mod state;

pub use dispatch::{dispatch, handlers, lookup, ArgShape, Dispatcher, Handler, Precondition};
pub use error::{PeerError, Result};
pub use host::{HostConfig, HostLink};
#[cfg(unix)]
pub use host::{connect, connect_with_config};
#[cfg(unix)]
pub use listener::DeviceListener;
pub use profile::{Descriptor, DeviceProfile};
pub use session::{DeviceSession, Exchange, SessionConfig, SessionStats};
pub use state::{DeviceState, PowerMode};
