use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use phead_transport::{LinkStream, UnixDomainSocket};
use tracing::info;

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::profile::DeviceProfile;
use crate::session::{DeviceSession, SessionConfig};

/// A simulated print head accepting host connections on a Unix socket.
///
/// Every accepted connection gets its own session and its own
/// [`DeviceState`](crate::state::DeviceState), built from the profile.
pub struct DeviceListener {
    socket: UnixDomainSocket,
    dispatcher: Dispatcher,
    session_config: SessionConfig,
    next_session_id: AtomicU64,
}

impl DeviceListener {
    /// Bind to a Unix domain socket path, simulating the reference head.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let socket = UnixDomainSocket::bind(path)?;
        Ok(Self {
            socket,
            dispatcher: Dispatcher::default(),
            session_config: SessionConfig::default(),
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Simulate the head described by `profile`.
    pub fn with_profile(mut self, profile: &DeviceProfile) -> Result<Self> {
        profile.validate()?;
        self.dispatcher = Dispatcher::from_profile(profile);
        Ok(self)
    }

    /// Override session behaviour.
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Accept the next host and start a fresh session for it.
    pub fn accept(&self) -> Result<DeviceSession<LinkStream, LinkStream>> {
        let stream = self.socket.accept()?;
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = DeviceSession::from_stream(
            stream,
            self.dispatcher.clone(),
            self.session_config.clone(),
        )?
        .with_id(format!("session-{id}"));
        info!(session = session.id(), "host connected");
        Ok(session)
    }

    /// Bound socket path.
    pub fn path(&self) -> &Path {
        self.socket.path()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
