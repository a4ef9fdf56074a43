use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use phead_frame::{Command, FrameError, FrameReader, FrameWriter, Response};
use phead_transport::LinkStream;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::{PeerError, Result};
use crate::state::DeviceState;

/// Device-side session behaviour.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// End the session when no frame arrives for this long. The firmware
    /// drops a host after 5 s without traffic; `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Read timeout applied to links opened by [`DeviceSession::from_stream`],
    /// so that `run` notices its stop flag.
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// What one call to [`DeviceSession::serve_one`] did.
#[derive(Debug)]
pub enum Exchange {
    /// A request came in and was answered.
    Answered { command: Command, response: Response },
    /// Bytes came in but did not form a frame; nothing was sent back.
    Dropped(FrameError),
    /// The read timed out with nothing to do.
    Idle,
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub requests: u64,
    pub error_responses: u64,
    pub dropped_frames: u64,
}

/// Serves one host connection: one request in, one response out.
///
/// Owns the connection's [`DeviceState`]; nothing outside the session can
/// reach it while the session runs.
pub struct DeviceSession<R, W> {
    id: String,
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    dispatcher: Dispatcher,
    state: DeviceState,
    config: SessionConfig,
    last_activity: Instant,
    stats: SessionStats,
}

impl<R: Read, W: Write> DeviceSession<R, W> {
    /// Session starting from the dispatcher's power-on state.
    pub fn new(reader: R, writer: W, dispatcher: Dispatcher) -> Self {
        Self::with_config(reader, writer, dispatcher, SessionConfig::default())
    }

    pub fn with_config(
        reader: R,
        writer: W,
        dispatcher: Dispatcher,
        config: SessionConfig,
    ) -> Self {
        Self {
            id: "session".to_string(),
            reader: FrameReader::requests(reader),
            writer: FrameWriter::new(writer),
            state: dispatcher.initial_state(),
            dispatcher,
            config,
            last_activity: Instant::now(),
            stats: SessionStats::default(),
        }
    }

    /// Name used in log lines.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Read one request, answer it, and report what happened.
    ///
    /// Framing errors are logged and swallowed: there is no frame to answer,
    /// so the host is left to time out and re-send.
    pub fn serve_one(&mut self) -> Result<Exchange> {
        let command = match self.reader.read_command() {
            Ok(command) => command,
            Err(err) if err.is_timeout() => {
                if let Some(limit) = self.config.idle_timeout {
                    if self.last_activity.elapsed() >= limit {
                        return Err(PeerError::Timeout(limit));
                    }
                }
                return Ok(Exchange::Idle);
            }
            Err(FrameError::ConnectionClosed) => {
                return Err(PeerError::Disconnected("host closed the link".to_string()));
            }
            Err(err) if err.needs_resync() => {
                warn!(session = %self.id, %err, "dropping malformed request");
                self.last_activity = Instant::now();
                self.stats.dropped_frames += 1;
                return Ok(Exchange::Dropped(err));
            }
            Err(err) => return Err(err.into()),
        };

        self.last_activity = Instant::now();
        let response = self.dispatcher.dispatch(&command, &mut self.state);
        debug!(
            session = %self.id,
            command = %command.describe(),
            ok = response.is_ok(),
            "request served"
        );

        self.stats.requests += 1;
        if !response.is_ok() {
            self.stats.error_responses += 1;
        }
        self.writer.send_response(&response)?;

        Ok(Exchange::Answered { command, response })
    }

    /// Serve requests until `running` clears or the host goes away.
    ///
    /// A host disconnect ends the session normally; idle timeouts and I/O
    /// failures are returned as errors.
    pub fn run(&mut self, running: &AtomicBool) -> Result<SessionStats> {
        info!(session = %self.id, "session started");
        while running.load(Ordering::SeqCst) {
            match self.serve_one() {
                Ok(_) => {}
                Err(PeerError::Disconnected(reason)) => {
                    info!(session = %self.id, %reason, "session ended");
                    return Ok(self.stats);
                }
                Err(err) => {
                    warn!(session = %self.id, %err, "session aborted");
                    return Err(err);
                }
            }
        }
        info!(session = %self.id, "session stopped");
        Ok(self.stats)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl DeviceSession<LinkStream, LinkStream> {
    /// Session over a transport link. Applies `poll_interval` as the read
    /// timeout.
    pub fn from_stream(
        stream: LinkStream,
        dispatcher: Dispatcher,
        config: SessionConfig,
    ) -> Result<Self> {
        let mut reader_stream = stream.try_clone()?;
        reader_stream.set_read_timeout(Some(config.poll_interval))?;
        Ok(Self::with_config(reader_stream, stream, dispatcher, config))
    }
}
