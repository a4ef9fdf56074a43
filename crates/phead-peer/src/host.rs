use std::io::{Read, Write};
#[cfg(unix)]
use std::path::Path;
use std::time::{Duration, Instant};

use bytes::Bytes;
use phead_frame::category::{battery, calibration, general, print, temperature, uv_light};
use phead_frame::{Category, Command, FrameError, FrameReader, FrameWriter, Response};
use phead_transport::LinkStream;
#[cfg(unix)]
use phead_transport::UnixDomainSocket;
use tracing::{debug, warn};

use crate::error::{PeerError, Result};
use crate::profile::Descriptor;

/// Host-side request behaviour.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// How long to wait for each response. Applied as the read timeout by
    /// [`HostLink::from_stream`].
    pub response_timeout: Duration,
    /// How many times a request is re-sent after a lost or garbled response.
    pub resend_attempts: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(1),
            resend_attempts: 5,
        }
    }
}

/// The host end of a link: sends one request and waits for its response.
pub struct HostLink<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    config: HostConfig,
}

impl<R: Read, W: Write> HostLink<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, HostConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: HostConfig) -> Self {
        Self {
            reader: FrameReader::responses(reader),
            writer: FrameWriter::new(writer),
            config,
        }
    }

    /// Send `command` and return whatever the device answered, error
    /// responses included.
    ///
    /// A response that times out or arrives garbled counts as lost: the
    /// receive buffer is dropped and the command is sent again, up to
    /// `resend_attempts` times.
    pub fn request(&mut self, command: &Command) -> Result<Response> {
        let mut resends = 0u32;
        loop {
            self.writer.send_command(command)?;
            match self.reader.read_response() {
                Ok(response) => {
                    debug!(
                        command = %command.describe(),
                        ok = response.is_ok(),
                        resends,
                        "response received"
                    );
                    return Ok(response);
                }
                Err(FrameError::ConnectionClosed) => {
                    return Err(PeerError::Disconnected(
                        "device closed the link".to_string(),
                    ));
                }
                Err(err) if is_lost_response(&err) => {
                    if resends >= self.config.resend_attempts {
                        return Err(PeerError::Timeout(self.config.response_timeout));
                    }
                    resends += 1;
                    let dropped = self.reader.clear();
                    warn!(
                        command = %command.describe(),
                        %err,
                        dropped,
                        attempt = resends,
                        "response lost, re-sending"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Send `command` and return the `OK` payload; an error response becomes
    /// [`PeerError::Device`].
    pub fn call(&mut self, command: &Command) -> Result<Bytes> {
        self.request(command)?
            .into_result()
            .map_err(PeerError::Device)
    }

    /// Probe the device and measure the round trip.
    pub fn ping(&mut self) -> Result<Duration> {
        let started = Instant::now();
        let payload = self.call(&Command::Ping)?;
        expect_ack("ping", &payload)?;
        Ok(started.elapsed())
    }

    /// Reset the device to its power-on settings.
    pub fn init(&mut self) -> Result<()> {
        self.invoke_ack(Category::General, general::INIT, &[], "init")
    }

    /// Reset the device, then override each non-zero setting.
    pub fn init_with(&mut self, volume: u8, speed: u16, temperature: u8) -> Result<()> {
        let [lo, hi] = speed.to_le_bytes();
        self.invoke_ack(
            Category::General,
            general::INIT,
            &[volume, lo, hi, temperature],
            "init",
        )
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.invoke_ack(Category::General, general::SHUTDOWN, &[], "shutdown")
    }

    /// Firmware version, hardware version and model name.
    pub fn describe(&mut self) -> Result<Descriptor> {
        let payload = self.invoke(Category::General, general::DESCRIPTION, &[])?;
        Descriptor::from_payload(&payload)
    }

    pub fn state_led(&mut self) -> Result<()> {
        self.invoke_ack(Category::General, general::STATE_LED, &[], "state_led")
    }

    pub fn calibrate(&mut self, volume: u8) -> Result<()> {
        self.invoke_ack(
            Category::Calibration,
            calibration::CALIBRATE,
            &[volume],
            "calibrate",
        )
    }

    /// Battery level; fails with `NO_BATTERY` while the head is plugged in.
    pub fn read_battery(&mut self) -> Result<u16> {
        let payload = self.invoke(Category::Battery, battery::READ, &[])?;
        match payload[..] {
            [lo, hi] => Ok(u16::from_le_bytes([lo, hi])),
            _ => Err(unexpected("read_battery", &payload)),
        }
    }

    /// Start printing; a speed of zero keeps the current one.
    pub fn start_print(&mut self, speed: u16) -> Result<()> {
        self.invoke_ack(
            Category::Print,
            print::START,
            &speed.to_le_bytes(),
            "start_print",
        )
    }

    pub fn stop_print(&mut self) -> Result<()> {
        self.invoke_ack(Category::Print, print::STOP, &[], "stop_print")
    }

    pub fn set_speed(&mut self, speed: u16) -> Result<()> {
        self.invoke_ack(
            Category::Print,
            print::SET_SPEED,
            &speed.to_le_bytes(),
            "set_speed",
        )
    }

    pub fn refill(&mut self) -> Result<()> {
        self.invoke_ack(Category::Print, print::REFILL, &[], "refill")
    }

    pub fn read_temperature(&mut self) -> Result<u8> {
        let payload = self.invoke(Category::Temperature, temperature::READ, &[])?;
        single_byte("read_temperature", &payload)
    }

    pub fn set_temperature(&mut self, value: u8) -> Result<()> {
        self.invoke_ack(
            Category::Temperature,
            temperature::SET,
            &[value],
            "set_temperature",
        )
    }

    pub fn read_uv(&mut self) -> Result<u8> {
        let payload = self.invoke(Category::UvLight, uv_light::READ, &[])?;
        single_byte("read_uv", &payload)
    }

    pub fn turn_off_uv(&mut self) -> Result<()> {
        self.invoke_ack(Category::UvLight, uv_light::TURN_OFF, &[], "turn_off_uv")
    }

    pub fn set_uv_intensity(&mut self, intensity: u8) -> Result<()> {
        self.invoke_ack(
            Category::UvLight,
            uv_light::SET_INTENSITY,
            &[intensity],
            "set_uv_intensity",
        )
    }

    pub fn set_uv_map(&mut self, map: u8) -> Result<()> {
        self.invoke_ack(Category::UvLight, uv_light::SET_MAP, &[map], "set_uv_map")
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    fn invoke(&mut self, category: Category, subcommand: u8, args: &[u8]) -> Result<Bytes> {
        self.call(&Command::invoke(category, subcommand, args))
    }

    fn invoke_ack(
        &mut self,
        category: Category,
        subcommand: u8,
        args: &[u8],
        what: &str,
    ) -> Result<()> {
        let payload = self.invoke(category, subcommand, args)?;
        expect_ack(what, &payload)
    }
}

impl HostLink<LinkStream, LinkStream> {
    /// Host link over any transport. Applies `response_timeout` as the read
    /// and write timeout.
    pub fn from_stream(mut stream: LinkStream, config: HostConfig) -> Result<Self> {
        stream.set_write_timeout(Some(config.response_timeout))?;
        let mut reader_stream = stream.try_clone()?;
        reader_stream.set_read_timeout(Some(config.response_timeout))?;
        Ok(Self::with_config(reader_stream, stream, config))
    }
}

/// Connect to a simulated head on a Unix socket.
#[cfg(unix)]
pub fn connect(path: impl AsRef<Path>) -> Result<HostLink<LinkStream, LinkStream>> {
    connect_with_config(path, HostConfig::default())
}

/// Connect with explicit configuration.
#[cfg(unix)]
pub fn connect_with_config(
    path: impl AsRef<Path>,
    config: HostConfig,
) -> Result<HostLink<LinkStream, LinkStream>> {
    let stream = UnixDomainSocket::connect(path)?;
    HostLink::from_stream(stream, config)
}

fn is_lost_response(err: &FrameError) -> bool {
    err.is_timeout() || err.needs_resync() || matches!(err, FrameError::MalformedError(_))
}

fn expect_ack(what: &str, payload: &[u8]) -> Result<()> {
    match payload {
        [0x00] => Ok(()),
        _ => Err(unexpected(what, payload)),
    }
}

fn single_byte(what: &str, payload: &[u8]) -> Result<u8> {
    match payload {
        [value] => Ok(*value),
        _ => Err(unexpected(what, payload)),
    }
}

fn unexpected(what: &str, payload: &[u8]) -> PeerError {
    PeerError::UnexpectedResponse(format!("{what} returned {payload:02X?}"))
}
