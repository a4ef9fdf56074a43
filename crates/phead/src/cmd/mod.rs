use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use phead_peer::{HostConfig, HostLink};
use phead_transport::LinkStream;

use crate::exit::{peer_error, transport_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod describe;
pub mod ping;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate a print head on a Unix socket or serial port.
    Serve(ServeArgs),
    /// Send one command and print the response.
    Send(SendArgs),
    /// Probe a print head and report round-trip latency.
    Ping(PingArgs),
    /// Print the device's model and versions.
    Describe(DescribeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Send(args) => send::run(args, format),
        Command::Ping(args) => ping::run(args, format),
        Command::Describe(args) => describe::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where a host command finds the print head.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Unix socket of a simulated head.
    #[arg(long, env = "PHEAD_SOCKET", value_name = "PATH", conflicts_with_all = ["serial", "rfcomm"])]
    pub socket: Option<PathBuf>,
    /// Serial port the head's UART is wired to.
    #[arg(long, env = "PHEAD_SERIAL", value_name = "PORT", conflicts_with = "rfcomm")]
    pub serial: Option<String>,
    /// Serial baud rate.
    #[arg(long, default_value_t = 115_200)]
    pub baud: u32,
    /// Bluetooth address of the head (Linux).
    #[arg(long, value_name = "ADDR")]
    pub rfcomm: Option<String>,
    /// RFCOMM channel.
    #[arg(long, default_value_t = 1)]
    pub rfcomm_channel: u8,
    /// Response timeout (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub timeout: Duration,
    /// Re-sends after a lost response.
    #[arg(long, default_value_t = 5)]
    pub retries: u32,
}

impl LinkArgs {
    pub fn host_config(&self) -> HostConfig {
        HostConfig {
            response_timeout: self.timeout,
            resend_attempts: self.retries,
        }
    }

    /// Open the selected link and wrap it for requests.
    pub fn open(&self) -> CliResult<HostLink<LinkStream, LinkStream>> {
        let stream = self.open_stream()?;
        tracing::debug!(transport = stream.transport_name(), "link open");
        HostLink::from_stream(stream, self.host_config())
            .map_err(|err| peer_error("link setup failed", err))
    }

    fn open_stream(&self) -> CliResult<LinkStream> {
        if let Some(path) = &self.socket {
            return open_socket(path);
        }
        if let Some(port) = &self.serial {
            return open_serial(port, self.baud, self.timeout);
        }
        if let Some(addr) = &self.rfcomm {
            return open_rfcomm(addr, self.rfcomm_channel, self.timeout);
        }
        Err(CliError::usage(
            "no link given: use --socket, --serial or --rfcomm (or set PHEAD_SOCKET / PHEAD_SERIAL)",
        ))
    }
}

#[cfg(unix)]
fn open_socket(path: &std::path::Path) -> CliResult<LinkStream> {
    phead_transport::UnixDomainSocket::connect(path)
        .map_err(|err| transport_error("connect failed", err))
}

#[cfg(not(unix))]
fn open_socket(_path: &std::path::Path) -> CliResult<LinkStream> {
    Err(CliError::usage("--socket needs Unix domain sockets"))
}

#[cfg(feature = "serial")]
fn open_serial(port: &str, baud: u32, timeout: Duration) -> CliResult<LinkStream> {
    phead_transport::serial::open(port, baud, timeout)
        .map_err(|err| transport_error("serial open failed", err))
}

#[cfg(not(feature = "serial"))]
fn open_serial(_port: &str, _baud: u32, _timeout: Duration) -> CliResult<LinkStream> {
    Err(CliError::usage(
        "--serial needs a build with the `serial` feature",
    ))
}

#[cfg(target_os = "linux")]
fn open_rfcomm(addr: &str, channel: u8, timeout: Duration) -> CliResult<LinkStream> {
    let addr: phead_transport::BdAddr = addr
        .parse()
        .map_err(|err| transport_error("bad Bluetooth address", err))?;
    phead_transport::rfcomm::connect(addr, channel, Some(timeout))
        .map_err(|err| transport_error("rfcomm connect failed", err))
}

#[cfg(not(target_os = "linux"))]
fn open_rfcomm(_addr: &str, _channel: u8, _timeout: Duration) -> CliResult<LinkStream> {
    Err(CliError::usage("--rfcomm is only available on Linux"))
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Unix socket path to bind.
    #[arg(long, env = "PHEAD_SOCKET", value_name = "PATH", conflicts_with = "serial")]
    pub socket: Option<PathBuf>,
    /// Serve a single host over this serial port instead.
    #[arg(long, env = "PHEAD_SERIAL", value_name = "PORT")]
    pub serial: Option<String>,
    /// Serial baud rate.
    #[arg(long, default_value_t = 115_200)]
    pub baud: u32,
    /// Device profile (JSON).
    #[arg(long, env = "PHEAD_PROFILE", value_name = "FILE")]
    pub profile: Option<PathBuf>,
    /// Drop a host after this long without a request (e.g. 5s).
    #[arg(long, value_parser = parse_duration)]
    pub idle_timeout: Option<Duration>,
    /// Exit after serving this many connections.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Category name or number (general, calibration, battery, print,
    /// temperature, uv_light).
    #[arg(required_unless_present = "frame")]
    pub category: Option<String>,
    /// Subcommand name or number within the category.
    #[arg(required_unless_present = "frame")]
    pub subcommand: Option<String>,
    /// Argument bytes as hex (e.g. 0a050028).
    pub args: Option<String>,
    /// Send a complete request frame given as hex instead (e.g. BD0201 01CC).
    #[arg(long, conflicts_with_all = ["category", "subcommand", "args"])]
    pub frame: Option<String>,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Number of probes.
    #[arg(long, short = 'c', default_value_t = 1)]
    pub count: u32,
}

#[derive(Args, Debug)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// `5s`, `150ms`, or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration value: {input}"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Hex bytes, ignoring whitespace.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);
    hex::decode(compact).map_err(|err| CliError::usage(format!("invalid hex '{input}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_hex_accepts_spacing_and_prefix() {
        assert_eq!(parse_hex("0a 05 00 28").unwrap(), [0x0A, 0x05, 0x00, 0x28]);
        assert_eq!(parse_hex("0xBD00CC").unwrap(), [0xBD, 0x00, 0xCC]);
        assert!(parse_hex("").unwrap().is_empty());
    }

    #[test]
    fn parse_hex_rejects_odd_digits() {
        let err = parse_hex("abc").unwrap_err();
        assert_eq!(err.code, crate::exit::USAGE);
    }

    #[test]
    fn missing_link_is_usage_error() {
        let link = LinkArgs {
            socket: None,
            serial: None,
            baud: 115_200,
            rfcomm: None,
            rfcomm_channel: 1,
            timeout: Duration::from_secs(1),
            retries: 0,
        };
        let err = link.open().err().expect("no link should fail");
        assert_eq!(err.code, crate::exit::USAGE);
    }
}
