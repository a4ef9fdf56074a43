use std::io::{IsTerminal, Write};
use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use phead_frame::{Command, Response};
use phead_peer::Descriptor;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ResponseOutput {
    command: String,
    status: &'static str,
    payload: Option<String>,
    error_code: Option<u8>,
    error: Option<&'static str>,
    frame: String,
}

impl ResponseOutput {
    fn new(command: &Command, response: &Response) -> Self {
        let frame = response
            .to_frame()
            .to_bytes()
            .map(|bytes| hex::encode_upper(&bytes))
            .unwrap_or_default();
        match response {
            Response::Ok(payload) => Self {
                command: command.describe(),
                status: "ok",
                payload: Some(hex::encode_upper(payload)),
                error_code: None,
                error: None,
                frame,
            },
            Response::Error(code) => Self {
                command: command.describe(),
                status: "error",
                payload: None,
                error_code: Some(code.code()),
                error: Some(code.name()),
                frame,
            },
        }
    }

    fn detail(&self) -> String {
        match (&self.payload, self.error) {
            (Some(payload), _) if payload.is_empty() => "-".to_string(),
            (Some(payload), _) => payload.clone(),
            (None, Some(name)) => format!("{name} (0x{:02X})", self.error_code.unwrap_or(0)),
            (None, None) => "-".to_string(),
        }
    }
}

pub fn print_response(command: &Command, response: &Response, format: OutputFormat) {
    let out = ResponseOutput::new(command, response);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "STATUS", "DETAIL", "FRAME"])
                .add_row(vec![
                    out.command.clone(),
                    out.status.to_uppercase(),
                    out.detail(),
                    out.frame.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{} -> {} {}", out.command, out.status, out.detail());
        }
        OutputFormat::Raw => {
            if let Ok(bytes) = response.to_frame().to_bytes() {
                print_raw(&bytes);
            }
        }
    }
}

#[derive(Serialize)]
struct PingOutput {
    latency_ms: f64,
    attempts: u32,
    ok: u32,
}

pub fn print_ping(latencies: &[Duration], attempts: u32, format: OutputFormat) {
    let out = PingOutput {
        latency_ms: round_ms(average(latencies)),
        attempts,
        ok: latencies.len() as u32,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ATTEMPTS", "OK", "AVG LATENCY"])
                .add_row(vec![
                    out.attempts.to_string(),
                    out.ok.to_string(),
                    format!("{:.2}ms", out.latency_ms),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "ping: {}/{} ok, avg {:.2}ms",
                out.ok, out.attempts, out.latency_ms
            );
        }
        OutputFormat::Raw => println!("{:.2}", out.latency_ms),
    }
}

#[derive(Serialize)]
struct DescriptorOutput<'a> {
    #[serde(flatten)]
    descriptor: &'a Descriptor,
    firmware: String,
    hardware: String,
}

pub fn print_descriptor(descriptor: &Descriptor, format: OutputFormat) {
    let out = DescriptorOutput {
        descriptor,
        firmware: Descriptor::version_string(descriptor.firmware_version),
        hardware: Descriptor::version_string(descriptor.hardware_version),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MODEL", "FIRMWARE", "HARDWARE"])
                .add_row(vec![
                    descriptor.model.clone(),
                    out.firmware.clone(),
                    out.hardware.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Device:");
            println!("  Model:    {}", descriptor.model);
            println!("  Firmware: v{}", out.firmware);
            println!("  Hardware: v{}", out.hardware);
        }
        OutputFormat::Raw => println!("{}", descriptor.model),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn average(samples: &[Duration]) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    samples.iter().sum::<Duration>() / samples.len() as u32
}

fn round_ms(d: Duration) -> f64 {
    (d.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use phead_frame::category::{battery, general};
    use phead_frame::{Category, ErrorCode};

    use super::*;

    #[test]
    fn ok_response_output() {
        let cmd = Command::invoke(Category::General, general::SHUTDOWN, &[]);
        let out = ResponseOutput::new(&cmd, &Response::ack());
        assert_eq!(out.command, "general/shutdown");
        assert_eq!(out.status, "ok");
        assert_eq!(out.payload.as_deref(), Some("00"));
        assert_eq!(out.frame, "A00100CC");
    }

    #[test]
    fn error_response_output() {
        let cmd = Command::invoke(Category::Battery, battery::READ, &[]);
        let out = ResponseOutput::new(&cmd, &Response::error(ErrorCode::NoBattery));
        assert_eq!(out.status, "error");
        assert_eq!(out.error, Some("NO_BATTERY"));
        assert_eq!(out.detail(), "NO_BATTERY (0x04)");
        assert_eq!(out.frame, "A10104CC");
    }

    #[test]
    fn average_latency() {
        let samples = [Duration::from_millis(2), Duration::from_millis(4)];
        assert_eq!(average(&samples), Duration::from_millis(3));
        assert_eq!(average(&[]), Duration::ZERO);
        assert_eq!(round_ms(Duration::from_micros(1234)), 1.23);
    }

    #[test]
    fn descriptor_json_has_versions() {
        let descriptor = Descriptor::default();
        let out = DescriptorOutput {
            descriptor: &descriptor,
            firmware: Descriptor::version_string(descriptor.firmware_version),
            hardware: Descriptor::version_string(descriptor.hardware_version),
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["model"], "SD-PHEAD-1");
        assert_eq!(json["firmware_version"], 16);
        assert_eq!(json["firmware"], "1.0");
    }
}
