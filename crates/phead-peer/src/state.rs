//! Per-connection device state.
//!
//! One `DeviceState` exists per live connection. It is owned by the session
//! that serves the connection and handed to the dispatcher by `&mut` for each
//! request; nothing else reads or writes it.

use serde::{Deserialize, Serialize};

/// Largest accepted dispense volume.
pub const MAX_VOLUME: u8 = 0x63;

/// Volume a freshly initialised head uses (10 ml).
pub const DEFAULT_VOLUME: u8 = 0x0A;

/// Extrusion speed a freshly initialised head uses (ml/s).
pub const DEFAULT_SPEED: u16 = 5;

/// Temperature setpoint a freshly initialised head uses (°C).
pub const DEFAULT_TEMPERATURE: u8 = 40;

/// UV map selected at power-on.
pub const DEFAULT_UV_MAP: u8 = 1;

/// Where the head draws power from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerMode {
    /// External supply. Battery reads are refused.
    #[default]
    Plugged,
    /// Running on the internal battery.
    Battery,
}

impl PowerMode {
    pub fn name(self) -> &'static str {
        match self {
            PowerMode::Plugged => "plugged",
            PowerMode::Battery => "battery",
        }
    }
}

/// Mode flags gating commands, plus the print settings the head keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub power_mode: PowerMode,
    pub temperature_enabled: bool,
    pub uv_enabled: bool,
    /// Dispense volume, `0..=MAX_VOLUME`.
    pub volume: u8,
    pub speed: u16,
    /// Temperature setpoint; also what a temperature read reports.
    pub temperature: u8,
    pub uv_intensity: u8,
    pub uv_map: u8,
    pub printing: bool,
    /// Last battery reading. Only reported while on battery power.
    pub battery_level: u16,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            power_mode: PowerMode::Plugged,
            temperature_enabled: false,
            uv_enabled: false,
            volume: DEFAULT_VOLUME,
            speed: DEFAULT_SPEED,
            temperature: DEFAULT_TEMPERATURE,
            uv_intensity: 0,
            uv_map: DEFAULT_UV_MAP,
            printing: false,
            battery_level: 0,
        }
    }
}

impl DeviceState {
    /// True while running on battery.
    pub fn on_battery(&self) -> bool {
        self.power_mode == PowerMode::Battery
    }
}
