//! Device profiles: what a simulated head reports about itself and the state
//! it powers on with.

use std::path::Path;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{PeerError, Result};
use crate::state::{
    DeviceState, PowerMode, DEFAULT_SPEED, DEFAULT_TEMPERATURE, DEFAULT_UV_MAP, DEFAULT_VOLUME,
    MAX_VOLUME,
};

/// Longest model name the firmware can store.
pub const MAX_MODEL_LEN: usize = 20;

/// Model name of the reference head.
pub const DEFAULT_MODEL: &str = "SD-PHEAD-1";

/// Firmware and hardware version of the reference head, v1.0.
pub const DEFAULT_VERSION: u8 = 0x10;

/// What a `description` request returns: `fw | hw | model...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    pub firmware_version: u8,
    pub hardware_version: u8,
    pub model: String,
}

impl Default for Descriptor {
    fn default() -> Self {
        Self {
            firmware_version: DEFAULT_VERSION,
            hardware_version: DEFAULT_VERSION,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl Descriptor {
    /// Wire form of the description payload.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(2 + self.model.len());
        buf.put_u8(self.firmware_version);
        buf.put_u8(self.hardware_version);
        buf.put_slice(self.model.as_bytes());
        buf.freeze()
    }

    /// Parse a description payload received from a device.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let [firmware_version, hardware_version, model @ ..] = payload else {
            return Err(PeerError::UnexpectedResponse(format!(
                "description payload is {} bytes (need at least 2)",
                payload.len()
            )));
        };
        if !model.is_ascii() {
            return Err(PeerError::UnexpectedResponse(
                "model name is not ASCII".to_string(),
            ));
        }
        Ok(Self {
            firmware_version: *firmware_version,
            hardware_version: *hardware_version,
            model: String::from_utf8_lossy(model).into_owned(),
        })
    }

    /// `major.minor` from a nibble-packed version byte (`0x2A` is `2.10`).
    pub fn version_string(version: u8) -> String {
        format!("{}.{}", version >> 4, version & 0x0F)
    }
}

/// Configuration of a simulated print head, usually loaded from JSON.
///
/// Missing fields take the reference head's compiled-in values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceProfile {
    pub model: String,
    pub firmware_version: u8,
    pub hardware_version: u8,
    pub power_mode: PowerMode,
    pub temperature_enabled: bool,
    pub uv_enabled: bool,
    pub battery_level: u16,
    pub volume: u8,
    pub speed: u16,
    pub temperature: u8,
    pub uv_intensity: u8,
    pub uv_map: u8,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            firmware_version: DEFAULT_VERSION,
            hardware_version: DEFAULT_VERSION,
            power_mode: PowerMode::Plugged,
            temperature_enabled: false,
            uv_enabled: false,
            battery_level: 0,
            volume: DEFAULT_VOLUME,
            speed: DEFAULT_SPEED,
            temperature: DEFAULT_TEMPERATURE,
            uv_intensity: 0,
            uv_map: DEFAULT_UV_MAP,
        }
    }
}

impl DeviceProfile {
    /// Load and validate a profile from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|source| PeerError::ProfileIo {
            path: path.to_path_buf(),
            source,
        })?;
        let profile: Self = serde_json::from_slice(&raw)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Parse and validate a profile from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let profile: Self = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Check the values a real head could not hold.
    pub fn validate(&self) -> Result<()> {
        if self.model.is_empty() || self.model.len() > MAX_MODEL_LEN {
            return Err(PeerError::InvalidProfile(format!(
                "model name must be 1..={MAX_MODEL_LEN} bytes, got {}",
                self.model.len()
            )));
        }
        if !self.model.is_ascii() {
            return Err(PeerError::InvalidProfile(
                "model name must be ASCII".to_string(),
            ));
        }
        if self.volume > MAX_VOLUME {
            return Err(PeerError::InvalidProfile(format!(
                "volume 0x{:02X} exceeds 0x{MAX_VOLUME:02X}",
                self.volume
            )));
        }
        if self.uv_map == 0 {
            return Err(PeerError::InvalidProfile("uv_map must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn descriptor(&self) -> Descriptor {
        Descriptor {
            firmware_version: self.firmware_version,
            hardware_version: self.hardware_version,
            model: self.model.clone(),
        }
    }

    /// State a connection starts in, and the state `init` restores.
    pub fn power_on_state(&self) -> DeviceState {
        DeviceState {
            power_mode: self.power_mode,
            temperature_enabled: self.temperature_enabled,
            uv_enabled: self.uv_enabled,
            volume: self.volume,
            speed: self.speed,
            temperature: self.temperature,
            uv_intensity: self.uv_intensity,
            uv_map: self.uv_map,
            printing: false,
            battery_level: self.battery_level,
        }
    }
}
