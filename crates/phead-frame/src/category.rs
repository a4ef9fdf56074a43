//! Command categories and their subcommand numbers.
//!
//! The first payload byte of a request selects a category, the second a
//! subcommand whose meaning is scoped to that category.

use std::fmt;

/// Top-level grouping of device functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Category {
    General = 0x01,
    Calibration = 0x02,
    Battery = 0x03,
    Print = 0x04,
    Temperature = 0x05,
    UvLight = 0x06,
}

impl Category {
    /// Every category, in wire order.
    pub const ALL: [Category; 6] = [
        Category::General,
        Category::Calibration,
        Category::Battery,
        Category::Print,
        Category::Temperature,
        Category::UvLight,
    ];

    /// Wire value.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a category by wire value.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Lower-case name used in logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Calibration => "calibration",
            Category::Battery => "battery",
            Category::Print => "print",
            Category::Temperature => "temperature",
            Category::UvLight => "uv_light",
        }
    }

    /// Parse a category from its name or its wire value (`"print"`, `"4"`,
    /// `"0x04"`).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("uv") {
            return Some(Category::UvLight);
        }
        if let Some(found) = Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
        {
            return Some(found);
        }
        let code = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16).ok()?,
            None => s.parse().ok()?,
        };
        Self::from_code(code)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Category {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(code)
    }
}

/// `GENERAL` subcommands.
pub mod general {
    pub const INIT: u8 = 0x01;
    pub const SHUTDOWN: u8 = 0x02;
    pub const DESCRIPTION: u8 = 0x03;
    pub const STATE_LED: u8 = 0x04;
}

/// `CALIBRATION` subcommands.
pub mod calibration {
    pub const CALIBRATE: u8 = 0x01;
}

/// `BATTERY` subcommands.
pub mod battery {
    pub const READ: u8 = 0x01;
}

/// `PRINT` subcommands.
pub mod print {
    pub const START: u8 = 0x01;
    pub const STOP: u8 = 0x02;
    pub const SET_SPEED: u8 = 0x03;
    pub const REFILL: u8 = 0x04;
}

/// `TEMPERATURE` subcommands.
pub mod temperature {
    pub const READ: u8 = 0x01;
    pub const SET: u8 = 0x02;
}

/// `UV_LIGHT` subcommands.
pub mod uv_light {
    pub const READ: u8 = 0x01;
    pub const TURN_OFF: u8 = 0x02;
    pub const SET_INTENSITY: u8 = 0x03;
    pub const SET_MAP: u8 = 0x04;
}

/// Returns a human-readable name for a category byte.
pub fn category_name(code: u8) -> &'static str {
    Category::from_code(code).map_or("UNKNOWN", Category::name)
}

/// Returns the name of a subcommand, or `None` if the category does not
/// define it.
pub fn subcommand_name(category: u8, subcommand: u8) -> Option<&'static str> {
    let name = match (Category::from_code(category)?, subcommand) {
        (Category::General, general::INIT) => "init",
        (Category::General, general::SHUTDOWN) => "shutdown",
        (Category::General, general::DESCRIPTION) => "description",
        (Category::General, general::STATE_LED) => "state_led",
        (Category::Calibration, calibration::CALIBRATE) => "calibrate",
        (Category::Battery, battery::READ) => "read_battery",
        (Category::Print, print::START) => "start_print",
        (Category::Print, print::STOP) => "stop_print",
        (Category::Print, print::SET_SPEED) => "set_speed",
        (Category::Print, print::REFILL) => "refill",
        (Category::Temperature, temperature::READ) => "read_temperature",
        (Category::Temperature, temperature::SET) => "set_temperature",
        (Category::UvLight, uv_light::READ) => "read_uv",
        (Category::UvLight, uv_light::TURN_OFF) => "turn_off_uv",
        (Category::UvLight, uv_light::SET_INTENSITY) => "set_uv_intensity",
        (Category::UvLight, uv_light::SET_MAP) => "set_uv_map",
        _ => return None,
    };
    Some(name)
}

/// Resolve a subcommand given by name or number within `category`.
pub fn parse_subcommand(category: Category, s: &str) -> Option<u8> {
    let s = s.trim();
    if let Some(found) = (0x01..=0x04).find(|&sub| {
        subcommand_name(category.code(), sub).is_some_and(|name| name.eq_ignore_ascii_case(s))
    }) {
        return Some(found);
    }
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip_through_lookup() {
        for category in Category::ALL {
            assert_eq!(Category::from_code(category.code()), Some(category));
        }
        assert_eq!(Category::from_code(0x00), None);
        assert_eq!(Category::from_code(0x07), None);
        assert_eq!(Category::try_from(0x09), Err(0x09));
    }

    #[test]
    fn names() {
        assert_eq!(category_name(0x04), "print");
        assert_eq!(category_name(0x42), "UNKNOWN");
        assert_eq!(subcommand_name(0x01, 0x03), Some("description"));
        assert_eq!(subcommand_name(0x06, 0x04), Some("set_uv_map"));
        assert_eq!(subcommand_name(0x06, 0x02), Some("turn_off_uv"));
        assert_eq!(subcommand_name(0x06, 0x05), None);
        assert_eq!(subcommand_name(0x07, 0x01), None);
    }

    #[test]
    fn parse_category_by_name_or_number() {
        assert_eq!(Category::parse("print"), Some(Category::Print));
        assert_eq!(Category::parse("UV"), Some(Category::UvLight));
        assert_eq!(Category::parse("0x05"), Some(Category::Temperature));
        assert_eq!(Category::parse("3"), Some(Category::Battery));
        assert_eq!(Category::parse("0x07"), None);
        assert_eq!(Category::parse("laser"), None);
    }

    #[test]
    fn parse_subcommand_by_name_or_number() {
        assert_eq!(parse_subcommand(Category::General, "description"), Some(0x03));
        assert_eq!(parse_subcommand(Category::Print, "set_speed"), Some(0x03));
        assert_eq!(parse_subcommand(Category::Print, "0x05"), Some(0x05));
        assert_eq!(parse_subcommand(Category::Print, "bogus"), None);
    }
}
