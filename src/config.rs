//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! sunshine-config.toml file. It provides the theme colours, the per-shape
//! layout constants (square and round panels), clock formatting options and
//! the logical path weather payloads arrive on.
//!
//! Every section is optional; anything missing takes its default value.

use crate::ScreenShape;
use embedded_graphics::mono_font::{iso_8859_1, MonoFont};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "sunshine-config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialization: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Colours are written as `#RRGGBB`
    #[error("invalid colour {0:?}, expected #RRGGBB")]
    InvalidColor(String),
}

/// Application configuration loaded from sunshine-config.toml
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Panel size and shape
    pub screen: ScreenConfig,
    /// Colours for both power states
    pub theme: ThemeConfig,
    /// Layout constants per panel shape
    pub layout: LayoutSet,
    /// Time formatting and tick rate
    pub clock: ClockConfig,
    /// Companion sync channel settings
    pub sync: SyncConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
    /// Initial shape; the host may report another one at insets time
    pub shape: ScreenShape,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 320,
            shape: ScreenShape::Square,
        }
    }
}

/// Theme colours for interactive mode. Ambient mode always draws on black,
/// with all text in `digital_text`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub background: HexColor,
    pub digital_text: HexColor,
    pub digital_text_light: HexColor,
    pub icon: HexColor,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            background: HexColor(Rgb888::new(0x03, 0xA9, 0xF4)),
            digital_text: HexColor(Rgb888::WHITE),
            digital_text_light: HexColor(Rgb888::new(0xB3, 0xE5, 0xFC)),
            icon: HexColor(Rgb888::new(0xFF, 0xD5, 0x4F)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutSet {
    pub square: LayoutConfig,
    pub round: LayoutConfig,
}

impl LayoutSet {
    pub fn for_shape(&self, shape: ScreenShape) -> &LayoutConfig {
        match shape {
            ScreenShape::Square => &self.square,
            ScreenShape::Round => &self.round,
        }
    }
}

impl Default for LayoutSet {
    fn default() -> Self {
        Self {
            square: LayoutConfig::default(),
            round: LayoutConfig {
                date_font: FontChoice::Font8x13,
                time_y_offset: 130,
                date_y_offset: 162,
                weather_y_offset: 228,
                icon_size: 28,
                ..LayoutConfig::default()
            },
        }
    }
}

/// Fonts and vertical offsets for one panel shape. All y offsets are text
/// baselines measured from the top of the screen.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub time_font: FontChoice,
    pub date_font: FontChoice,
    pub temperature_font: FontChoice,
    pub time_y_offset: i32,
    pub date_y_offset: i32,
    pub weather_y_offset: i32,
    /// Gap between high and low temperature; the icon gap and the separator
    /// half-length are derived from it
    pub temperature_gap: i32,
    pub icon_size: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            time_font: FontChoice::Font10x20,
            date_font: FontChoice::Font7x13,
            temperature_font: FontChoice::Font9x18,
            time_y_offset: 120,
            date_y_offset: 152,
            weather_y_offset: 218,
            temperature_gap: 10,
            icon_size: 32,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Show 1-12 hours instead of 0-23
    pub twelve_hour: bool,
    /// Interactive redraw period; ticks are aligned to multiples of it
    pub interactive_update_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            twelve_hour: false,
            interactive_update_ms: 1000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    pub weather_path: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            weather_path: crate::sync::WEATHER_PATH.to_string(),
        }
    }
}

/// Fixed-width fonts available to the layout, named by cell size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum FontChoice {
    #[serde(rename = "6x10")]
    Font6x10,
    #[serde(rename = "7x13")]
    Font7x13,
    #[serde(rename = "8x13")]
    Font8x13,
    #[serde(rename = "9x15")]
    Font9x15,
    #[serde(rename = "9x18")]
    Font9x18,
    #[serde(rename = "10x20")]
    Font10x20,
}

impl FontChoice {
    /// Latin-1 variants so that `°` renders as a real glyph.
    pub fn font(self) -> &'static MonoFont<'static> {
        match self {
            FontChoice::Font6x10 => &iso_8859_1::FONT_6X10,
            FontChoice::Font7x13 => &iso_8859_1::FONT_7X13,
            FontChoice::Font8x13 => &iso_8859_1::FONT_8X13,
            FontChoice::Font9x15 => &iso_8859_1::FONT_9X15,
            FontChoice::Font9x18 => &iso_8859_1::FONT_9X18,
            FontChoice::Font10x20 => &iso_8859_1::FONT_10X20,
        }
    }
}

/// An `Rgb888` written as `#RRGGBB` in TOML.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(pub Rgb888);

impl HexColor {
    pub fn rgb(self) -> Rgb888 {
        self.0
    }
}

impl TryFrom<String> for HexColor {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let digits = value
            .strip_prefix('#')
            .filter(|d| d.len() == 6 && d.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| ConfigError::InvalidColor(value.clone()))?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| ConfigError::InvalidColor(value.clone()))
        };
        Ok(HexColor(Rgb888::new(
            channel(0..2)?,
            channel(2..4)?,
            channel(4..6)?,
        )))
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        let c = color.0;
        format!("#{:02X}{:02X}{:02X}", c.r(), c.g(), c.b())
    }
}

impl Config {
    /// Load configuration from sunshine-config.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load_from_path(&path) {
            Ok(config) => {
                info!(
                    "loaded configuration from {} ({}x{} {:?})",
                    path.as_ref().display(),
                    config.screen.width,
                    config.screen.height,
                    config.screen.shape
                );
                config
            }
            Err(ConfigError::Io(_)) => {
                info!("no config file found, using default configuration");
                Self::default()
            }
            Err(e) => {
                warn!("{e}; using default configuration");
                Self::default()
            }
        }
    }

    /// Load configuration, surfacing IO and parse errors.
    pub fn try_load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save current configuration as pretty TOML
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!("configuration saved to {}", path.as_ref().display());
        Ok(())
    }
}
