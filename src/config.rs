//! # Client Configuration
//!
//! Typed configuration for the remote-control client, stored as a single TOML
//! file under the user's config directory
//! (`~/.config/stickcast/config.toml` on Linux).
//!
//! Every section has a complete default so a missing key never prevents the
//! client from starting. On first launch [`ensure_default_config`] writes a
//! commented default file that mirrors [`ClientConfig::default`].

use crate::audio::CaptureFormat;
use crate::error::ConfigError;
use crate::joystick::{AxisChannels, LabelMap};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const CONFIG_DIR: &str = "stickcast";
const CONFIG_FILE: &str = "config.toml";

/// Content written by [`ensure_default_config`]. Parses to `ClientConfig::default()`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# stickcast client configuration

[server]
url = "ws://127.0.0.1:8000/ws/unified"
connect_timeout_ms = 10000
reconnect_delay_ms = 5000
outbound_capacity = 64
end_marker = "END"

[joystick]
i2c_bus = 1
address = 0x48
gain = "one"
# AIN channel per axis. The push-to-talk prototype board wires the stick to
# AIN1/AIN2 instead:
#   x_channel = 1
#   y_channel = 2
x_channel = 0
y_channel = 1
poll_interval_ms = 50
error_backoff_ms = 1000

[calibration]
samples = 30
settle_delay_ms = 500
sample_delay_ms = 20
threshold_delta = 2500

# Label reported for each axis deflection. Compound labels are the sorted
# labels joined with '-'. Boards with the stick mounted rotated, like the
# prototype board above, can swap these, e.g.:
#   low_x = "down", high_x = "up", low_y = "left", high_y = "right"
[labels]
low_x = "left"
high_x = "right"
low_y = "up"
high_y = "down"

[button]
pin = 17
active_low = true
poll_interval_ms = 50

[audio]
sample_rate = 16000
channels = 1
frame_samples = 1024
"#;

/// Top-level configuration for one client process
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub joystick: JoystickConfig,
    pub calibration: CalibrationConfig,
    pub labels: LabelMap,
    pub button: ButtonConfig,
    pub audio: AudioConfig,
}

/// Remote controller endpoint and connection behaviour
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket URL of the remote controller
    pub url: String,
    pub connect_timeout_ms: u64,
    /// Fixed delay between session attempts
    pub reconnect_delay_ms: u64,
    /// Bound of the outbound message queue shared by all producers
    pub outbound_capacity: usize,
    /// Text sent once after every audio stream has fully stopped
    pub end_marker: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws/unified".to_string(),
            connect_timeout_ms: 10_000,
            reconnect_delay_ms: 5_000,
            outbound_capacity: 64,
            end_marker: "END".to_string(),
        }
    }
}

/// Programmable gain of the ADS1115 front end
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdcGain {
    TwoThirds,
    #[default]
    One,
    Two,
    Four,
    Eight,
    Sixteen,
}

/// Analog joystick wiring and polling cadence
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct JoystickConfig {
    pub i2c_bus: u8,
    pub address: u16,
    pub gain: AdcGain,
    pub x_channel: u8,
    pub y_channel: u8,
    pub poll_interval_ms: u64,
    /// Pause after a failed axis read before polling again
    pub error_backoff_ms: u64,
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            i2c_bus: 1,
            address: 0x48,
            gain: AdcGain::One,
            x_channel: 0,
            y_channel: 1,
            poll_interval_ms: 50,
            error_backoff_ms: 1_000,
        }
    }
}

/// Rest-position sampling parameters
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    pub samples: usize,
    pub settle_delay_ms: u64,
    pub sample_delay_ms: u64,
    /// Raw ADC counts a reading must deviate from center to count as deflected
    pub threshold_delta: i32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            samples: 30,
            settle_delay_ms: 500,
            sample_delay_ms: 20,
            threshold_delta: 2_500,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ButtonConfig {
    /// BCM GPIO number
    pub pin: u8,
    /// Pressed reads low (button to ground, internal pull-up)
    pub active_low: bool,
    pub poll_interval_ms: u64,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            pin: 17,
            active_low: true,
            poll_interval_ms: 50,
        }
    }
}

/// Microphone capture format agreed with the remote peer
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name, system default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel in one forwarded frame
    pub frame_samples: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: 16_000,
            channels: 1,
            frame_samples: 1_024,
        }
    }
}

impl AudioConfig {
    pub fn capture_format(&self) -> CaptureFormat {
        CaptureFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            frame_samples: self.frame_samples,
        }
    }
}

impl ClientConfig {
    /// Parses and validates a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the config file at `path`
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading configuration from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let config = Self::from_toml_str(&content)?;
        info!(
            "Loaded configuration from {} (server: {})",
            path.display(),
            config.server.url
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.server.url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("server.url must not be empty".into()));
        }
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "server.url must be a ws:// or wss:// URL, got '{}'",
                url
            )));
        }
        if self.server.outbound_capacity == 0 {
            return Err(ConfigError::Invalid(
                "server.outbound_capacity must be greater than zero".into(),
            ));
        }
        if self.server.end_marker.is_empty() {
            return Err(ConfigError::Invalid("server.end_marker must not be empty".into()));
        }

        for (name, value) in [
            ("joystick.poll_interval_ms", self.joystick.poll_interval_ms),
            ("button.poll_interval_ms", self.button.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than zero", name)));
            }
        }
        for (name, channel) in [
            ("joystick.x_channel", self.joystick.x_channel),
            ("joystick.y_channel", self.joystick.y_channel),
        ] {
            if channel > 3 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be between 0 and 3, got {}",
                    name, channel
                )));
            }
        }
        if self.joystick.x_channel == self.joystick.y_channel {
            return Err(ConfigError::Invalid(
                "joystick.x_channel and joystick.y_channel must differ".into(),
            ));
        }

        if self.audio.sample_rate == 0 || self.audio.channels == 0 || self.audio.frame_samples == 0 {
            return Err(ConfigError::Invalid(
                "audio.sample_rate, audio.channels and audio.frame_samples must be non-zero".into(),
            ));
        }

        self.labels.validate().map_err(ConfigError::Invalid)
    }

    pub fn axis_channels(&self) -> AxisChannels {
        AxisChannels {
            x: self.joystick.x_channel,
            y: self.joystick.y_channel,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.joystick.poll_interval_ms)
    }

    pub fn sensor_backoff(&self) -> Duration {
        Duration::from_millis(self.joystick.error_backoff_ms)
    }

    pub fn button_interval(&self) -> Duration {
        Duration::from_millis(self.button.poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.server.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.server.connect_timeout_ms)
    }
}

/// Default location of the config file
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    Ok(path)
}

/// Writes the default config file if nothing exists at `path` yet
pub async fn ensure_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    };

    if tokio::fs::try_exists(path).await.map_err(io_err)? {
        debug!("Config file already exists at {}", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, DEFAULT_CONFIG_TOML)
        .await
        .map_err(io_err)?;
    info!("Wrote default configuration to {}", path.display());
    Ok(())
}
