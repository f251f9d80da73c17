//! Error types shared across the client.
//!
//! Every fallible layer has its own enum so callers can tell a dead sensor
//! from a dead connection. `SessionError` is the only one that crosses the
//! session boundary; the reconnect loop logs it and retries.

use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration directory available on this system")]
    NoConfigDir,

    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A single failed axis read.
///
/// Treated as transient by the joystick poller.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("I2C bus error: {0}")]
    Bus(String),

    #[error("Invalid ADC channel {0}")]
    InvalidChannel(u8),

    #[error("Sensor unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Calibration requires at least one sample")]
    NoSamples,

    #[error("Failed to read sample {sample} during calibration: {source}")]
    Sensor {
        sample: usize,
        #[source]
        source: SensorError,
    },
}

/// Capture resource failures. Any of them ends the owning streaming task.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to open capture device: {0}")]
    Open(String),

    #[error("Capture device does not support {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read audio frame: {0}")]
    Read(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Connection attempt timed out")]
    Timeout,

    #[error("Failed to send message: {0}")]
    Send(String),

    #[error("Connection closed")]
    Closed,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Reasons a session ended without a shutdown request
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Calibration failed: {0}")]
    Calibration(#[from] CalibrationError),
}
