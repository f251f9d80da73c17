//! stickcast: a Raspberry Pi remote-control client.
//!
//! Streams joystick directions and push-to-talk audio from locally attached
//! hardware to a remote WebSocket peer, reconnecting whenever the link drops.

pub mod audio;
pub mod button;
pub mod config;
pub mod error;
pub mod hardware;
pub mod joystick;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use error::{
    CalibrationError, CaptureError, ConfigError, SensorError, SessionError, TransportError,
};
