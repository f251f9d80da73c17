//! # Session Management
//!
//! A [`Session`] is one connection lifetime: calibrate, then run the joystick
//! poller and the button monitor against a single outbound path until the
//! connection drops or shutdown is requested. [`ReconnectLoop`] starts a new
//! session after a fixed delay whenever one ends.
//!
//! ```text
//! ReconnectLoop ──connect──► Session ──┬─► pump ──► Transport
//!       ▲                              ├─► JoystickPoller
//!       └──────── session ended ───────┴─► ButtonMonitor ──► StreamingTask
//! ```
//!
//! Hardware handles live in [`Devices`] and outlive sessions, so calibration
//! and capture reuse the same peripherals after a reconnect.

pub mod reconnect;
pub mod session;

use crate::audio::CaptureSource;
use std::sync::Arc;

pub use reconnect::ReconnectLoop;
pub use session::{pump, Session, SessionStats};

/// Peripherals shared by every session of the process
pub struct Devices<A, B> {
    pub axes: A,
    pub button: B,
    pub capture: Arc<dyn CaptureSource>,
}

impl<A, B> Devices<A, B> {
    pub fn new(axes: A, button: B, capture: Arc<dyn CaptureSource>) -> Self {
        Self {
            axes,
            button,
            capture,
        }
    }
}
