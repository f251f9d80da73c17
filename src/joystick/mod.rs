//! Joystick subsystem
//!
//! Turns raw analog axis readings into discrete direction labels and reports
//! them only when they change:
//!
//! 1. [`calibration`] - median rest position and thresholds, once per session
//! 2. [`direction`] - pure classification of one reading against the profile
//! 3. [`poller`] - periodic sampling with change detection
//!
//! ```text
//! AxisSource ──► Calibrator ──► CalibrationProfile
//!     │                               │
//!     └────────► JoystickPoller ◄─────┘ ──► Direction ──► OutboundTx
//! ```

pub mod calibration;
pub mod direction;
pub mod poller;

use crate::error::SensorError;
use std::future::Future;

pub use calibration::{median, CalibrationProfile, Calibrator};
pub use direction::{Axis, Direction, DirectionClassifier, LabelMap, NEUTRAL_LABEL};
pub use poller::JoystickPoller;

/// ADC input numbers the two joystick axes are wired to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisChannels {
    pub x: u8,
    pub y: u8,
}

/// Source of raw analog axis samples.
///
/// A failed read is a transient condition; callers decide whether to retry.
pub trait AxisSource: Send {
    fn read_axis(&mut self, channel: u8) -> impl Future<Output = Result<i32, SensorError>> + Send;

    /// Reads both axes, X first
    fn read_pair(
        &mut self,
        channels: AxisChannels,
    ) -> impl Future<Output = Result<(i32, i32), SensorError>> + Send {
        async move {
            let x = self.read_axis(channels.x).await?;
            let y = self.read_axis(channels.y).await?;
            Ok((x, y))
        }
    }
}
