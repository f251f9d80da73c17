//! Push-to-talk audio capture
//!
//! [`capture`] defines the device contracts and the release guard,
//! [`streaming`] runs one capture-to-outbound forwarding task per press.
//! [`feed`] carries frames and faults out of a realtime capture callback.
//! The cpal backend is only built with the `cpal` feature.

pub mod capture;
#[cfg(feature = "cpal")]
pub mod cpal_capture;
pub mod feed;
pub mod streaming;

pub use capture::{
    AudioFrame, CaptureDevice, CaptureFormat, CaptureGuard, CaptureSource, DisabledCapture,
};
#[cfg(feature = "cpal")]
pub use cpal_capture::CpalCaptureSource;
pub use feed::{frame_feed, FaultReporter, FrameFeed, FrameWriter};
pub use streaming::{StreamExitKind, StreamHandle, StreamReport, StreamState, StreamingTask};
