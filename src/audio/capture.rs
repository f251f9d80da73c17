//! Capture resource contracts and the release guard

use crate::error::CaptureError;
use futures_util::future::BoxFuture;
use std::fmt;
use tracing::debug;

/// Sample layout agreed with the peer out of band. Samples are always
/// 16-bit signed little-endian PCM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel in one frame
    pub frame_samples: usize,
}

impl CaptureFormat {
    /// Size of one frame on the wire
    pub fn frame_bytes(&self) -> usize {
        self.frame_samples * usize::from(self.channels) * 2
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {} samples/frame, i16",
            self.sample_rate, self.channels, self.frame_samples
        )
    }
}

/// One captured block of raw PCM bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioFrame {
    pub data: Vec<u8>,
    /// Samples were dropped before this frame because the reader fell behind
    pub overflowed: bool,
}

impl AudioFrame {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            overflowed: false,
        }
    }
}

/// An opened capture device, exclusively owned by one streaming task
pub trait CaptureDevice: Send {
    /// Format the device is actually delivering
    fn format(&self) -> CaptureFormat;

    /// Next frame; `Ok(None)` when the device has no more audio to give
    fn read_frame(&mut self) -> BoxFuture<'_, Result<Option<AudioFrame>, CaptureError>>;

    /// Releases the underlying device
    fn close(&mut self);
}

/// Factory for capture devices, shared by every streaming task of the process
pub trait CaptureSource: Send + Sync {
    fn open<'a>(
        &'a self,
        format: &'a CaptureFormat,
    ) -> BoxFuture<'a, Result<Box<dyn CaptureDevice>, CaptureError>>;
}

/// Owns an open device and closes it exactly once: on explicit
/// [`release`](CaptureGuard::release) or on drop, whichever comes first.
pub struct CaptureGuard {
    device: Box<dyn CaptureDevice>,
    released: bool,
}

impl CaptureGuard {
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        Self {
            device,
            released: false,
        }
    }

    pub fn format(&self) -> CaptureFormat {
        self.device.format()
    }

    pub fn read_frame(&mut self) -> BoxFuture<'_, Result<Option<AudioFrame>, CaptureError>> {
        if self.released {
            return Box::pin(async {
                Err(CaptureError::Read("capture device already released".to_string()))
            });
        }
        self.device.read_frame()
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.device.close();
        debug!("Capture device released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Source used when the binary is built without an audio backend. Every
/// open fails, so button presses still produce a clean start/stop cycle.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledCapture;

impl CaptureSource for DisabledCapture {
    fn open<'a>(
        &'a self,
        _format: &'a CaptureFormat,
    ) -> BoxFuture<'a, Result<Box<dyn CaptureDevice>, CaptureError>> {
        Box::pin(async {
            Err(CaptureError::Open(
                "audio capture support is not compiled in (enable the `cpal` feature)"
                    .to_string(),
            ))
        })
    }
}
