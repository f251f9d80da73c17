//! Hand-off from a realtime capture callback to the async frame reader
//!
//! The callback side never blocks: completed frames go out with `try_send`,
//! and a full queue drops the frame and flags the next one as overflowed.
//! Stream faults travel on a separate watch channel, so a reader parked on an
//! empty queue still wakes up when the device fails.

use super::capture::AudioFrame;
use crate::error::CaptureError;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

/// Creates the three ends of a feed for frames of `frame_bytes` bytes
pub fn frame_feed(
    frame_bytes: usize,
    capacity: usize,
) -> (FrameWriter, FaultReporter, FrameFeed) {
    let (frames_tx, frames_rx) = mpsc::channel(capacity);
    let (fault_tx, fault_rx) = watch::channel(None);
    (
        FrameWriter {
            frame_bytes,
            pending: Vec::with_capacity(frame_bytes),
            overflowed: false,
            frames: frames_tx,
        },
        FaultReporter { fault: fault_tx },
        FrameFeed {
            frames: frames_rx,
            fault: fault_rx,
        },
    )
}

/// Callback side: packs i16 samples into little-endian frames
pub struct FrameWriter {
    frame_bytes: usize,
    pending: Vec<u8>,
    overflowed: bool,
    frames: mpsc::Sender<AudioFrame>,
}

impl FrameWriter {
    pub fn push_samples(&mut self, samples: &[i16]) {
        for sample in samples {
            self.pending.extend_from_slice(&sample.to_le_bytes());
            if self.pending.len() < self.frame_bytes {
                continue;
            }
            let data = std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_bytes));
            let mut frame = AudioFrame::new(data);
            frame.overflowed = self.overflowed;
            match self.frames.try_send(frame) {
                Ok(()) => self.overflowed = false,
                Err(TrySendError::Full(_)) => self.overflowed = true,
                // reader released the device
                Err(TrySendError::Closed(_)) => return,
            }
        }
    }
}

/// Error-callback side
pub struct FaultReporter {
    fault: watch::Sender<Option<String>>,
}

impl FaultReporter {
    pub fn report(&self, message: impl Into<String>) {
        self.fault.send_replace(Some(message.into()));
    }
}

/// Async side, owned by the capture device
pub struct FrameFeed {
    frames: mpsc::Receiver<AudioFrame>,
    fault: watch::Receiver<Option<String>>,
}

impl FrameFeed {
    /// Next frame, `Ok(None)` once the writer is gone and the queue is
    /// drained. A reported fault wins over queued frames.
    pub async fn next(&mut self) -> Result<Option<AudioFrame>, CaptureError> {
        let fault = self.fault.borrow_and_update().clone();
        if let Some(message) = fault {
            return Err(CaptureError::Read(message));
        }

        tokio::select! {
            biased;
            Ok(()) = self.fault.changed() => {
                let message = self
                    .fault
                    .borrow_and_update()
                    .clone()
                    .unwrap_or_else(|| "input stream error".to_string());
                Err(CaptureError::Read(message))
            }
            frame = self.frames.recv() => Ok(frame),
        }
    }

    /// Stops accepting frames from the writer
    pub fn close(&mut self) {
        self.frames.close();
    }
}
