//! Push-to-talk button handling
//!
//! [`ButtonMonitor`] samples the button once per tick and drives the audio
//! stream lifecycle:
//!
//! ```text
//!          pressed, no stream
//!   Idle ─────────────────────► Streaming
//!    ▲                              │
//!    └──────────────────────────────┘
//!     released: cancel, await, send end marker
//! ```

use crate::audio::{CaptureFormat, CaptureSource, StreamHandle, StreamReport};
use crate::error::TransportError;
use crate::transport::{OutboundMessage, OutboundTx};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Current physical state of a digital input. Reads are assumed to succeed.
pub trait ButtonSource: Send + Sync {
    fn is_pressed(&self) -> bool;
}

impl ButtonSource for AtomicBool {
    fn is_pressed(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl<B: ButtonSource + ?Sized> ButtonSource for Arc<B> {
    fn is_pressed(&self) -> bool {
        (**self).is_pressed()
    }
}

impl<B: ButtonSource + ?Sized> ButtonSource for Box<B> {
    fn is_pressed(&self) -> bool {
        (**self).is_pressed()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Streaming,
}

pub struct ButtonMonitor {
    poll_interval: Duration,
    format: CaptureFormat,
    active: Option<StreamHandle>,
    finished_logged: bool,
    last_report: Option<StreamReport>,
}

impl ButtonMonitor {
    pub fn new(poll_interval: Duration, format: CaptureFormat) -> Self {
        Self {
            poll_interval,
            format,
            active: None,
            finished_logged: false,
            last_report: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        if self.active.is_some() {
            MonitorState::Streaming
        } else {
            MonitorState::Idle
        }
    }

    /// Report of the most recently stopped stream
    pub fn last_report(&self) -> Option<&StreamReport> {
        self.last_report.as_ref()
    }

    /// Samples the button until `stop` is cancelled or the outbound path
    /// closes. An active stream is always stopped and awaited before this
    /// returns.
    pub async fn run<B: ButtonSource + ?Sized>(
        &mut self,
        button: &B,
        capture: &Arc<dyn CaptureSource>,
        outbound: &OutboundTx,
        stop: &CancellationToken,
    ) -> Result<(), TransportError> {
        info!("Watching push-to-talk button every {:?}", self.poll_interval);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                _ = stop.cancelled() => break Ok(()),
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.on_sample(button.is_pressed(), capture, outbound).await {
                break Err(e);
            }
        };

        self.teardown(outbound).await;
        debug!("Button monitor stopped");
        result
    }

    /// Applies one button sample
    pub async fn on_sample(
        &mut self,
        pressed: bool,
        capture: &Arc<dyn CaptureSource>,
        outbound: &OutboundTx,
    ) -> Result<(), TransportError> {
        match (pressed, self.active.is_some()) {
            (true, false) => {
                let handle =
                    StreamHandle::spawn(capture.clone(), self.format.clone(), outbound.clone());
                info!("Button pressed, started audio stream {}", handle.id());
                self.active = Some(handle);
                self.finished_logged = false;
            }
            (true, true) => {
                if let Some(handle) = &self.active {
                    if handle.is_finished() && !self.finished_logged {
                        warn!(
                            "Audio stream {} ended while the button is held, waiting for release",
                            handle.id()
                        );
                        self.finished_logged = true;
                    }
                }
            }
            (false, true) => {
                self.stop_active().await;
                outbound.send(OutboundMessage::EndOfStream).await?;
                debug!("End marker enqueued");
            }
            (false, false) => {}
        }
        Ok(())
    }

    /// Stops an active stream and makes a best-effort attempt to enqueue the
    /// end marker. Used when the session is going away.
    pub async fn teardown(&mut self, outbound: &OutboundTx) {
        if self.stop_active().await.is_none() {
            return;
        }
        if let Err(e) = outbound.try_send(OutboundMessage::EndOfStream) {
            debug!("End marker dropped during teardown: {}", e);
        }
    }

    async fn stop_active(&mut self) -> Option<StreamReport> {
        let handle = self.active.take()?;
        let id = handle.id();
        debug!("Stopping audio stream {}", id);
        let report = handle.stop().await;
        info!(
            "Audio stream {} stopped ({:?}, {} frames)",
            id, report.exit, report.frames_sent
        );
        self.last_report = Some(report.clone());
        Some(report)
    }
}
