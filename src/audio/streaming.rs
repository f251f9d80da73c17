//! Audio streaming task with statum typestate lifecycle
//!
//! # State Machine
//!
//! ```text
//! Starting ──► Streaming ──► Stopping  ──┐
//!    │             ├───────► Cancelled ──┼──► Closed
//!    │             └───────► Failed ─────┤
//!    ├─────────────────────► Cancelled ──┤
//!    └─────────────────────► Failed ─────┘
//! ```
//!
//! A task cancelled before or while its device is opening never holds the
//! device.
//!
//! Every exit state funnels through `close`, which releases the capture
//! device. The device is also wrapped in a [`CaptureGuard`], so a task that is
//! aborted or panics still releases it exactly once.

use super::capture::{AudioFrame, CaptureFormat, CaptureGuard, CaptureSource};
use crate::error::CaptureError;
use crate::transport::{OutboundMessage, OutboundTx};
use chrono::{DateTime, Local};
use statum::{machine, state};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

#[state]
#[derive(Debug, Clone)]
pub enum StreamState {
    Starting,  // Opening and validating the capture device
    Streaming, // Forwarding frames
    Stopping,  // Device reported end of audio
    Cancelled, // Owner requested stop
    Failed,    // Open, validation, read or send failure
    Closed,    // Device released
}

#[machine]
pub struct StreamingTask<S: StreamState> {
    id: u64,
    format: CaptureFormat,
    outbound: OutboundTx,
    cancel: CancellationToken,
    capture: Option<CaptureGuard>,
    frames_sent: u64,
    failure: Option<String>,
    started_at: DateTime<Local>,
}

/// How a streaming task ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamExitKind {
    Stopped,
    Cancelled,
    Failed,
}

/// Summary handed back to the owner once the task has fully terminated
#[derive(Clone, Debug, PartialEq)]
pub struct StreamReport {
    pub id: u64,
    pub exit: StreamExitKind,
    pub frames_sent: u64,
    pub failure: Option<String>,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
}

/// Exit states of the streaming loop
pub enum StreamExit {
    Stopped(StreamingTask<Stopping>),
    Cancelled(StreamingTask<Cancelled>),
    Failed(StreamingTask<Failed>),
}

impl StreamExit {
    pub fn close(self) -> StreamReport {
        match self {
            StreamExit::Stopped(task) => task.close(),
            StreamExit::Cancelled(task) => task.close(),
            StreamExit::Failed(task) => task.close(),
        }
    }
}

enum Step {
    Cancel,
    Read(Result<Option<AudioFrame>, CaptureError>),
}

impl<S: StreamState> StreamingTask<S> {
    fn release_capture(&mut self) {
        if let Some(guard) = self.capture.as_mut() {
            guard.release();
        }
    }
}

impl StreamingTask<Starting> {
    pub fn create(
        id: u64,
        format: CaptureFormat,
        outbound: OutboundTx,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(
            id,
            format,
            outbound,
            cancel,
            None,         // capture
            0,            // frames_sent
            None,         // failure
            Local::now(), // started_at
        )
    }

    /// Opens the capture device and checks it delivers the required format.
    /// Cancellation before or during the open skips the device entirely.
    pub async fn acquire(
        mut self,
        source: &dyn CaptureSource,
    ) -> Result<StreamingTask<Streaming>, StreamExit> {
        let cancel = self.cancel.clone();
        if cancel.is_cancelled() {
            debug!("Stream {} cancelled before its device was opened", self.id);
            return Err(StreamExit::Cancelled(self.transition()));
        }
        debug!("Opening capture device for stream {} ({})", self.id, self.format);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = source.open(&self.format) => Some(opened),
        };
        let device = match opened {
            None => {
                debug!("Stream {} cancelled while opening its device", self.id);
                return Err(StreamExit::Cancelled(self.transition()));
            }
            Some(Ok(device)) => device,
            Some(Err(e)) => {
                error!("Stream {}: {}", self.id, e);
                self.failure = Some(e.to_string());
                return Err(StreamExit::Failed(self.transition()));
            }
        };

        let guard = CaptureGuard::new(device);
        let actual = guard.format();
        self.capture = Some(guard);

        if actual != self.format {
            let e = CaptureError::UnsupportedFormat(format!(
                "{} (device delivers {})",
                self.format, actual
            ));
            error!("Stream {}: {}", self.id, e);
            self.failure = Some(e.to_string());
            return Err(StreamExit::Failed(self.transition()));
        }

        Ok(self.transition())
    }

    /// Drives the whole lifecycle and returns once the device is released
    pub async fn run(self, source: &dyn CaptureSource) -> StreamReport {
        match self.acquire(source).await {
            Ok(streaming) => streaming.stream().await.close(),
            Err(exit) => exit.close(),
        }
    }
}

impl StreamingTask<Streaming> {
    /// Forwards frames until cancelled, the device ends or fails, or the
    /// outbound path closes. Cancellation is checked before every read and
    /// every send.
    pub async fn stream(mut self) -> StreamExit {
        info!("Audio stream {} started ({})", self.id, self.format);
        let cancel = self.cancel.clone();

        loop {
            let step = match self.capture.as_mut() {
                Some(guard) => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Step::Cancel,
                    read = guard.read_frame() => Step::Read(read),
                },
                None => Step::Read(Err(CaptureError::Read("no capture device".to_string()))),
            };

            let frame = match step {
                Step::Cancel => return StreamExit::Cancelled(self.transition()),
                Step::Read(Ok(Some(frame))) => frame,
                Step::Read(Ok(None)) => {
                    info!("Capture device for stream {} reached end of audio", self.id);
                    return StreamExit::Stopped(self.transition());
                }
                Step::Read(Err(e)) => {
                    warn!("Stream {}: {}", self.id, e);
                    self.failure = Some(e.to_string());
                    return StreamExit::Failed(self.transition());
                }
            };

            if frame.overflowed {
                warn!("Audio buffer overflow on stream {}", self.id);
            }

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                sent = self.outbound.send(OutboundMessage::Audio(frame.data)) => Some(sent),
            };
            match sent {
                None => return StreamExit::Cancelled(self.transition()),
                Some(Ok(())) => self.frames_sent += 1,
                Some(Err(e)) => {
                    warn!("Stream {} lost its outbound path: {}", self.id, e);
                    self.failure = Some(e.to_string());
                    return StreamExit::Failed(self.transition());
                }
            }
        }
    }
}

impl StreamingTask<Stopping> {
    pub fn close(mut self) -> StreamReport {
        self.release_capture();
        let closed: StreamingTask<Closed> = self.transition();
        closed.report(StreamExitKind::Stopped)
    }
}

impl StreamingTask<Cancelled> {
    pub fn close(mut self) -> StreamReport {
        self.release_capture();
        let closed: StreamingTask<Closed> = self.transition();
        closed.report(StreamExitKind::Cancelled)
    }
}

impl StreamingTask<Failed> {
    pub fn close(mut self) -> StreamReport {
        self.release_capture();
        let closed: StreamingTask<Closed> = self.transition();
        closed.report(StreamExitKind::Failed)
    }
}

impl StreamingTask<Closed> {
    fn report(self, exit: StreamExitKind) -> StreamReport {
        let ended_at = Local::now();
        info!(
            "Audio stream {} closed ({:?}) after {} frames in {} ms",
            self.id,
            exit,
            self.frames_sent,
            (ended_at - self.started_at).num_milliseconds()
        );
        StreamReport {
            id: self.id,
            exit,
            frames_sent: self.frames_sent,
            failure: self.failure.clone(),
            started_at: self.started_at,
            ended_at,
        }
    }
}

/// Owner's handle on a spawned streaming task
#[derive(Debug)]
pub struct StreamHandle {
    id: u64,
    cancel: CancellationToken,
    join: JoinHandle<StreamReport>,
}

impl StreamHandle {
    /// Spawns a new streaming task on the tokio runtime
    pub fn spawn(
        source: Arc<dyn CaptureSource>,
        format: CaptureFormat,
        outbound: OutboundTx,
    ) -> Self {
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let task = StreamingTask::create(id, format, outbound, cancel.clone());
        let join = tokio::spawn(async move { task.run(source.as_ref()).await });
        debug!("Spawned audio stream {}", id);
        Self { id, cancel, join }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The task ended on its own (failure or end of audio)
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Requests cancellation and waits until the task has released its
    /// device. No frame of this task is enqueued after this returns.
    pub async fn stop(self) -> StreamReport {
        self.cancel.cancel();
        match self.join.await {
            Ok(report) => report,
            Err(e) => {
                error!("Audio stream {} task aborted: {}", self.id, e);
                let now = Local::now();
                StreamReport {
                    id: self.id,
                    exit: StreamExitKind::Failed,
                    frames_sent: 0,
                    failure: Some(e.to_string()),
                    started_at: now,
                    ended_at: now,
                }
            }
        }
    }
}
