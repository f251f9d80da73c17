//! Microphone capture through cpal
//!
//! A cpal `Stream` is not `Send` on every host, so each opened device gets a
//! dedicated OS thread that builds the stream, keeps it alive and drops it on
//! close. The input callback reassembles host buffers into fixed-size frames
//! and hands them to the async side through a [`frame_feed`].

use super::capture::{AudioFrame, CaptureDevice, CaptureFormat, CaptureSource};
use super::feed::{frame_feed, FaultReporter, FrameFeed, FrameWriter};
use crate::error::CaptureError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use futures_util::future::BoxFuture;
use std::thread::JoinHandle;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Frames buffered between the audio thread and the streaming task
const FRAME_QUEUE: usize = 32;

#[derive(Clone, Debug, Default)]
pub struct CpalCaptureSource {
    device_name: Option<String>,
}

impl CpalCaptureSource {
    /// `None` selects the host's default input device
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

impl CaptureSource for CpalCaptureSource {
    fn open<'a>(
        &'a self,
        format: &'a CaptureFormat,
    ) -> BoxFuture<'a, Result<Box<dyn CaptureDevice>, CaptureError>> {
        Box::pin(async move {
            let (ready_tx, ready_rx) = oneshot::channel();
            let (writer, faults, feed) = frame_feed(format.frame_bytes(), FRAME_QUEUE);
            let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

            let device_name = self.device_name.clone();
            let thread_format = format.clone();
            let thread = std::thread::Builder::new()
                .name("audio-capture".to_string())
                .spawn(move || {
                    capture_thread(
                        device_name,
                        thread_format,
                        writer,
                        faults,
                        ready_tx,
                        stop_rx,
                    )
                })
                .map_err(|e| CaptureError::Open(e.to_string()))?;

            match ready_rx.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(CaptureError::Open(
                        "capture thread exited before the stream started".to_string(),
                    ))
                }
            }

            let device: Box<dyn CaptureDevice> = Box::new(CpalCaptureDevice {
                format: format.clone(),
                feed,
                stop: Some(stop_tx),
                thread: Some(thread),
            });
            Ok(device)
        })
    }
}

struct CpalCaptureDevice {
    format: CaptureFormat,
    feed: FrameFeed,
    stop: Option<std::sync::mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureDevice for CpalCaptureDevice {
    fn format(&self) -> CaptureFormat {
        self.format.clone()
    }

    fn read_frame(&mut self) -> BoxFuture<'_, Result<Option<AudioFrame>, CaptureError>> {
        Box::pin(self.feed.next())
    }

    fn close(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            join_capture_thread(thread);
        }
        self.feed.close();
    }
}

/// Waits until the capture thread has dropped its stream. On a multi-threaded
/// runtime the wait is moved off the async worker.
fn join_capture_thread(thread: JoinHandle<()>) {
    let join = move || {
        if thread.join().is_err() {
            warn!("Audio capture thread panicked");
        }
    };
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(join)
        }
        _ => join(),
    }
}

fn capture_thread(
    device_name: Option<String>,
    format: CaptureFormat,
    writer: FrameWriter,
    faults: FaultReporter,
    ready: oneshot::Sender<Result<(), CaptureError>>,
    stop: std::sync::mpsc::Receiver<()>,
) {
    let stream = match build_stream(device_name.as_deref(), &format, writer, faults) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready.send(Err(CaptureError::Open(e.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));

    // Returns on close() or when the device handle is dropped
    let _ = stop.recv();
    drop(stream);
    debug!("Audio capture thread finished");
}

fn find_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::Open("no default input device".to_string())),
        Some(name) => host
            .input_devices()
            .map_err(|e| CaptureError::Open(e.to_string()))?
            .find(|device| device.name().is_ok_and(|n| n == name))
            .ok_or_else(|| CaptureError::Open(format!("input device '{}' not found", name))),
    }
}

fn build_stream(
    device_name: Option<&str>,
    format: &CaptureFormat,
    mut writer: FrameWriter,
    faults: FaultReporter,
) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    debug!("Audio host: {:?}", host.id());
    let device = find_device(&host, device_name)?;
    let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

    // Frames are reassembled in the callback, so the host picks its own
    // buffer size.
    let config = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let on_data = move |data: &[i16], _: &cpal::InputCallbackInfo| writer.push_samples(data);
    let on_error = move |e: cpal::StreamError| {
        warn!("Audio input stream error: {}", e);
        faults.report(e.to_string());
    };

    let stream = device
        .build_input_stream::<i16, _, _>(&config, on_data, on_error, None)
        .map_err(|e| match e {
            cpal::BuildStreamError::StreamConfigNotSupported => {
                CaptureError::UnsupportedFormat(format!("{} on '{}'", format, name))
            }
            other => CaptureError::Open(other.to_string()),
        })?;

    info!("Opened input device '{}' ({})", name, format);
    Ok(stream)
}
