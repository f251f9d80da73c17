#![allow(dead_code)]

use futures_util::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stickcast::audio::{AudioFrame, CaptureDevice, CaptureFormat, CaptureSource};
use stickcast::config::ClientConfig;
use stickcast::error::{CaptureError, SensorError, TransportError};
use stickcast::joystick::AxisSource;
use stickcast::transport::{Connector, OutboundMessage, Transport};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Config with short timings and a 1000/1000 rest position of +-100 counts
pub fn fast_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.calibration.samples = 3;
    config.calibration.settle_delay_ms = 0;
    config.calibration.sample_delay_ms = 1;
    config.calibration.threshold_delta = 100;
    config.joystick.poll_interval_ms = 5;
    config.joystick.error_backoff_ms = 5;
    config.button.poll_interval_ms = 5;
    config.server.reconnect_delay_ms = 100;
    config.server.connect_timeout_ms = 1_000;
    config.audio.frame_samples = 4;
    config
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Joystick whose position the test can move at any time
#[derive(Clone)]
pub struct MockAxes {
    pub position: Arc<Mutex<(i32, i32)>>,
    pub broken: bool,
}

impl MockAxes {
    pub fn centered() -> Self {
        Self {
            position: Arc::new(Mutex::new((1_000, 1_000))),
            broken: false,
        }
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::centered()
        }
    }

    pub fn move_to(&self, x: i32, y: i32) {
        *self.position.lock().unwrap() = (x, y);
    }
}

impl AxisSource for MockAxes {
    async fn read_axis(&mut self, channel: u8) -> Result<i32, SensorError> {
        if self.broken {
            return Err(SensorError::Bus("no ACK from 0x48".into()));
        }
        let (x, y) = *self.position.lock().unwrap();
        Ok(if channel == 0 { x } else { y })
    }
}

/// Capture source counting device opens and closes. Devices yield
/// `frames` frames (unbounded when `None`), one every millisecond, then
/// block until released, or report end of audio when `ends` is set.
#[derive(Clone, Default)]
pub struct MockCapture {
    pub frames: Option<usize>,
    pub ends: bool,
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl MockCapture {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn limited(frames: usize) -> Self {
        Self {
            frames: Some(frames),
            ..Self::default()
        }
    }

    pub fn ending_after(frames: usize) -> Self {
        Self {
            frames: Some(frames),
            ends: true,
            ..Self::default()
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct MockDevice {
    format: CaptureFormat,
    remaining: Option<usize>,
    ends: bool,
    served: u8,
    closes: Arc<AtomicUsize>,
}

impl CaptureSource for MockCapture {
    fn open<'a>(
        &'a self,
        format: &'a CaptureFormat,
    ) -> BoxFuture<'a, Result<Box<dyn CaptureDevice>, CaptureError>> {
        Box::pin(async move {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let device: Box<dyn CaptureDevice> = Box::new(MockDevice {
                format: format.clone(),
                remaining: self.frames,
                ends: self.ends,
                served: 0,
                closes: self.closes.clone(),
            });
            Ok(device)
        })
    }
}

impl CaptureDevice for MockDevice {
    fn format(&self) -> CaptureFormat {
        self.format.clone()
    }

    fn read_frame(&mut self) -> BoxFuture<'_, Result<Option<AudioFrame>, CaptureError>> {
        Box::pin(async move {
            if let Some(remaining) = self.remaining.as_mut() {
                if *remaining == 0 {
                    if self.ends {
                        return Ok(None);
                    }
                    std::future::pending::<()>().await;
                }
                *remaining -= 1;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            self.served = self.served.wrapping_add(1);
            Ok(Some(AudioFrame::new(vec![self.served; self.format.frame_bytes()])))
        })
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transport recording every message it accepts
#[derive(Clone)]
pub struct MockTransport {
    pub sent: Arc<Mutex<Vec<OutboundMessage>>>,
    pub closed: CancellationToken,
    pub closes: Arc<AtomicUsize>,
    /// Sends fail once this many messages have been accepted
    pub fail_after: Option<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: CancellationToken::new(),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_after: None,
        }
    }

    pub fn failing_after(messages: usize) -> Self {
        Self {
            fail_after: Some(messages),
            ..Self::new()
        }
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.kind() == kind)
            .count()
    }
}

impl Transport for MockTransport {
    async fn send(&mut self, message: OutboundMessage) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let mut sent = self.sent.lock().unwrap();
        if self.fail_after.is_some_and(|limit| sent.len() >= limit) {
            return Err(TransportError::Send("broken pipe".into()));
        }
        sent.push(message);
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }

    fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.cancel();
    }
}

/// Connector failing a number of times before handing out scripted transports.
/// A hanging connector never answers at all.
pub struct MockConnector {
    pub failures: usize,
    pub hang: bool,
    pub transports: VecDeque<MockTransport>,
    pub attempts: Arc<Mutex<Vec<Instant>>>,
    pub connected: Arc<Mutex<Vec<MockTransport>>>,
}

impl MockConnector {
    pub fn new(failures: usize, transports: Vec<MockTransport>) -> Self {
        Self {
            failures,
            hang: false,
            transports: transports.into(),
            attempts: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::new(0, Vec::new())
        }
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&mut self) -> Result<MockTransport, TransportError> {
        self.attempts.lock().unwrap().push(Instant::now());
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.failures > 0 {
            self.failures -= 1;
            return Err(TransportError::Connect("connection refused".into()));
        }
        let transport = self
            .transports
            .pop_front()
            .ok_or_else(|| TransportError::Connect("no more transports".into()))?;
        self.connected.lock().unwrap().push(transport.clone());
        Ok(transport)
    }

    fn target(&self) -> String {
        "mock://peer".to_string()
    }
}
