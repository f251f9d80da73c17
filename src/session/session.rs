use super::Devices;
use crate::button::{ButtonMonitor, ButtonSource};
use crate::config::ClientConfig;
use crate::error::{SessionError, TransportError};
use crate::joystick::{AxisSource, Calibrator, DirectionClassifier, JoystickPoller};
use crate::transport::{OutboundMessage, OutboundTx, Transport};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Messages handed to the transport during one session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub directions: u64,
    pub audio_frames: u64,
    pub end_markers: u64,
}

impl SessionStats {
    fn record(&mut self, message: &OutboundMessage) {
        match message {
            OutboundMessage::Direction(_) => self.directions += 1,
            OutboundMessage::Audio(_) => self.audio_frames += 1,
            OutboundMessage::EndOfStream => self.end_markers += 1,
        }
    }
}

/// Sole writer of the transport.
///
/// Drains `rx` in FIFO order until every producer has dropped its sender,
/// then closes the transport. A failed send or a close signalled by the peer
/// cancels `session` and returns the error; dropping `rx` on return makes
/// every later enqueue fail with [`TransportError::Closed`].
pub async fn pump<T: Transport>(
    transport: &mut T,
    mut rx: mpsc::Receiver<OutboundMessage>,
    session: &CancellationToken,
    stats: &mut SessionStats,
) -> Result<(), TransportError> {
    let peer_closed = transport.close_signal();

    let result = loop {
        let message = tokio::select! {
            biased;
            _ = peer_closed.cancelled() => break Err(TransportError::Closed),
            message = rx.recv() => message,
        };
        let Some(message) = message else {
            debug!("All producers finished, outbound queue drained");
            break Ok(());
        };

        let kind = message.kind();
        stats.record(&message);
        if let Err(e) = transport.send(message).await {
            warn!("Failed to send {} message: {}", kind, e);
            break Err(e);
        }
    };

    if result.is_err() {
        session.cancel();
    }
    transport.close().await;
    result
}

pub struct Session<'a, A, B> {
    id: u64,
    config: &'a ClientConfig,
    devices: &'a mut Devices<A, B>,
}

impl<'a, A: AxisSource, B: ButtonSource> Session<'a, A, B> {
    pub fn new(id: u64, config: &'a ClientConfig, devices: &'a mut Devices<A, B>) -> Self {
        Self {
            id,
            config,
            devices,
        }
    }

    /// Runs until the transport fails, a producer fails, or `shutdown` is
    /// cancelled. All producers and any active audio stream have terminated
    /// when this returns. A shutdown-driven end is `Ok`.
    pub async fn run<T: Transport>(
        self,
        mut transport: T,
        shutdown: &CancellationToken,
    ) -> Result<SessionStats, SessionError> {
        let id = self.id;
        let config = self.config;
        let Devices {
            axes,
            button,
            capture,
        } = self.devices;

        let token = shutdown.child_token();
        let (outbound, rx) = OutboundTx::channel(config.server.outbound_capacity);
        let mut stats = SessionStats::default();

        info!("Session {} started", id);

        let producers = async {
            // Owned by the block body so every sender is gone when it returns
            let outbound = outbound;

            let calibrator = Calibrator::new(config.axis_channels(), &config.calibration);
            let profile = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                profile = calibrator.calibrate(axes) => profile?,
            };

            let mut poller = JoystickPoller::new(
                DirectionClassifier::new(config.labels.clone()),
                profile,
                config.axis_channels(),
                config.poll_interval(),
                config.sensor_backoff(),
            );
            let mut monitor =
                ButtonMonitor::new(config.button_interval(), config.audio.capture_format());

            let (polled, monitored) = tokio::join!(
                async {
                    let result = poller.run(axes, &outbound, &token).await;
                    token.cancel();
                    result
                },
                async {
                    let result = monitor.run(&*button, &*capture, &outbound, &token).await;
                    token.cancel();
                    result
                }
            );
            polled?;
            monitored?;
            Ok::<(), SessionError>(())
        };

        let (pumped, produced) = tokio::join!(
            pump(&mut transport, rx, &token, &mut stats),
            producers
        );

        info!(
            "Session {} ended: {} directions, {} audio frames, {} end markers sent",
            id, stats.directions, stats.audio_frames, stats.end_markers
        );

        if shutdown.is_cancelled() {
            return Ok(stats);
        }
        pumped?;
        produced?;
        Ok(stats)
    }
}
