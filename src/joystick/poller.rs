//! Periodic joystick sampling with change detection

use super::{AxisChannels, AxisSource, CalibrationProfile, Direction, DirectionClassifier};
use crate::error::TransportError;
use crate::transport::{OutboundMessage, OutboundTx};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Samples both axes every `poll_interval` and enqueues a direction message
/// whenever the classified direction differs from the last one sent.
pub struct JoystickPoller {
    classifier: DirectionClassifier,
    profile: CalibrationProfile,
    channels: AxisChannels,
    poll_interval: Duration,
    error_backoff: Duration,
    last_sent: Option<Direction>,
}

impl JoystickPoller {
    pub fn new(
        classifier: DirectionClassifier,
        profile: CalibrationProfile,
        channels: AxisChannels,
        poll_interval: Duration,
        error_backoff: Duration,
    ) -> Self {
        Self {
            classifier,
            profile,
            channels,
            poll_interval,
            error_backoff,
            last_sent: None,
        }
    }

    pub fn last_sent(&self) -> Option<&Direction> {
        self.last_sent.as_ref()
    }

    /// Classifies one reading and returns it only if it differs from the
    /// previously reported direction. The returned direction becomes the new
    /// reference.
    pub fn observe(&mut self, x: i32, y: i32) -> Option<Direction> {
        let direction = self.classifier.classify(x, y, &self.profile);
        if self.last_sent.as_ref() == Some(&direction) {
            return None;
        }
        debug!(
            "Direction changed: {} -> {} (x={}, y={})",
            self.last_sent
                .as_ref()
                .map(Direction::label)
                .unwrap_or("<none>"),
            direction,
            x,
            y
        );
        self.last_sent = Some(direction.clone());
        Some(direction)
    }

    /// Polls until `stop` is cancelled or the outbound path is closed.
    ///
    /// Sensor read failures never end the loop; the poller backs off and
    /// tries again.
    pub async fn run<A: AxisSource>(
        &mut self,
        source: &mut A,
        outbound: &OutboundTx,
        stop: &CancellationToken,
    ) -> Result<(), TransportError> {
        info!(
            "Starting joystick polling every {:?} on channels x={} y={}",
            self.poll_interval, self.channels.x, self.channels.y
        );
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match source.read_pair(self.channels).await {
                Ok((x, y)) => {
                    if let Some(direction) = self.observe(x, y) {
                        outbound.send(OutboundMessage::Direction(direction)).await?;
                    }
                }
                Err(e) => {
                    warn!(
                        "Joystick read failed: {}, retrying in {:?}",
                        e, self.error_backoff
                    );
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
            }
        }

        debug!("Joystick poller stopped");
        Ok(())
    }
}
