use super::{Devices, Session};
use crate::button::ButtonSource;
use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::joystick::AxisSource;
use crate::transport::Connector;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Keeps a session running against the configured peer, reconnecting after a
/// fixed delay whenever a connection attempt or a session fails.
pub struct ReconnectLoop<C, A, B> {
    connector: C,
    devices: Devices<A, B>,
    config: ClientConfig,
    attempts: u64,
}

impl<C: Connector, A: AxisSource, B: ButtonSource> ReconnectLoop<C, A, B> {
    pub fn new(connector: C, devices: Devices<A, B>, config: ClientConfig) -> Self {
        Self {
            connector,
            devices,
            config,
            attempts: 0,
        }
    }

    /// Connection attempts made so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Runs until `shutdown` is cancelled
    pub async fn run(&mut self, shutdown: &CancellationToken) {
        let target = self.connector.target();
        let delay = self.config.reconnect_delay();

        while !shutdown.is_cancelled() {
            self.attempts += 1;
            let attempt = self.attempts;
            info!("Connecting to {} (attempt {})", target, attempt);

            let connected = tokio::select! {
                _ = shutdown.cancelled() => break,
                connected = self.connect() => connected,
            };

            match connected {
                Ok(transport) => {
                    let session = Session::new(attempt, &self.config, &mut self.devices);
                    match session.run(transport, shutdown).await {
                        Ok(stats) => info!("Session {} finished ({:?})", attempt, stats),
                        Err(e) => error!("Session {} failed: {}", attempt, e),
                    }
                }
                Err(e) => warn!("Connection attempt {} to {} failed: {}", attempt, target, e),
            }

            if shutdown.is_cancelled() {
                break;
            }
            info!("Reconnecting in {:?}", delay);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Reconnect loop stopped after {} attempts", self.attempts);
    }

    /// A zero connect timeout waits for the connector indefinitely
    async fn connect(&mut self) -> Result<C::Transport, TransportError> {
        let timeout = self.config.connect_timeout();
        if timeout.is_zero() {
            return self.connector.connect().await;
        }
        tokio::time::timeout(timeout, self.connector.connect())
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}
