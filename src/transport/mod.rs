//! # Transport Layer
//!
//! The connection to the remote controller and the single send path every
//! producer writes through.
//!
//! ```text
//! JoystickPoller ──┐
//! ButtonMonitor  ──┼─► OutboundTx ─[mpsc, FIFO]─► pump ─► Transport::send
//! StreamingTask  ──┘
//! ```
//!
//! Only the pump (see [`crate::session`]) ever touches the [`Transport`], so
//! sends are serialized without a lock and arrive in the order they were
//! enqueued.

pub mod websocket;

use crate::error::TransportError;
use crate::joystick::Direction;
use std::future::Future;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use websocket::{WsConnector, WsTransport};

/// One unit sent to the peer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Text frame carrying the direction label
    Direction(Direction),
    /// Binary frame carrying one raw audio frame
    Audio(Vec<u8>),
    /// Text frame carrying the configured end-of-audio marker
    EndOfStream,
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Direction(_) => "direction",
            OutboundMessage::Audio(_) => "audio",
            OutboundMessage::EndOfStream => "end-of-stream",
        }
    }
}

/// Producer side of the outbound queue.
///
/// A send fails with [`TransportError::Closed`] once the pump has stopped,
/// which is how producers learn that the session is over.
#[derive(Clone, Debug)]
pub struct OutboundTx {
    tx: mpsc::Sender<OutboundMessage>,
}

impl OutboundTx {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Enqueues without waiting for capacity
    pub fn try_send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                TransportError::Send("outbound queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Ordered, reliable, message-based duplex connection to the peer
pub trait Transport: Send {
    /// Sends one message. An error means the connection is unusable.
    fn send(
        &mut self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn is_open(&self) -> bool;

    /// Token cancelled by the transport itself when the peer closes the
    /// connection or the read side fails
    fn close_signal(&self) -> CancellationToken;

    /// Closes the connection gracefully. Errors are logged, not returned.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Establishes a fresh [`Transport`] for every session attempt
pub trait Connector: Send {
    type Transport: Transport;

    fn connect(&mut self) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;

    /// Human readable target for logs
    fn target(&self) -> String;
}
