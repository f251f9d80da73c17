//! WebSocket transport backed by tokio-tungstenite
//!
//! The socket is split: the write half stays in [`WsTransport`] for the pump,
//! the read half is drained by a background task that only watches for the
//! peer going away. Inbound payloads are logged and dropped.

use super::{Connector, OutboundMessage, Transport};
use crate::error::TransportError;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Maps an outbound message onto its WebSocket frame
pub fn encode(message: OutboundMessage, end_marker: &str) -> Message {
    match message {
        OutboundMessage::Direction(direction) => Message::Text(direction.label().to_string()),
        OutboundMessage::Audio(frame) => Message::Binary(frame),
        OutboundMessage::EndOfStream => Message::Text(end_marker.to_string()),
    }
}

#[derive(Clone, Debug)]
pub struct WsConnector {
    url: String,
    end_marker: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, end_marker: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            end_marker: end_marker.into(),
        }
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&mut self) -> Result<WsTransport, TransportError> {
        debug!("Opening WebSocket connection to {}", self.url);
        let (stream, response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        info!(
            "Connected to {} (HTTP {})",
            self.url,
            response.status().as_u16()
        );

        let (sink, read) = stream.split();
        let closed = CancellationToken::new();
        let reader = spawn_reader(read, closed.clone());

        Ok(WsTransport {
            sink,
            closed,
            reader,
            end_marker: self.end_marker.clone(),
        })
    }

    fn target(&self) -> String {
        self.url.clone()
    }
}

fn spawn_reader(mut read: SplitStream<WsStream>, closed: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = closed.cancelled() => break,
                next = read.next() => match next {
                    Some(Ok(Message::Close(frame))) => {
                        info!("Peer closed the connection: {:?}", frame);
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!("Ignoring text message from peer: {}", text);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!("Ignoring {} byte binary message from peer", data.len());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket read failed: {}", e);
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
        closed.cancel();
    })
}

/// Write half of an open WebSocket plus its close signal
pub struct WsTransport {
    sink: SplitSink<WsStream, Message>,
    closed: CancellationToken,
    reader: JoinHandle<()>,
    end_marker: String,
}

impl Transport for WsTransport {
    async fn send(&mut self, message: OutboundMessage) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let frame = encode(message, &self.end_marker);
        self.sink.send(frame).await?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }

    fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }

    async fn close(&mut self) {
        if self.is_open() {
            if let Err(e) = self.sink.close().await {
                debug!("Error while closing WebSocket: {}", e);
            }
        }
        self.closed.cancel();
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
