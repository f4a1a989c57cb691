//! Reconnecting real-time channel to the controller.

use std::{io, sync::Arc};

use shared::protocol::ChannelMessage;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::tungstenite;
use tracing::{debug, info, warn};

use crate::state::LinkStatus;

pub mod connector;
pub mod frame;
pub mod policy;

pub use connector::{ChannelConnector, Connector, Endpoints, Session, DEFAULT_CHANNEL_PATH};
pub use policy::{ConnectionState, ConnectionTracker, Decision, ReconnectPolicy, TransportMode};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("connection timed out")]
    Timeout,
    #[error("handshake rejected: {0}")]
    Handshake(String),
    #[error("websocket error: {0}")]
    WebSocket(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("malformed frame: {0}")]
    Frame(String),
    #[error("sending is not supported in {0:?} mode")]
    Unsupported(TransportMode),
}

impl TransportError {
    /// Short classification used in logs and metrics fields.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::InvalidUrl(_) => "invalid_url",
            TransportError::Refused(_) => "refused",
            TransportError::Timeout => "timeout",
            TransportError::Handshake(_) => "handshake",
            TransportError::WebSocket(_) => "websocket",
            TransportError::Http(_) => "http",
            TransportError::Frame(_) => "frame",
            TransportError::Unsupported(_) => "unsupported",
        }
    }
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Io(io_err) => match io_err.kind() {
                io::ErrorKind::ConnectionRefused => TransportError::Refused(io_err.to_string()),
                io::ErrorKind::TimedOut => TransportError::Timeout,
                _ => TransportError::WebSocket(io_err.to_string()),
            },
            tungstenite::Error::Http(response) => {
                TransportError::Handshake(response.status().to_string())
            }
            tungstenite::Error::Url(url_err) => TransportError::InvalidUrl(url_err.to_string()),
            other => TransportError::WebSocket(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Refused(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    State(LinkStatus),
    Message(ChannelMessage),
}

enum SessionEnd {
    Closed,
    Failed(TransportError),
    Shutdown,
}

/// Drives one [`Connector`] forever, reporting every state transition and
/// inbound message. Stops when either channel end is dropped.
pub struct Transport {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    events: mpsc::Sender<TransportEvent>,
    outbound: mpsc::Receiver<ChannelMessage>,
}

impl Transport {
    pub fn new(
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
        events: mpsc::Sender<TransportEvent>,
        outbound: mpsc::Receiver<ChannelMessage>,
    ) -> Self {
        Self {
            connector,
            policy,
            events,
            outbound,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let mut tracker = ConnectionTracker::new(self.policy.clone());
        loop {
            if !self.report(tracker.connecting()).await {
                return;
            }
            let mode = tracker.mode();
            let (status, decision) = match self.connector.open(mode).await {
                Ok(mut session) => {
                    if !self.report(tracker.on_connected()).await {
                        return;
                    }
                    match self.pump(session.as_mut()).await {
                        SessionEnd::Shutdown => return,
                        SessionEnd::Closed => tracker.on_closed(),
                        SessionEnd::Failed(err) => {
                            warn!(kind = err.kind(), error = %err, "transport: session failed");
                            tracker.on_closed()
                        }
                    }
                }
                Err(err) => tracker.on_error(&err),
            };
            if !self.report(status).await {
                return;
            }
            if let Decision::FallBack { .. } = decision {
                info!(mode = ?tracker.mode(), "transport: reopening in fallback mode");
            }
            if !self.wait(decision).await {
                return;
            }
        }
    }

    async fn report(&self, status: LinkStatus) -> bool {
        self.events.send(TransportEvent::State(status)).await.is_ok()
    }

    async fn pump(&mut self, session: &mut dyn Session) -> SessionEnd {
        loop {
            tokio::select! {
                incoming = session.next() => match incoming {
                    Some(Ok(message)) => {
                        if self.events.send(TransportEvent::Message(message)).await.is_err() {
                            return SessionEnd::Shutdown;
                        }
                    }
                    Some(Err(err)) => return SessionEnd::Failed(err),
                    None => return SessionEnd::Closed,
                },
                outbound = self.outbound.recv() => match outbound {
                    Some(message) => match session.send(message).await {
                        Ok(()) => {}
                        Err(TransportError::Unsupported(mode)) => {
                            warn!(?mode, "transport: dropping outbound event");
                        }
                        Err(err) => return SessionEnd::Failed(err),
                    },
                    None => return SessionEnd::Shutdown,
                },
            }
        }
    }

    /// Sleeps out the decision's delay. Outbound emits that arrive meanwhile
    /// are dropped.
    async fn wait(&mut self, decision: Decision) -> bool {
        let sleep = tokio::time::sleep(decision.delay());
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return !self.events.is_closed(),
                outbound = self.outbound.recv() => match outbound {
                    Some(message) => {
                        warn!(event = %message.event, "transport: not connected, dropping outbound event");
                    }
                    None => {
                        debug!("transport: outbound channel closed");
                        return false;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/transport_tests.rs"]
mod tests;
