use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::Value;
use shared::protocol::{ChannelMessage, STATUS_UPDATE};
use tokio::{net::TcpStream, time::MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use super::{
    frame::{self, Frame, ENGINE_PONG, NAMESPACE_CONNECT},
    TransportError, TransportMode,
};

pub const DEFAULT_CHANNEL_PATH: &str = "/socket.io/?EIO=4&transport=websocket";
const STATUS_PATH: &str = "/api/status";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One open channel. `next` yields `None` once the peer closed it.
#[async_trait]
pub trait Session: Send {
    async fn next(&mut self) -> Option<Result<ChannelMessage, TransportError>>;
    async fn send(&mut self, message: ChannelMessage) -> Result<(), TransportError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, mode: TransportMode) -> Result<Box<dyn Session>, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub channel: String,
    pub status: Url,
}

impl Endpoints {
    pub fn from_server(server_url: &Url, channel_path: &str) -> Result<Self, TransportError> {
        let base = server_url.as_str().trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(TransportError::InvalidUrl(format!(
                "server_url must start with http:// or https://, got {server_url}"
            )));
        };
        let status = server_url
            .join(STATUS_PATH)
            .map_err(|err| TransportError::InvalidUrl(err.to_string()))?;
        Ok(Self {
            channel: format!("{ws_base}{channel_path}"),
            status,
        })
    }
}

/// Opens websocket sessions, and polling sessions when compatible mode
/// cannot reach the websocket endpoint.
pub struct ChannelConnector {
    http: Client,
    endpoints: Endpoints,
    poll_interval: Duration,
}

impl ChannelConnector {
    pub fn new(http: Client, endpoints: Endpoints, poll_interval: Duration) -> Self {
        Self {
            http,
            endpoints,
            poll_interval,
        }
    }

    async fn open_websocket(&self) -> Result<WsSession, TransportError> {
        let url = self.endpoints.channel.as_str();
        let (stream, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| TransportError::Timeout)??;
        info!(url, "transport: websocket open");
        Ok(WsSession { stream })
    }

    async fn open_polling(&self) -> Result<PollingSession, TransportError> {
        let first = fetch_status(&self.http, &self.endpoints.status).await?;
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);
        // The first tick is immediate and already covered by the probe.
        ticks.next().await;
        info!(url = %self.endpoints.status, "transport: polling open");
        Ok(PollingSession {
            http: self.http.clone(),
            status_url: self.endpoints.status.clone(),
            ticks,
            pending: VecDeque::from([status_message(first)]),
        })
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn open(&self, mode: TransportMode) -> Result<Box<dyn Session>, TransportError> {
        match mode {
            TransportMode::WebSocket => Ok(Box::new(self.open_websocket().await?)),
            TransportMode::Compatible => match self.open_websocket().await {
                Ok(session) => Ok(Box::new(session)),
                Err(err) => {
                    warn!(kind = err.kind(), error = %err, "transport: websocket unavailable, polling");
                    Ok(Box::new(self.open_polling().await?))
                }
            },
        }
    }
}

pub struct WsSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsSession {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(TransportError::from)
    }
}

#[async_trait]
impl Session for WsSession {
    async fn next(&mut self) -> Option<Result<ChannelMessage, TransportError>> {
        while let Some(message) = self.stream.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(err) => return Some(Err(err.into())),
            };
            match frame::decode(&text) {
                Ok(Frame::Event(event)) => return Some(Ok(event)),
                Ok(Frame::Open) => {
                    if let Err(err) = self.send_text(NAMESPACE_CONNECT).await {
                        return Some(Err(err));
                    }
                }
                Ok(Frame::Ping) => {
                    if let Err(err) = self.send_text(ENGINE_PONG).await {
                        return Some(Err(err));
                    }
                }
                Ok(Frame::Control) => {}
                Err(err) => debug!(error = %err, "transport: ignoring frame"),
            }
        }
        None
    }

    async fn send(&mut self, message: ChannelMessage) -> Result<(), TransportError> {
        let text = frame::encode_event(&message);
        self.send_text(&text).await
    }
}

/// Synthesizes `status_update` snapshots from the REST status endpoint.
pub struct PollingSession {
    http: Client,
    status_url: Url,
    ticks: IntervalStream,
    pending: VecDeque<ChannelMessage>,
}

#[async_trait]
impl Session for PollingSession {
    async fn next(&mut self) -> Option<Result<ChannelMessage, TransportError>> {
        if let Some(message) = self.pending.pop_front() {
            return Some(Ok(message));
        }
        self.ticks.next().await?;
        Some(
            fetch_status(&self.http, &self.status_url)
                .await
                .map(status_message),
        )
    }

    async fn send(&mut self, _message: ChannelMessage) -> Result<(), TransportError> {
        Err(TransportError::Unsupported(TransportMode::Compatible))
    }
}

async fn fetch_status(http: &Client, url: &Url) -> Result<Value, TransportError> {
    let response = http
        .get(url.clone())
        .timeout(CONNECT_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json::<Value>().await?)
}

fn status_message(snapshot: Value) -> ChannelMessage {
    ChannelMessage::new(STATUS_UPDATE, snapshot)
}
