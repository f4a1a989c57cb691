use std::{
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use serde_json::json;

use super::*;

/// Fails the first `failures` opens, then hands out a session that yields one
/// status message and stays open.
struct FlakyConnector {
    failures: usize,
    modes: Mutex<Vec<TransportMode>>,
}

impl FlakyConnector {
    fn new(failures: usize) -> Self {
        Self {
            failures,
            modes: Mutex::new(Vec::new()),
        }
    }

    fn modes(&self) -> Vec<TransportMode> {
        self.modes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FlakyConnector {
    async fn open(&self, mode: TransportMode) -> Result<Box<dyn Session>, TransportError> {
        let attempt = {
            let mut modes = self.modes.lock().unwrap();
            modes.push(mode);
            modes.len()
        };
        if attempt <= self.failures {
            return Err(TransportError::Refused("nobody home".into()));
        }
        Ok(Box::new(ScriptedSession {
            inbound: vec![ChannelMessage::new("status_update", json!({"current_layer": 3}))],
            sent: Vec::new(),
        }))
    }
}

struct ScriptedSession {
    inbound: Vec<ChannelMessage>,
    sent: Vec<ChannelMessage>,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn next(&mut self) -> Option<Result<ChannelMessage, TransportError>> {
        if self.inbound.is_empty() {
            std::future::pending::<()>().await;
        }
        Some(Ok(self.inbound.remove(0)))
    }

    async fn send(&mut self, message: ChannelMessage) -> Result<(), TransportError> {
        self.sent.push(message);
        Ok(())
    }
}

async fn next_message(events: &mut mpsc::Receiver<TransportEvent>) -> (Vec<LinkStatus>, ChannelMessage) {
    let mut states = Vec::new();
    loop {
        match events.recv().await.expect("transport stopped") {
            TransportEvent::State(status) => states.push(status),
            TransportEvent::Message(message) => return (states, message),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn repeated_errors_reopen_in_compatible_mode_once() {
    let connector = Arc::new(FlakyConnector::new(5));
    let (events_tx, mut events) = mpsc::channel(64);
    let (_outbound_tx, outbound_rx) = mpsc::channel(8);
    let task = Transport::new(
        connector.clone(),
        ReconnectPolicy::default(),
        events_tx,
        outbound_rx,
    )
    .spawn();

    let (states, message) = next_message(&mut events).await;
    assert_eq!(message.event, "status_update");
    assert_eq!(
        connector.modes(),
        vec![
            TransportMode::WebSocket,
            TransportMode::WebSocket,
            TransportMode::WebSocket,
            TransportMode::Compatible,
            TransportMode::Compatible,
            TransportMode::Compatible,
        ]
    );

    let mode_switches = states
        .windows(2)
        .filter(|pair| pair[0].mode != pair[1].mode)
        .count();
    assert_eq!(mode_switches, 1);
    assert_eq!(
        states.last().map(|status| status.state),
        Some(ConnectionState::Connected)
    );
    assert!(states.contains(&LinkStatus {
        state: ConnectionState::Error { failures: 5 },
        mode: TransportMode::Compatible,
    }));

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn first_state_reported_is_connecting() {
    let connector = Arc::new(FlakyConnector::new(0));
    let (events_tx, mut events) = mpsc::channel(8);
    let (_outbound_tx, outbound_rx) = mpsc::channel(8);
    let task = Transport::new(connector, ReconnectPolicy::default(), events_tx, outbound_rx).spawn();

    let (states, _) = next_message(&mut events).await;
    assert_eq!(
        states,
        vec![
            LinkStatus {
                state: ConnectionState::Connecting,
                mode: TransportMode::WebSocket,
            },
            LinkStatus {
                state: ConnectionState::Connected,
                mode: TransportMode::WebSocket,
            },
        ]
    );
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn dropping_the_outbound_sender_stops_the_transport() {
    let connector = Arc::new(FlakyConnector::new(0));
    let (events_tx, mut events) = mpsc::channel(8);
    let (outbound_tx, outbound_rx) = mpsc::channel(8);
    let task = Transport::new(connector, ReconnectPolicy::default(), events_tx, outbound_rx).spawn();

    next_message(&mut events).await;
    drop(outbound_tx);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("transport did not stop")
        .expect("transport panicked");
}

#[test]
fn classifies_io_failures() {
    let refused = tungstenite::Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "no"));
    assert_eq!(TransportError::from(refused).kind(), "refused");
    let timed_out = tungstenite::Error::Io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
    assert_eq!(TransportError::from(timed_out).kind(), "timeout");
    assert_eq!(
        TransportError::from(tungstenite::Error::ConnectionClosed).kind(),
        "websocket"
    );
}

#[test]
fn endpoints_swap_scheme_and_keep_status_path() {
    let server = url::Url::parse("https://printer.local:5000/").unwrap();
    let endpoints = Endpoints::from_server(&server, DEFAULT_CHANNEL_PATH).unwrap();
    assert_eq!(
        endpoints.channel,
        "wss://printer.local:5000/socket.io/?EIO=4&transport=websocket"
    );
    assert_eq!(endpoints.status.as_str(), "https://printer.local:5000/api/status");

    let ftp = url::Url::parse("ftp://printer.local/").unwrap();
    assert!(matches!(
        Endpoints::from_server(&ftp, DEFAULT_CHANNEL_PATH),
        Err(TransportError::InvalidUrl(_))
    ));
}
