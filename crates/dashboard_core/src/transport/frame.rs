//! Text frame codec for the real-time channel.
//!
//! Two encodings arrive on the wire: plain `{"event": .., "data": ..}` JSON
//! objects and Socket.IO packets (`42["name", payload]`, engine ping `2`).

use serde_json::{json, Value};
use shared::protocol::ChannelMessage;

use super::TransportError;

pub const ENGINE_PONG: &str = "3";
pub const NAMESPACE_CONNECT: &str = "40";

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(ChannelMessage),
    /// Engine open handshake (`0{...}`); answered with a namespace connect.
    Open,
    /// Engine ping; answered with [`ENGINE_PONG`].
    Ping,
    Control,
}

pub fn decode(text: &str) -> Result<Frame, TransportError> {
    let text = text.trim();
    if text.starts_with('{') {
        return serde_json::from_str::<ChannelMessage>(text)
            .map(Frame::Event)
            .map_err(|err| TransportError::Frame(err.to_string()));
    }

    let mut chars = text.chars();
    match chars.next() {
        Some('0') => Ok(Frame::Open),
        Some('2') => Ok(Frame::Ping),
        Some('1' | '3' | '5' | '6') => Ok(Frame::Control),
        Some('4') => decode_packet(chars.as_str()),
        _ => Err(TransportError::Frame(format!(
            "unrecognized frame '{}'",
            text.chars().take(16).collect::<String>()
        ))),
    }
}

fn decode_packet(packet: &str) -> Result<Frame, TransportError> {
    let mut chars = packet.chars();
    match chars.next() {
        Some('2') => decode_event(chars.as_str()).map(Frame::Event),
        Some('0' | '1' | '3' | '4') => Ok(Frame::Control),
        _ => Err(TransportError::Frame(format!(
            "unsupported packet '4{}'",
            packet.chars().take(16).collect::<String>()
        ))),
    }
}

/// `[/namespace,][ack-id]["name", payload]`
fn decode_event(body: &str) -> Result<ChannelMessage, TransportError> {
    let start = body
        .find('[')
        .ok_or_else(|| TransportError::Frame("event packet without payload".into()))?;
    let array: Vec<Value> = serde_json::from_str(&body[start..])
        .map_err(|err| TransportError::Frame(err.to_string()))?;
    let mut items = array.into_iter();
    let name = match items.next() {
        Some(Value::String(name)) => name,
        _ => return Err(TransportError::Frame("event name missing".into())),
    };
    Ok(ChannelMessage::new(name, items.next().unwrap_or(Value::Null)))
}

pub fn encode_event(message: &ChannelMessage) -> String {
    format!("42{}", json!([message.event, message.data]))
}

#[cfg(test)]
#[path = "../tests/frame_tests.rs"]
mod tests;
