//! Frame Codec
//!
//! Maps named events to wire frames and back. The codec also owns the
//! liveness protocol: it builds the heartbeat ping and recognises the ack,
//! since both are just frames in the server's own format.

use crate::traits::error::{HyperSocketError, Result};
use crate::traits::message::WsMessage;
use serde_json::{json, Value};

/// A named event with its payload
#[derive(Debug, Clone, PartialEq)]
pub struct EventFrame {
    pub event: String,
    pub data: Value,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// What an inbound frame turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Liveness ack for a heartbeat ping
    Ack,
    /// Application event for subscribers
    Event(EventFrame),
}

/// Encodes outbound events and decodes inbound frames
pub trait FrameCodec: Send + Sync {
    fn encode(&self, frame: &EventFrame) -> Result<WsMessage>;

    /// Decode an inbound frame; `Err` marks it undecodable
    fn decode(&self, message: &WsMessage) -> Result<Inbound>;

    /// Payload sent on every heartbeat tick
    fn ping(&self) -> WsMessage;
}

/// JSON codec for `{"event": name, "data": payload}` text frames
#[derive(Debug, Clone)]
pub struct JsonEventCodec {
    ping_event: String,
    ack_event: String,
}

impl JsonEventCodec {
    /// Codec using `ping` for heartbeats and `pong` as the ack
    pub fn new() -> Self {
        Self::with_liveness_events("ping", "pong")
    }

    pub fn with_liveness_events(ping_event: impl Into<String>, ack_event: impl Into<String>) -> Self {
        Self {
            ping_event: ping_event.into(),
            ack_event: ack_event.into(),
        }
    }
}

impl Default for JsonEventCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec for JsonEventCodec {
    fn encode(&self, frame: &EventFrame) -> Result<WsMessage> {
        let value = json!({ "event": frame.event, "data": frame.data });
        serde_json::to_string(&value)
            .map(WsMessage::Text)
            .map_err(|e| HyperSocketError::Codec(e.to_string()))
    }

    fn decode(&self, message: &WsMessage) -> Result<Inbound> {
        let value: Value = match message {
            WsMessage::Text(text) => serde_json::from_str(text),
            WsMessage::Binary(bytes) => serde_json::from_slice(bytes),
        }
        .map_err(|e| HyperSocketError::Codec(e.to_string()))?;

        let event = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| HyperSocketError::Codec("frame has no event name".to_string()))?;

        if event == self.ack_event {
            return Ok(Inbound::Ack);
        }

        let data = value.get("data").cloned().unwrap_or(Value::Null);
        Ok(Inbound::Event(EventFrame::new(event, data)))
    }

    fn ping(&self) -> WsMessage {
        let value = json!({ "event": self.ping_event });
        WsMessage::Text(value.to_string())
    }
}
