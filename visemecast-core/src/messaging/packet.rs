//! Engine.IO v4 and Socket.IO v5 packet encoding for the WebSocket transport
//!
//! Every WebSocket text frame carries one Engine.IO packet: a single type
//! digit followed by its data. Socket.IO packets ride inside Engine.IO
//! `message` packets, so an event on the default namespace looks like
//! `42["message","..."]`.

use serde::Deserialize;
use serde_json::Value;

use super::error::MessagingError;

/// Payload of the Engine.IO `open` packet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPayload {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenPayload),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, MessagingError> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| MessagingError::Protocol("empty Engine.IO packet".to_string()))?;
        let data = chars.as_str();

        match kind {
            '0' => serde_json::from_str(data).map(Self::Open).map_err(|e| {
                MessagingError::Protocol(format!("invalid open packet {data:?}: {e}"))
            }),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(data.to_string())),
            '3' => Ok(Self::Pong(data.to_string())),
            '4' => Ok(Self::Message(data.to_string())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(MessagingError::Protocol(format!(
                "unknown Engine.IO packet type {other:?}"
            ))),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            // Clients never send open packets
            Self::Open(_) => "0".to_string(),
            Self::Close => "1".to_string(),
            Self::Ping(data) => format!("2{data}"),
            Self::Pong(data) => format!("3{data}"),
            Self::Message(data) => format!("4{data}"),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO packets on the default namespace
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, args: Vec<Value> },
    Ack { id: u64, args: Vec<Value> },
    ConnectError(Value),
}

impl SocketPacket {
    pub fn event(name: &str, args: Vec<Value>) -> Self {
        Self::Event {
            name: name.to_string(),
            args,
        }
    }

    pub fn decode(body: &str) -> Result<Self, MessagingError> {
        let mut chars = body.chars();
        let kind = chars
            .next()
            .ok_or_else(|| MessagingError::Protocol("empty Socket.IO packet".to_string()))?;
        let mut rest = chars.as_str();

        // Packets on a non-default namespace carry "/nsp," before the data
        if rest.starts_with('/') {
            rest = rest.split_once(',').map(|(_, tail)| tail).unwrap_or("");
        }

        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let ack_id = rest[..digits].parse::<u64>().ok();
        rest = &rest[digits..];

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest).map_err(|e| {
                MessagingError::Protocol(format!("invalid Socket.IO payload {rest:?}: {e}"))
            })?)
        };

        match kind {
            '0' => Ok(Self::Connect(data)),
            '1' => Ok(Self::Disconnect),
            '2' => {
                let mut args = match data {
                    Some(Value::Array(args)) => args,
                    other => {
                        return Err(MessagingError::Protocol(format!(
                            "event payload must be an array, got {other:?}"
                        )))
                    }
                };
                if args.is_empty() {
                    return Err(MessagingError::Protocol("event without a name".to_string()));
                }
                match args.remove(0) {
                    Value::String(name) => Ok(Self::Event { name, args }),
                    other => Err(MessagingError::Protocol(format!(
                        "event name must be a string, got {other}"
                    ))),
                }
            }
            '3' => {
                let id = ack_id
                    .ok_or_else(|| MessagingError::Protocol("ack without an id".to_string()))?;
                let args = match data {
                    Some(Value::Array(args)) => args,
                    _ => Vec::new(),
                };
                Ok(Self::Ack { id, args })
            }
            '4' => Ok(Self::ConnectError(data.unwrap_or(Value::Null))),
            other => Err(MessagingError::Protocol(format!(
                "unsupported Socket.IO packet type {other:?}"
            ))),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Connect(None) => "0".to_string(),
            Self::Connect(Some(auth)) => format!("0{auth}"),
            Self::Disconnect => "1".to_string(),
            Self::Event { name, args } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                format!("2{}", Value::Array(items))
            }
            Self::Ack { id, args } => format!("3{id}{}", Value::Array(args.clone())),
            Self::ConnectError(data) => format!("4{data}"),
        }
    }

    /// Wrap in an Engine.IO message packet, ready for a text frame
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open_packet() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();

        match packet {
            EnginePacket::Open(open) => {
                assert_eq!(open.sid, "lv_VI97HAXpY6yYWAAAC");
                assert_eq!(open.ping_interval, 25000);
                assert_eq!(open.ping_timeout, 20000);
                assert_eq!(open.max_payload, Some(1_000_000));
            }
            other => panic!("expected open packet, got {other:?}"),
        }
    }

    #[test]
    fn test_ping_pong() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
        assert_eq!(EnginePacket::decode("3probe").unwrap(), EnginePacket::Pong("probe".to_string()));
    }

    #[test]
    fn test_unknown_engine_packet() {
        assert!(EnginePacket::decode("9").is_err());
        assert!(EnginePacket::decode("").is_err());
        assert!(EnginePacket::decode("0not json").is_err());
    }

    #[test]
    fn test_event_frame_wraps_string_payload() {
        let frame = SocketPacket::event("message", vec![json!(r#"{"text":"Hi"}"#)]).to_frame();
        assert_eq!(frame, r#"42["message","{\"text\":\"Hi\"}"]"#);
    }

    #[test]
    fn test_decode_connect_and_errors() {
        let EnginePacket::Message(body) = EnginePacket::decode(r#"40{"sid":"abc"}"#).unwrap() else {
            panic!("expected message packet");
        };
        assert_eq!(
            SocketPacket::decode(&body).unwrap(),
            SocketPacket::Connect(Some(json!({"sid": "abc"})))
        );

        assert_eq!(
            SocketPacket::decode(r#"4{"message":"Not authorized"}"#).unwrap(),
            SocketPacket::ConnectError(json!({"message": "Not authorized"}))
        );
        assert_eq!(SocketPacket::decode("1").unwrap(), SocketPacket::Disconnect);
    }

    #[test]
    fn test_decode_event_with_namespace_and_ack() {
        assert_eq!(
            SocketPacket::decode(r#"2/admin,["hello",1]"#).unwrap(),
            SocketPacket::Event {
                name: "hello".to_string(),
                args: vec![json!(1)],
            }
        );
        assert_eq!(
            SocketPacket::decode(r#"313["ok"]"#).unwrap(),
            SocketPacket::Ack {
                id: 13,
                args: vec![json!("ok")],
            }
        );
        assert!(SocketPacket::decode(r#"2{"not":"array"}"#).is_err());
        assert!(SocketPacket::decode("2[]").is_err());
    }
}
