//! Message framing for the Speech service WebSocket protocol
//!
//! Text messages are CRLF separated `Name:value` headers, a blank line and a
//! body. Binary messages start with a big-endian `u16` header length followed
//! by the same header block and the raw body.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::animation::AnimationPayload;
use crate::speech::types::VisemeReceived;

pub const PATH_SPEECH_CONFIG: &str = "speech.config";
pub const PATH_SYNTHESIS_CONTEXT: &str = "synthesis.context";
pub const PATH_SSML: &str = "ssml";
pub const PATH_TURN_START: &str = "turn.start";
pub const PATH_TURN_END: &str = "turn.end";
pub const PATH_AUDIO: &str = "audio";
pub const PATH_AUDIO_METADATA: &str = "audio.metadata";

const HEADER_SEPARATOR: &str = "\r\n\r\n";

/// A decoded service message
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<B> {
    pub headers: Vec<(String, String)>,
    pub body: B,
}

impl<B> Frame<B> {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn path(&self) -> Option<&str> {
        self.header("Path")
    }
}

pub fn encode_text_message(
    path: &str,
    request_id: &str,
    timestamp: &str,
    content_type: &str,
    body: &str,
) -> String {
    format!(
        "X-RequestId:{request_id}\r\nX-Timestamp:{timestamp}\r\nContent-Type:{content_type}\r\nPath:{path}{HEADER_SEPARATOR}{body}"
    )
}

pub fn parse_text_message(message: &str) -> Result<Frame<String>> {
    let (head, body) = message
        .split_once(HEADER_SEPARATOR)
        .context("Speech service message is missing its header block")?;
    Ok(Frame {
        headers: parse_headers(head),
        body: body.to_string(),
    })
}

pub fn parse_binary_message(message: &[u8]) -> Result<Frame<Vec<u8>>> {
    anyhow::ensure!(
        message.len() >= 2,
        "Binary speech service message is too short ({} bytes)",
        message.len()
    );
    let header_len = u16::from_be_bytes([message[0], message[1]]) as usize;
    let header_end = 2 + header_len;
    anyhow::ensure!(
        message.len() >= header_end,
        "Binary speech service message declares {header_len} header bytes but has {}",
        message.len() - 2
    );
    let head = std::str::from_utf8(&message[2..header_end])
        .context("Binary speech service headers are not UTF-8")?;
    Ok(Frame {
        headers: parse_headers(head),
        body: message[header_end..].to_vec(),
    })
}

fn parse_headers(head: &str) -> Vec<(String, String)> {
    head.split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

pub fn speech_config_body() -> String {
    json!({
        "context": {
            "system": {
                "name": "SpeechSDK",
                "version": env!("CARGO_PKG_VERSION"),
                "build": "Rust",
                "lang": "Rust",
            },
            "os": {
                "platform": std::env::consts::OS,
                "name": std::env::consts::FAMILY,
                "version": std::env::consts::ARCH,
            },
        }
    })
    .to_string()
}

pub fn synthesis_context_body(output_format: &str) -> String {
    json!({
        "synthesis": {
            "audio": {
                "metadataOptions": {
                    "bookmarkEnabled": false,
                    "punctuationBoundaryEnabled": false,
                    "sentenceBoundaryEnabled": false,
                    "sessionEndEnabled": true,
                    "visemeEnabled": true,
                    "wordBoundaryEnabled": false,
                },
                "outputFormat": output_format,
            },
            "language": {
                "autoDetection": false,
            },
        }
    })
    .to_string()
}

#[derive(Deserialize)]
struct MetadataMessage {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<MetadataEntry>,
}

#[derive(Deserialize)]
struct MetadataEntry {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Data", default)]
    data: Value,
}

#[derive(Deserialize)]
struct VisemeData {
    #[serde(rename = "Offset")]
    offset: u64,
    #[serde(rename = "VisemeId")]
    viseme_id: u32,
    #[serde(rename = "AnimationChunk", default)]
    animation_chunk: Value,
}

/// Extract the viseme events from an `audio.metadata` body, in order.
/// Word boundaries, session end markers and other metadata are skipped, as
/// are viseme entries that fail to parse.
pub fn parse_visemes(body: &str) -> Result<Vec<VisemeReceived>> {
    let message: MetadataMessage =
        serde_json::from_str(body).context("Failed to parse audio metadata")?;

    Ok(message
        .metadata
        .into_iter()
        .filter(|entry| entry.kind == "Viseme")
        .filter_map(|entry| match serde_json::from_value::<VisemeData>(entry.data) {
            Ok(data) => Some(VisemeReceived {
                audio_offset_ticks: data.offset,
                viseme_id: data.viseme_id,
                animation: AnimationPayload::from_value(data.animation_chunk),
            }),
            Err(e) => {
                warn!("Skipping malformed viseme metadata: {e}");
                None
            }
        })
        .collect())
}
