use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::AnimationError;

/// Audio offsets from the synthesis engine are in 100-nanosecond ticks
pub const TICKS_PER_MILLISECOND: f64 = 10_000.0;

/// One facial animation sample. The shape is owned by the speech service.
pub type BlendShapeFrame = Value;

/// A viseme id at an offset into the synthesized audio.
///
/// Serialized as a two element array `[offset_ms, viseme_id]`, which is what
/// the animation renderer on the other side of the socket expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, u32)", into = "(f64, u32)")]
pub struct VisemeEvent {
    pub offset_ms: f64,
    pub viseme_id: u32,
}

impl VisemeEvent {
    pub fn new(offset_ms: f64, viseme_id: u32) -> Self {
        Self {
            offset_ms,
            viseme_id,
        }
    }

    pub fn from_ticks(audio_offset_ticks: u64, viseme_id: u32) -> Self {
        Self::new(audio_offset_ticks as f64 / TICKS_PER_MILLISECOND, viseme_id)
    }
}

impl From<(f64, u32)> for VisemeEvent {
    fn from((offset_ms, viseme_id): (f64, u32)) -> Self {
        Self::new(offset_ms, viseme_id)
    }
}

impl From<VisemeEvent> for (f64, u32) {
    fn from(event: VisemeEvent) -> Self {
        (event.offset_ms, event.viseme_id)
    }
}

/// Animation data attached to a viseme event.
///
/// The service may hand the chunk over already parsed or as JSON text, so the
/// raw value is classified once here and decoded in one place.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationPayload {
    Absent,
    Structured(Map<String, Value>),
    Text(String),
    Unexpected(&'static str),
}

impl AnimationPayload {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::String(text) if text.is_empty() => Self::Absent,
            Value::String(text) => Self::Text(text),
            Value::Object(map) if map.is_empty() => Self::Absent,
            Value::Object(map) => Self::Structured(map),
            Value::Bool(_) => Self::Unexpected("bool"),
            Value::Number(_) => Self::Unexpected("number"),
            Value::Array(_) => Self::Unexpected("array"),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Decode into a frame. `Ok(None)` means there was nothing to record.
    pub fn into_frame(self) -> Result<Option<BlendShapeFrame>, AnimationError> {
        match self {
            Self::Absent => Ok(None),
            Self::Structured(map) => Ok(Some(Value::Object(map))),
            Self::Text(text) => Ok(Some(serde_json::from_str(&text)?)),
            Self::Unexpected(kind) => Err(AnimationError::UnexpectedShape(kind)),
        }
    }
}

/// Everything produced for one text, ready to be sent to the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationBatch {
    pub text: String,
    pub visemes: Vec<VisemeEvent>,
    #[serde(rename = "3d_blend_shapes")]
    pub blend_shapes: Vec<BlendShapeFrame>,
}

impl AnimationBatch {
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
