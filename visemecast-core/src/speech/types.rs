use std::fmt;

use serde::{Deserialize, Serialize};

use crate::animation::AnimationPayload;

/// Voice used to speak a text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    pub language_code: String,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            name: "en-US-AvaNeural".to_string(),
            language_code: "en-US".to_string(),
        }
    }
}

/// A viseme event as reported by the synthesis engine
#[derive(Debug, Clone, PartialEq)]
pub struct VisemeReceived {
    /// Offset into the synthesized audio in 100-nanosecond ticks
    pub audio_offset_ticks: u64,
    pub viseme_id: u32,
    pub animation: AnimationPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultReason {
    SynthesizingAudioCompleted,
    Canceled,
}

impl fmt::Display for ResultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SynthesizingAudioCompleted => write!(f, "SynthesizingAudioCompleted"),
            Self::Canceled => write!(f, "Canceled"),
        }
    }
}

/// Outcome of one synthesis call
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub reason: ResultReason,
    pub audio_data: Vec<u8>,
    pub error_details: Option<String>,
}

impl SynthesisResult {
    pub fn completed(audio_data: Vec<u8>) -> Self {
        Self {
            reason: ResultReason::SynthesizingAudioCompleted,
            audio_data,
            error_details: None,
        }
    }

    pub fn canceled(details: impl Into<String>) -> Self {
        Self {
            reason: ResultReason::Canceled,
            audio_data: Vec::new(),
            error_details: Some(details.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.reason == ResultReason::SynthesizingAudioCompleted
    }
}
