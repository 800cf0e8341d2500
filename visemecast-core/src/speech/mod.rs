//! Speech synthesis with viseme events

pub mod azure;
pub mod mock;
pub mod provider;
pub mod ssml;
pub mod types;

pub use provider::SpeechSynthesizer;
pub use types::{ResultReason, SynthesisResult, VisemeReceived, Voice};
