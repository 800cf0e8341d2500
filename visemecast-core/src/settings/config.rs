use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::speech::Voice;

/// Everything the pipeline needs apart from the speech credentials, which
/// are only ever read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Texts to synthesize, in order
    #[serde(default = "default_texts")]
    pub texts: Vec<String>,

    #[serde(default)]
    pub speech: SpeechSettings,

    #[serde(default)]
    pub messaging: MessagingSettings,

    #[serde(default)]
    pub pacing: PacingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            texts: default_texts(),
            speech: SpeechSettings::default(),
            messaging: MessagingSettings::default(),
            pacing: PacingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, or the defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {path:?}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid settings in {path:?}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(contents).context("Failed to parse settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.messaging.url.trim().is_empty(),
            "messaging.url must not be empty"
        );
        anyhow::ensure!(
            !self.messaging.event.trim().is_empty(),
            "messaging.event must not be empty"
        );
        anyhow::ensure!(
            !self.speech.voice.trim().is_empty(),
            "speech.voice must not be empty"
        );
        Ok(())
    }

    pub fn voice(&self) -> Voice {
        Voice {
            name: self.speech.voice.clone(),
            language_code: self.speech.language.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechSettings {
    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Replaces the regional endpoint derived from `SPEECH_REGION`
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_output_format")]
    pub output_format: String,

    #[serde(default = "default_speech_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            language: default_language(),
            endpoint: None,
            output_format: default_output_format(),
            timeout_secs: default_speech_timeout_secs(),
        }
    }
}

impl SpeechSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingSettings {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_path")]
    pub path: String,

    /// Event name each animation payload is emitted under
    #[serde(default = "default_event")]
    pub event: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            path: default_path(),
            event: default_event(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl MessagingSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingSettings {
    /// Pause after every text, whether or not it was synthesized
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,

    /// Pause before disconnecting so the last emit can flush. Defaults to
    /// `delay_secs`.
    #[serde(default)]
    pub shutdown_grace_secs: Option<u64>,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
            shutdown_grace_secs: None,
        }
    }
}

impl PacingSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs.unwrap_or(self.delay_secs))
    }
}

fn default_texts() -> Vec<String> {
    vec![
        "Hello, how are you?".to_string(),
        "I am fine, thank you.".to_string(),
    ]
}

fn default_voice() -> String {
    "en-US-AvaNeural".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_output_format() -> String {
    "riff-24khz-16bit-mono-pcm".to_string()
}

fn default_speech_timeout_secs() -> u64 {
    60
}

fn default_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_path() -> String {
    "/api/socket".to_string()
}

fn default_event() -> String {
    "message".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_delay_secs() -> u64 {
    5
}
