//! Azure Speech text-to-speech over the service's WebSocket protocol

pub mod protocol;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, tungstenite::client::IntoClientRequest};
use tracing::{debug, warn};
use uuid::Uuid;

use super::provider::SpeechSynthesizer;
use super::types::{SynthesisResult, VisemeReceived};

pub const SPEECH_KEY_VAR: &str = "SPEECH_KEY";
pub const SPEECH_REGION_VAR: &str = "SPEECH_REGION";

/// Subscription credentials for the Speech service
#[derive(Clone)]
pub struct SpeechCredentials {
    pub subscription_key: String,
    pub region: String,
}

impl std::fmt::Debug for SpeechCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechCredentials")
            .field("subscription_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

impl SpeechCredentials {
    /// Read `SPEECH_KEY` and `SPEECH_REGION` from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("{name} must be set"))
        };

        Ok(Self {
            subscription_key: required(SPEECH_KEY_VAR)?,
            region: required(SPEECH_REGION_VAR)?,
        })
    }
}

/// Configuration for the Azure synthesizer
#[derive(Debug, Clone)]
pub struct AzureSpeechConfig {
    pub credentials: SpeechCredentials,
    /// Overrides the regional endpoint, mostly useful for sovereign clouds
    pub endpoint: Option<String>,
    pub output_format: String,
    pub timeout: Duration,
}

impl AzureSpeechConfig {
    pub fn new(credentials: SpeechCredentials) -> Self {
        Self {
            credentials,
            endpoint: None,
            output_format: "riff-24khz-16bit-mono-pcm".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Azure Speech synthesizer with viseme and blend-shape metadata
pub struct AzureSynthesizer {
    config: AzureSpeechConfig,
}

impl AzureSynthesizer {
    pub fn new(config: AzureSpeechConfig) -> Self {
        Self { config }
    }

    fn build_url(&self, connection_id: &str) -> String {
        let base = match &self.config.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "wss://{}.tts.speech.microsoft.com/cognitiveservices/websocket/v1",
                self.config.credentials.region
            ),
        };
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{base}{separator}X-ConnectionId={connection_id}")
    }

    async fn run_turn(
        &self,
        ssml: &str,
        on_viseme: &mut (dyn FnMut(VisemeReceived) + Send),
    ) -> Result<SynthesisResult> {
        let connection_id = new_id();
        let request_id = new_id();

        let mut request = self
            .build_url(&connection_id)
            .into_client_request()
            .context("Failed to build request")?;
        request.headers_mut().insert(
            "Ocp-Apim-Subscription-Key",
            self.config
                .credentials
                .subscription_key
                .parse()
                .context("Invalid subscription key for HTTP header")?,
        );
        request.headers_mut().insert(
            "X-ConnectionId",
            connection_id
                .parse()
                .context("Invalid connection id for HTTP header")?,
        );

        let (ws_stream, _) = connect_async(request)
            .await
            .context("Failed to connect to the Speech service WebSocket")?;
        let (mut write, mut read) = ws_stream.split();

        let outgoing = [
            (
                protocol::PATH_SPEECH_CONFIG,
                "application/json",
                protocol::speech_config_body(),
            ),
            (
                protocol::PATH_SYNTHESIS_CONTEXT,
                "application/json",
                protocol::synthesis_context_body(&self.config.output_format),
            ),
            (protocol::PATH_SSML, "application/ssml+xml", ssml.to_string()),
        ];
        for (path, content_type, body) in outgoing {
            let message =
                protocol::encode_text_message(path, &request_id, &timestamp(), content_type, &body);
            write
                .send(Message::Text(message))
                .await
                .with_context(|| format!("Failed to send {path} message"))?;
        }

        let mut audio = Vec::new();
        while let Some(message) = read.next().await {
            let message = message.context("Speech service connection failed")?;
            match message {
                Message::Text(text) => {
                    let frame = match protocol::parse_text_message(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("Skipping malformed speech service message: {e:?}");
                            continue;
                        }
                    };
                    match frame.path().unwrap_or_default() {
                        protocol::PATH_TURN_START => debug!("Synthesis turn started"),
                        protocol::PATH_AUDIO_METADATA => {
                            match protocol::parse_visemes(&frame.body) {
                                Ok(visemes) => {
                                    for viseme in visemes {
                                        on_viseme(viseme);
                                    }
                                }
                                Err(e) => warn!("Skipping audio metadata: {e:?}"),
                            }
                        }
                        protocol::PATH_TURN_END => {
                            debug!("Synthesis turn ended with {} audio bytes", audio.len());
                            if let Err(e) = write.close().await {
                                debug!("Failed to close speech WebSocket cleanly: {e:?}");
                            }
                            return Ok(SynthesisResult::completed(audio));
                        }
                        other => debug!("Ignoring speech service message {other:?}"),
                    }
                }
                Message::Binary(data) => match protocol::parse_binary_message(&data) {
                    Ok(frame) if frame.path() == Some(protocol::PATH_AUDIO) => {
                        audio.extend_from_slice(&frame.body)
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Skipping malformed binary message: {e:?}"),
                },
                Message::Close(frame) => {
                    let details = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                        .unwrap_or_else(|| "connection closed without a reason".to_string());
                    return Ok(SynthesisResult::canceled(details));
                }
                _ => continue,
            }
        }

        Ok(SynthesisResult::canceled(
            "Speech service closed the connection before the turn ended",
        ))
    }
}

#[async_trait]
impl SpeechSynthesizer for AzureSynthesizer {
    fn name(&self) -> &'static str {
        "azure"
    }

    async fn synthesize(
        &self,
        ssml: &str,
        on_viseme: &mut (dyn FnMut(VisemeReceived) + Send),
    ) -> Result<SynthesisResult> {
        tokio::time::timeout(self.config.timeout, self.run_turn(ssml, on_viseme))
            .await
            .with_context(|| {
                format!("Speech synthesis timed out after {:?}", self.config.timeout)
            })?
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

fn timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
