//! Sequencing of synthesis and emission for a fixed list of texts

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::animation::AnimationCollector;
use crate::messaging::MessagingClient;
use crate::settings::Settings;
use crate::speech::ssml::build_ssml;
use crate::speech::{SpeechSynthesizer, Voice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Connecting,
    Connected,
    ConnectFailed,
    ProcessingText(usize),
    Delaying,
    Draining,
    Disconnected,
}

/// What the pipeline needs to know about one run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub texts: Vec<String>,
    pub voice: Voice,
    pub url: String,
    pub path: String,
    pub event: String,
    pub delay: Duration,
    pub shutdown_grace: Duration,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            texts: settings.texts.clone(),
            voice: settings.voice(),
            url: settings.messaging.url.clone(),
            path: settings.messaging.path.clone(),
            event: settings.messaging.event.clone(),
            delay: settings.pacing.delay(),
            shutdown_grace: settings.pacing.shutdown_grace(),
        }
    }
}

/// Counts for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub texts: usize,
    pub emitted: usize,
    pub synthesis_failures: usize,
    pub emit_failures: usize,
    pub connected: bool,
}

enum TextOutcome {
    Emitted,
    SynthesisFailed,
    NotDelivered,
}

/// Connects once, then for every text: synthesize, package the visemes and
/// blend shapes, emit, and pause. Disconnects after a final pause.
///
/// No failure of the broker, the speech service or a single animation frame
/// stops the run.
pub struct SynthesisPipeline {
    config: PipelineConfig,
    synthesizer: Box<dyn SpeechSynthesizer>,
    messenger: Box<dyn MessagingClient>,
    collector: AnimationCollector,
    state: PipelineState,
}

impl SynthesisPipeline {
    pub fn new(
        config: PipelineConfig,
        synthesizer: Box<dyn SpeechSynthesizer>,
        messenger: Box<dyn MessagingClient>,
    ) -> Self {
        Self {
            config,
            synthesizer,
            messenger,
            collector: AnimationCollector::new(),
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub async fn run(&mut self) -> RunSummary {
        let mut summary = RunSummary {
            texts: self.config.texts.len(),
            ..Default::default()
        };

        self.transition(PipelineState::Connecting);
        match self
            .messenger
            .connect(&self.config.url, &self.config.path)
            .await
        {
            Ok(()) => {
                info!(
                    "Connected to the {} server at {}",
                    self.messenger.name(),
                    self.config.url
                );
                summary.connected = true;
                self.transition(PipelineState::Connected);
            }
            Err(e) => {
                error!(
                    "Failed to connect to the {} server at {}: {e}",
                    self.messenger.name(),
                    self.config.url
                );
                self.transition(PipelineState::ConnectFailed);
            }
        }

        for index in 0..self.config.texts.len() {
            self.transition(PipelineState::ProcessingText(index));
            match self.process_text(index).await {
                TextOutcome::Emitted => summary.emitted += 1,
                TextOutcome::SynthesisFailed => summary.synthesis_failures += 1,
                TextOutcome::NotDelivered => summary.emit_failures += 1,
            }

            self.transition(PipelineState::Delaying);
            tokio::time::sleep(self.config.delay).await;
        }

        self.transition(PipelineState::Draining);
        tokio::time::sleep(self.config.shutdown_grace).await;
        self.messenger.disconnect().await;
        self.transition(PipelineState::Disconnected);

        info!(
            "Run finished: {} of {} texts emitted ({} synthesis failures, {} emit failures)",
            summary.emitted, summary.texts, summary.synthesis_failures, summary.emit_failures
        );
        summary
    }

    async fn process_text(&mut self, index: usize) -> TextOutcome {
        let text = self.config.texts[index].clone();
        let ssml = build_ssml(&text, &self.config.voice);

        self.collector.reset();
        let collector = &mut self.collector;
        let result = self
            .synthesizer
            .synthesize(&ssml, &mut |viseme| collector.on_viseme(viseme))
            .await;

        match result {
            Ok(result) if result.is_success() => {}
            Ok(result) => {
                error!(
                    "Speech synthesis failed with reason: {} ({})",
                    result.reason,
                    result.error_details.as_deref().unwrap_or("no details")
                );
                self.collector.reset();
                return TextOutcome::SynthesisFailed;
            }
            Err(e) => {
                error!("Speech synthesis failed for text {index}: {e:?}");
                self.collector.reset();
                return TextOutcome::SynthesisFailed;
            }
        }

        let batch = self.collector.drain_and_reset(&text);
        let payload = match batch.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize animation batch for text {index}: {e:?}");
                return TextOutcome::NotDelivered;
            }
        };

        match self.messenger.emit(&self.config.event, &payload).await {
            Ok(()) => {
                info!(
                    "Emitted {} visemes and {} blend shape frames for {:?}",
                    batch.visemes.len(),
                    batch.blend_shapes.len(),
                    text
                );
                TextOutcome::Emitted
            }
            Err(e) => {
                warn!("Failed to emit animation for {text:?}: {e}");
                TextOutcome::NotDelivered
            }
        }
    }
}
