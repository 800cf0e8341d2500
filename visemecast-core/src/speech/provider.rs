use anyhow::Result;
use async_trait::async_trait;

use super::types::{SynthesisResult, VisemeReceived};

/// Trait for speech engines that report visemes while synthesizing
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Synthesize an SSML document.
    ///
    /// `on_viseme` is called once per viseme event, in the order the engine
    /// produces them, and only while this call is running. A non-success
    /// `ResultReason` is returned as `Ok`; `Err` is reserved for transport
    /// level failures.
    async fn synthesize(
        &self,
        ssml: &str,
        on_viseme: &mut (dyn FnMut(VisemeReceived) + Send),
    ) -> Result<SynthesisResult>;
}
