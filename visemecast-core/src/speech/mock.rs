use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use super::provider::SpeechSynthesizer;
use super::types::{SynthesisResult, VisemeReceived};

/// What the scripted synthesizer does for one call
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Report the visemes, then complete successfully
    Complete { visemes: Vec<VisemeReceived> },
    /// Report the visemes, then cancel with the given details
    Cancel {
        visemes: Vec<VisemeReceived>,
        details: String,
    },
    /// Fail at the transport level without reporting anything
    Fail { message: String },
}

/// Scripted synthesizer for testing. Outcomes are consumed in call order;
/// once the script runs out every call completes with no visemes.
#[derive(Clone, Default)]
pub struct ScriptedSynthesizer {
    script: Arc<Mutex<VecDeque<ScriptedOutcome>>>,
    captured_ssml: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSynthesizer {
    pub fn new(script: Vec<ScriptedOutcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            captured_ssml: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, outcome: ScriptedOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn get_call_count(&self) -> usize {
        self.captured_ssml.lock().unwrap().len()
    }

    pub fn get_captured_ssml(&self) -> Vec<String> {
        self.captured_ssml.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn synthesize(
        &self,
        ssml: &str,
        on_viseme: &mut (dyn FnMut(VisemeReceived) + Send),
    ) -> Result<SynthesisResult> {
        self.captured_ssml.lock().unwrap().push(ssml.to_string());

        let outcome = self.script.lock().unwrap().pop_front();
        match outcome {
            None => Ok(SynthesisResult::completed(Vec::new())),
            Some(ScriptedOutcome::Complete { visemes }) => {
                for viseme in visemes {
                    on_viseme(viseme);
                }
                Ok(SynthesisResult::completed(Vec::new()))
            }
            Some(ScriptedOutcome::Cancel { visemes, details }) => {
                for viseme in visemes {
                    on_viseme(viseme);
                }
                Ok(SynthesisResult::canceled(details))
            }
            Some(ScriptedOutcome::Fail { message }) => Err(anyhow::anyhow!(message)),
        }
    }
}
