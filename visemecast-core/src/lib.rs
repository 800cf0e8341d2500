pub mod animation;
pub mod messaging;
pub mod pipeline;
pub mod settings;
pub mod speech;

pub use animation::{AnimationBatch, AnimationCollector};
pub use messaging::{MessagingClient, SocketIoClient};
pub use pipeline::{PipelineConfig, PipelineState, RunSummary, SynthesisPipeline};
pub use settings::Settings;
pub use speech::azure::{AzureSpeechConfig, AzureSynthesizer, SpeechCredentials};
pub use speech::SpeechSynthesizer;
