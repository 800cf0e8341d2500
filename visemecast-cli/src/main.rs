use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use visemecast_core::{
    AzureSpeechConfig, AzureSynthesizer, PipelineConfig, Settings, SocketIoClient,
    SpeechCredentials, SynthesisPipeline,
};

#[derive(Parser, Debug)]
#[command(name = "visemecast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Synthesize speech with visemes and stream the animation to a Socket.IO server")]
struct Args {
    /// Load settings from a TOML file
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Text to synthesize; repeat for several. Replaces the configured texts
    #[arg(long = "text", value_name = "TEXT")]
    texts: Vec<String>,

    /// Socket.IO server URL
    #[arg(long)]
    url: Option<String>,

    /// Socket.IO path on the server
    #[arg(long)]
    path: Option<String>,

    /// Neural voice name
    #[arg(long)]
    voice: Option<String>,

    /// Seconds to wait after each text
    #[arg(long, value_name = "SECONDS")]
    delay_secs: Option<u64>,
}

impl Args {
    fn apply(self, settings: &mut Settings) {
        if !self.texts.is_empty() {
            settings.texts = self.texts;
        }
        if let Some(url) = self.url {
            settings.messaging.url = url;
        }
        if let Some(path) = self.path {
            settings.messaging.path = path;
        }
        if let Some(voice) = self.voice {
            settings.speech.voice = voice;
        }
        if let Some(delay_secs) = self.delay_secs {
            settings.pacing.delay_secs = delay_secs;
        }
    }
}

fn main() -> Result<()> {
    setup_tracing();

    // Everything runs as one cooperative task
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.settings.as_deref())?;
    args.apply(&mut settings);
    settings.validate()?;

    info!(
        "Startup: {} texts, voice={}, server={}{}",
        settings.texts.len(),
        settings.speech.voice,
        settings.messaging.url,
        settings.messaging.path
    );

    let credentials = SpeechCredentials::from_env()?;
    let mut speech_config = AzureSpeechConfig::new(credentials);
    speech_config.endpoint = settings.speech.endpoint.clone();
    speech_config.output_format = settings.speech.output_format.clone();
    speech_config.timeout = settings.speech.timeout();

    let synthesizer = AzureSynthesizer::new(speech_config);
    let messenger = SocketIoClient::new(settings.messaging.connect_timeout());

    let mut pipeline = SynthesisPipeline::new(
        PipelineConfig::from_settings(&settings),
        Box::new(synthesizer),
        Box::new(messenger),
    );
    let summary = pipeline.run().await;
    info!("{summary:?}");

    Ok(())
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_settings() {
        let args = Args::parse_from([
            "visemecast",
            "--text",
            "First",
            "--text",
            "Second",
            "--url",
            "http://broker:4000",
            "--delay-secs",
            "1",
        ]);
        let mut settings = Settings::default();
        args.apply(&mut settings);

        assert_eq!(settings.texts, vec!["First", "Second"]);
        assert_eq!(settings.messaging.url, "http://broker:4000");
        assert_eq!(settings.messaging.path, "/api/socket");
        assert_eq!(settings.pacing.delay_secs, 1);
    }

    #[test]
    fn test_no_flags_keep_settings() {
        let args = Args::parse_from(["visemecast"]);
        let mut settings = Settings::default();
        args.apply(&mut settings);
        assert_eq!(settings, Settings::default());
    }
}
