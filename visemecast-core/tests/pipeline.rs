use std::sync::Once;
use std::time::Duration;

use serde_json::{json, Value};
use visemecast_core::animation::AnimationPayload;
use visemecast_core::messaging::mock::{MessagingCall, RecordingMessenger};
use visemecast_core::pipeline::{PipelineConfig, PipelineState, SynthesisPipeline};
use visemecast_core::settings::Settings;
use visemecast_core::speech::mock::{ScriptedOutcome, ScriptedSynthesizer};
use visemecast_core::speech::VisemeReceived;

static TRACING_INIT: Once = Once::new();

fn setup_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

fn viseme(ticks: u64, id: u32, animation: AnimationPayload) -> VisemeReceived {
    VisemeReceived {
        audio_offset_ticks: ticks,
        viseme_id: id,
        animation,
    }
}

fn text_frame(json: &str) -> AnimationPayload {
    AnimationPayload::Text(json.to_string())
}

fn config() -> PipelineConfig {
    PipelineConfig::from_settings(&Settings::default())
}

fn build(
    config: PipelineConfig,
    synthesizer: &ScriptedSynthesizer,
    messenger: &RecordingMessenger,
) -> SynthesisPipeline {
    setup_tracing();
    SynthesisPipeline::new(
        config,
        Box::new(synthesizer.clone()),
        Box::new(messenger.clone()),
    )
}

fn payloads(messenger: &RecordingMessenger) -> Vec<Value> {
    messenger
        .get_emits()
        .into_iter()
        .map(|(channel, payload)| {
            assert_eq!(channel, "message");
            serde_json::from_str(&payload).expect("payload should be JSON")
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_two_texts_emit_twice_with_pacing() {
    let synthesizer = ScriptedSynthesizer::new(vec![
        ScriptedOutcome::Complete {
            visemes: vec![
                viseme(0, 0, AnimationPayload::Absent),
                viseme(500_000, 12, text_frame(r#"{"FrameIndex":0}"#)),
            ],
        },
        ScriptedOutcome::Complete {
            visemes: vec![viseme(50_000, 4, AnimationPayload::Absent)],
        },
    ]);
    let messenger = RecordingMessenger::new();
    let config = config();
    let delay = config.delay;
    let grace = config.shutdown_grace;

    let mut pipeline = build(config, &synthesizer, &messenger);
    let summary = pipeline.run().await;

    assert_eq!(summary.texts, 2);
    assert_eq!(summary.emitted, 2);
    assert!(summary.connected);
    assert_eq!(pipeline.state(), PipelineState::Disconnected);

    let payloads = payloads(&messenger);
    assert_eq!(
        payloads[0],
        json!({
            "text": "Hello, how are you?",
            "visemes": [[0.0, 0], [50.0, 12]],
            "3d_blend_shapes": [{"FrameIndex": 0}],
        })
    );
    assert_eq!(
        payloads[1],
        json!({
            "text": "I am fine, thank you.",
            "visemes": [[5.0, 4]],
            "3d_blend_shapes": [],
        })
    );

    let emit_times = messenger.emit_times();
    assert!(emit_times[1] - emit_times[0] >= delay);
    let disconnect = messenger.disconnect_time().expect("should disconnect");
    assert!(disconnect - emit_times[1] >= delay + grace);

    let calls = messenger.get_calls();
    assert!(matches!(
        &calls[0],
        MessagingCall::Connect { url, path, .. } if url == "http://localhost:3000" && path == "/api/socket"
    ));
    assert!(matches!(calls.last(), Some(MessagingCall::Disconnect { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_failed_synthesis_is_skipped_without_leaking_visemes() {
    let synthesizer = ScriptedSynthesizer::new(vec![
        ScriptedOutcome::Complete {
            visemes: vec![viseme(10_000, 1, AnimationPayload::Absent)],
        },
        ScriptedOutcome::Cancel {
            visemes: vec![
                viseme(20_000, 2, text_frame(r#"{"leak":true}"#)),
                viseme(30_000, 3, AnimationPayload::Absent),
            ],
            details: "quota exceeded".to_string(),
        },
        ScriptedOutcome::Complete {
            visemes: vec![viseme(40_000, 4, AnimationPayload::Absent)],
        },
    ]);
    let messenger = RecordingMessenger::new();
    let mut config = config();
    config.texts = vec!["one".into(), "two".into(), "three".into()];

    let mut pipeline = build(config, &synthesizer, &messenger);
    let summary = pipeline.run().await;

    assert_eq!(summary.emitted, 2);
    assert_eq!(summary.synthesis_failures, 1);
    assert_eq!(synthesizer.get_call_count(), 3);

    let payloads = payloads(&messenger);
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0]["text"], json!("one"));
    assert_eq!(payloads[0]["visemes"], json!([[1.0, 1]]));
    assert_eq!(payloads[1]["text"], json!("three"));
    assert_eq!(payloads[1]["visemes"], json!([[4.0, 4]]));
    assert_eq!(payloads[1]["3d_blend_shapes"], json!([]));
}

#[tokio::test(start_paused = true)]
async fn test_pacing_delay_follows_failed_text() {
    let synthesizer = ScriptedSynthesizer::default();
    synthesizer.push(ScriptedOutcome::Cancel {
        visemes: vec![],
        details: "voice unavailable".to_string(),
    });
    synthesizer.push(ScriptedOutcome::Complete {
        visemes: vec![viseme(0, 0, AnimationPayload::Absent)],
    });
    let messenger = RecordingMessenger::new();
    let config = config();
    let delay = config.delay;
    let grace = config.shutdown_grace;

    let mut pipeline = build(config, &synthesizer, &messenger);
    let start = tokio::time::Instant::now();
    let summary = pipeline.run().await;

    assert_eq!(summary.synthesis_failures, 1);
    assert_eq!(summary.emitted, 1);

    let emit_times = messenger.emit_times();
    assert_eq!(emit_times.len(), 1);
    assert!(emit_times[0] - start >= delay);
    let disconnect = messenger.disconnect_time().expect("should disconnect");
    assert!(disconnect - emit_times[0] >= delay + grace);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_does_not_stop_the_run() {
    let synthesizer = ScriptedSynthesizer::new(vec![
        ScriptedOutcome::Fail {
            message: "connection reset".to_string(),
        },
        ScriptedOutcome::Complete { visemes: vec![] },
    ]);
    let messenger = RecordingMessenger::new();

    let mut pipeline = build(config(), &synthesizer, &messenger);
    let summary = pipeline.run().await;

    assert_eq!(summary.synthesis_failures, 1);
    assert_eq!(summary.emitted, 1);
    assert_eq!(payloads(&messenger)[0]["text"], json!("I am fine, thank you."));
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_still_attempts_every_text() {
    let synthesizer = ScriptedSynthesizer::default();
    let messenger = RecordingMessenger::refusing();

    let mut pipeline = build(config(), &synthesizer, &messenger);
    let summary = pipeline.run().await;

    assert!(!summary.connected);
    assert_eq!(synthesizer.get_call_count(), 2);
    assert_eq!(messenger.get_emits().len(), 2);
    assert_eq!(summary.emitted, 0);
    assert_eq!(summary.emit_failures, 2);
    assert!(messenger.disconnect_time().is_some());
    assert_eq!(pipeline.state(), PipelineState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_dropped() {
    let synthesizer = ScriptedSynthesizer::new(vec![ScriptedOutcome::Complete {
        visemes: vec![
            viseme(0, 0, text_frame("{bad json")),
            viseme(10_000, 5, text_frame(r#"{"a":1}"#)),
            viseme(20_000, 6, AnimationPayload::Unexpected("number")),
        ],
    }]);
    let messenger = RecordingMessenger::new();
    let mut config = config();
    config.texts = vec!["only".into()];

    let mut pipeline = build(config, &synthesizer, &messenger);
    let summary = pipeline.run().await;

    assert_eq!(summary.emitted, 1);
    let payload = &payloads(&messenger)[0];
    assert_eq!(payload["visemes"], json!([[0.0, 0], [1.0, 5], [2.0, 6]]));
    assert_eq!(payload["3d_blend_shapes"], json!([{"a": 1}]));
}

#[tokio::test(start_paused = true)]
async fn test_ssml_carries_text_and_voice() {
    let synthesizer = ScriptedSynthesizer::default();
    let messenger = RecordingMessenger::new();
    let mut config = config();
    config.texts = vec!["Fish & chips".into()];

    let mut pipeline = build(config, &synthesizer, &messenger);
    pipeline.run().await;

    let ssml = synthesizer.get_captured_ssml();
    assert_eq!(ssml.len(), 1);
    assert!(ssml[0].contains("<voice name=\"en-US-AvaNeural\">"));
    assert!(ssml[0].contains("Fish &amp; chips"));
    assert_eq!(payloads(&messenger)[0]["text"], json!("Fish & chips"));
}

#[tokio::test(start_paused = true)]
async fn test_empty_text_list_still_disconnects() {
    let synthesizer = ScriptedSynthesizer::default();
    let messenger = RecordingMessenger::new();
    let mut config = config();
    config.texts.clear();
    config.shutdown_grace = Duration::from_secs(1);

    let mut pipeline = build(config, &synthesizer, &messenger);
    let summary = pipeline.run().await;

    assert_eq!(summary.texts, 0);
    assert_eq!(synthesizer.get_call_count(), 0);
    assert_eq!(messenger.get_calls().len(), 2);
}
