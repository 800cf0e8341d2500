use tracing::warn;

use super::types::{AnimationBatch, AnimationPayload, BlendShapeFrame, VisemeEvent};
use crate::speech::VisemeReceived;

/// Accumulates the viseme events and blend-shape frames reported during one
/// synthesis call.
///
/// The pipeline owns exactly one collector and hands it to the viseme
/// callback by mutable borrow for the duration of a `synthesize` call, so
/// nothing can be recorded while a batch is being drained.
#[derive(Debug, Default)]
pub struct AnimationCollector {
    visemes: Vec<VisemeEvent>,
    blend_shapes: Vec<BlendShapeFrame>,
}

impl AnimationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry point for the synthesizer's viseme callback
    pub fn on_viseme(&mut self, received: VisemeReceived) {
        self.record(VisemeEvent::from_ticks(
            received.audio_offset_ticks,
            received.viseme_id,
        ));
        self.record_animation(received.animation);
    }

    pub fn record(&mut self, event: VisemeEvent) {
        self.visemes.push(event);
    }

    /// Decode and keep one blend-shape frame. Returns whether a frame was
    /// recorded; bad frames are logged and dropped.
    pub fn record_animation(&mut self, payload: AnimationPayload) -> bool {
        match payload.into_frame() {
            Ok(Some(frame)) => {
                self.blend_shapes.push(frame);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Error parsing animation data: {e}");
                false
            }
        }
    }

    /// Move everything recorded so far into a batch for `text`, leaving the
    /// collector empty.
    pub fn drain_and_reset(&mut self, text: &str) -> AnimationBatch {
        AnimationBatch {
            text: text.to_string(),
            visemes: std::mem::take(&mut self.visemes),
            blend_shapes: std::mem::take(&mut self.blend_shapes),
        }
    }

    pub fn reset(&mut self) {
        self.visemes.clear();
        self.blend_shapes.clear();
    }

    pub fn visemes(&self) -> &[VisemeEvent] {
        &self.visemes
    }

    pub fn blend_shapes(&self) -> &[BlendShapeFrame] {
        &self.blend_shapes
    }

    pub fn is_empty(&self) -> bool {
        self.visemes.is_empty() && self.blend_shapes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_in_arrival_order() {
        let mut collector = AnimationCollector::new();
        collector.record(VisemeEvent::new(0.0, 0));
        collector.record(VisemeEvent::new(50.0, 21));
        collector.record(VisemeEvent::new(112.5, 4));

        let ids: Vec<u32> = collector.visemes().iter().map(|v| v.viseme_id).collect();
        assert_eq!(ids, vec![0, 21, 4]);
    }

    #[test]
    fn test_on_viseme_converts_ticks_and_keeps_frame() {
        let mut collector = AnimationCollector::new();
        collector.on_viseme(VisemeReceived {
            audio_offset_ticks: 50_000,
            viseme_id: 3,
            animation: AnimationPayload::Text(r#"{"a":1}"#.to_string()),
        });

        assert_eq!(collector.visemes(), &[VisemeEvent::new(5.0, 3)]);
        assert_eq!(collector.blend_shapes(), &[json!({"a": 1})]);
    }

    #[test]
    fn test_bad_frames_are_dropped() {
        let mut collector = AnimationCollector::new();

        assert!(!collector.record_animation(AnimationPayload::Text("{bad json".to_string())));
        assert!(!collector.record_animation(AnimationPayload::Unexpected("number")));
        assert!(!collector.record_animation(AnimationPayload::Absent));
        assert!(collector.blend_shapes().is_empty());

        let mut map = serde_json::Map::new();
        map.insert("b".to_string(), json!(2));
        assert!(collector.record_animation(AnimationPayload::Structured(map)));
        assert_eq!(collector.blend_shapes(), &[json!({"b": 2})]);
    }

    #[test]
    fn test_drain_resets_both_sequences() {
        let mut collector = AnimationCollector::new();
        collector.record(VisemeEvent::new(1.0, 1));
        collector.record_animation(AnimationPayload::Text("{}".to_string()));

        let batch = collector.drain_and_reset("first");
        assert_eq!(batch.text, "first");
        assert_eq!(batch.visemes.len(), 1);
        assert_eq!(batch.blend_shapes, vec![json!({})]);
        assert!(collector.is_empty());

        collector.record(VisemeEvent::new(2.0, 2));
        let batch = collector.drain_and_reset("second");
        assert_eq!(batch.visemes, vec![VisemeEvent::new(2.0, 2)]);
        assert!(batch.blend_shapes.is_empty());
    }
}
