//! Viseme and blend-shape accumulation for a single synthesis call

pub mod collector;
pub mod error;
pub mod types;

pub use collector::AnimationCollector;
pub use error::AnimationError;
pub use types::{AnimationBatch, AnimationPayload, BlendShapeFrame, VisemeEvent};
