pub mod config;


pub use config::{MessagingSettings, PacingSettings, Settings, SpeechSettings};
