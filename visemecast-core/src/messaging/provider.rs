use async_trait::async_trait;

use super::error::MessagingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Trait for clients that publish events to a message broker
#[async_trait]
pub trait MessagingClient: Send {
    fn name(&self) -> &'static str;

    fn state(&self) -> ConnectionState;

    /// Open a session to `url`, served under `path`
    async fn connect(&mut self, url: &str, path: &str) -> Result<(), MessagingError>;

    /// Queue one event for delivery. Does not wait for the broker to
    /// acknowledge it.
    async fn emit(&mut self, channel: &str, payload: &str) -> Result<(), MessagingError>;

    /// Close the session. Safe to call when never connected.
    async fn disconnect(&mut self);
}
