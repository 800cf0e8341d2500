use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;

use super::error::MessagingError;
use super::provider::{ConnectionState, MessagingClient};

/// A call made against the recording messenger
#[derive(Debug, Clone, PartialEq)]
pub enum MessagingCall {
    Connect {
        url: String,
        path: String,
        at: Instant,
    },
    Emit {
        channel: String,
        payload: String,
        at: Instant,
    },
    Disconnect {
        at: Instant,
    },
}

#[derive(Default)]
struct Recorded {
    calls: Vec<MessagingCall>,
    fail_connect: bool,
    connected: bool,
}

/// Messaging client for testing. Records every call; emits while not
/// connected are recorded and then rejected with `NotConnected`.
#[derive(Clone, Default)]
pub struct RecordingMessenger {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A messenger whose `connect` always fails
    pub fn refusing() -> Self {
        let messenger = Self::default();
        messenger.inner.lock().unwrap().fail_connect = true;
        messenger
    }

    pub fn get_calls(&self) -> Vec<MessagingCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Emitted `(channel, payload)` pairs in order
    pub fn get_emits(&self) -> Vec<(String, String)> {
        self.get_calls()
            .into_iter()
            .filter_map(|call| match call {
                MessagingCall::Emit {
                    channel, payload, ..
                } => Some((channel, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn emit_times(&self) -> Vec<Instant> {
        self.get_calls()
            .into_iter()
            .filter_map(|call| match call {
                MessagingCall::Emit { at, .. } => Some(at),
                _ => None,
            })
            .collect()
    }

    pub fn disconnect_time(&self) -> Option<Instant> {
        self.get_calls().into_iter().find_map(|call| match call {
            MessagingCall::Disconnect { at } => Some(at),
            _ => None,
        })
    }
}

#[async_trait]
impl MessagingClient for RecordingMessenger {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn state(&self) -> ConnectionState {
        if self.inner.lock().unwrap().connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    async fn connect(&mut self, url: &str, path: &str) -> Result<(), MessagingError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(MessagingCall::Connect {
            url: url.to_string(),
            path: path.to_string(),
            at: Instant::now(),
        });
        if inner.fail_connect {
            return Err(MessagingError::Handshake("connection refused".to_string()));
        }
        inner.connected = true;
        Ok(())
    }

    async fn emit(&mut self, channel: &str, payload: &str) -> Result<(), MessagingError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(MessagingCall::Emit {
            channel: channel.to_string(),
            payload: payload.to_string(),
            at: Instant::now(),
        });
        if inner.connected {
            Ok(())
        } else {
            Err(MessagingError::NotConnected)
        }
    }

    async fn disconnect(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(MessagingCall::Disconnect { at: Instant::now() });
        inner.connected = false;
    }
}
