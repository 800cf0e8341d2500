//! Socket.IO client over a single WebSocket
//!
//! Only the WebSocket transport is spoken (no HTTP long-polling upgrade), and
//! only the default namespace is joined.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::error::MessagingError;
use super::packet::{EnginePacket, OpenPayload, SocketPacket};
use super::provider::{ConnectionState, MessagingClient};

const DEFAULT_PATH: &str = "socket.io";

type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Build the Engine.IO WebSocket URL for a server URL and Socket.IO path.
///
/// `http://localhost:3000` with `/api/socket` becomes
/// `ws://localhost:3000/api/socket/?EIO=4&transport=websocket`. A query
/// string on `url` is appended after the Engine.IO parameters.
pub fn websocket_url(url: &str, path: &str) -> Result<String, MessagingError> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| MessagingError::InvalidUrl(format!("{url} has no scheme")))?;
    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(MessagingError::InvalidUrl(format!(
                "unsupported scheme {other} in {url}"
            )))
        }
    };

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(MessagingError::InvalidUrl(format!("{url} has no host")));
    }

    let path = match path.trim_matches('/') {
        "" => DEFAULT_PATH,
        trimmed => trimmed,
    };

    // Extra query parameters on the server URL (auth tokens and the like)
    // ride along with the Engine.IO ones
    let query = rest
        .split('#')
        .next()
        .and_then(|before_fragment| before_fragment.split_once('?'))
        .map(|(_, query)| query.trim_matches('&'))
        .filter(|query| !query.is_empty());

    let mut ws_url = format!("{scheme}://{host}/{path}/?EIO=4&transport=websocket");
    if let Some(query) = query {
        ws_url.push('&');
        ws_url.push_str(query);
    }
    Ok(ws_url)
}

struct Session {
    sid: String,
    outgoing: mpsc::UnboundedSender<Message>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

/// Socket.IO v5 client speaking Engine.IO v4 over WebSocket
pub struct SocketIoClient {
    state: Arc<Mutex<ConnectionState>>,
    session: Option<Session>,
    connect_timeout: Duration,
}

impl SocketIoClient {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            session: None,
            connect_timeout,
        }
    }

    /// Engine.IO session id of the current connection
    pub fn sid(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.sid.as_str())
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap() = state;
    }

    async fn open_session(&self, url: &str, path: &str) -> Result<Session, MessagingError> {
        let ws_url = websocket_url(url, path)?;
        debug!("Connecting to {ws_url}");

        let (ws_stream, _) = connect_async(ws_url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        let open = match next_packet(&mut read).await? {
            EnginePacket::Open(open) => open,
            other => {
                return Err(MessagingError::Handshake(format!(
                    "expected open packet, got {other:?}"
                )))
            }
        };
        debug!(
            "Engine.IO session {} opened (ping interval {}ms)",
            open.sid, open.ping_interval
        );

        write
            .send(Message::Text(SocketPacket::Connect(None).to_frame()))
            .await?;
        wait_for_namespace(&mut write, &mut read).await?;
        self.set_state(ConnectionState::Connected);

        let (outgoing, rx) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(write_loop(write, rx));
        let reader = tokio::spawn(read_loop(read, outgoing.clone(), self.state.clone(), open.clone()));

        Ok(Session {
            sid: open.sid,
            outgoing,
            writer,
            reader,
        })
    }
}

#[async_trait]
impl MessagingClient for SocketIoClient {
    fn name(&self) -> &'static str {
        "socketio"
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    async fn connect(&mut self, url: &str, path: &str) -> Result<(), MessagingError> {
        if self.session.is_some() {
            self.disconnect().await;
        }

        self.set_state(ConnectionState::Connecting);
        let result = tokio::time::timeout(self.connect_timeout, self.open_session(url, path))
            .await
            .unwrap_or(Err(MessagingError::Timeout(self.connect_timeout)));

        match result {
            Ok(session) => {
                info!("Connected to the Socket.IO server (sid {})", session.sid);
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn emit(&mut self, channel: &str, payload: &str) -> Result<(), MessagingError> {
        let session = match &self.session {
            Some(session) if self.state() == ConnectionState::Connected => session,
            _ => return Err(MessagingError::NotConnected),
        };

        let frame =
            SocketPacket::event(channel, vec![Value::String(payload.to_string())]).to_frame();
        session
            .outgoing
            .send(Message::Text(frame))
            .map_err(|_| MessagingError::NotConnected)
    }

    async fn disconnect(&mut self) {
        let Some(session) = self.session.take() else {
            self.set_state(ConnectionState::Disconnected);
            return;
        };

        // Both go through the writer so queued events are flushed first
        let _ = session
            .outgoing
            .send(Message::Text(SocketPacket::Disconnect.to_frame()));
        let _ = session.outgoing.send(Message::Close(None));
        drop(session.outgoing);

        if tokio::time::timeout(self.connect_timeout, session.writer)
            .await
            .is_err()
        {
            warn!("Timed out flushing Socket.IO messages before disconnect");
        }
        session.reader.abort();

        self.set_state(ConnectionState::Disconnected);
        info!("Disconnected from the Socket.IO server");
    }
}

/// Read the next Engine.IO packet, skipping non-text frames
async fn next_packet<S>(read: &mut S) -> Result<EnginePacket, MessagingError>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(message) = read.next().await {
        match message? {
            Message::Text(text) => return EnginePacket::decode(&text),
            Message::Close(frame) => {
                return Err(MessagingError::Handshake(format!(
                    "server closed the connection: {frame:?}"
                )))
            }
            _ => continue,
        }
    }
    Err(MessagingError::Handshake(
        "connection ended during handshake".to_string(),
    ))
}

async fn wait_for_namespace<W>(write: &mut W, read: &mut WsRead) -> Result<(), MessagingError>
where
    W: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    loop {
        match next_packet(read).await? {
            EnginePacket::Ping(data) => {
                write
                    .send(Message::Text(EnginePacket::Pong(data).encode()))
                    .await?
            }
            EnginePacket::Message(body) => match SocketPacket::decode(&body)? {
                SocketPacket::Connect(_) => return Ok(()),
                SocketPacket::ConnectError(data) => {
                    let reason = data
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| data.to_string());
                    return Err(MessagingError::Rejected(reason));
                }
                other => debug!("Ignoring packet before namespace connect: {other:?}"),
            },
            EnginePacket::Close => {
                return Err(MessagingError::Handshake(
                    "server closed the Engine.IO session".to_string(),
                ))
            }
            _ => {}
        }
    }
}

async fn write_loop<W>(mut write: W, mut rx: mpsc::UnboundedReceiver<Message>)
where
    W: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    while let Some(message) = rx.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = write.send(message).await {
            error!("Failed to send to Socket.IO server: {e:?}");
            break;
        }
        if closing {
            break;
        }
    }
}

async fn read_loop(
    mut read: WsRead,
    outgoing: mpsc::UnboundedSender<Message>,
    state: Arc<Mutex<ConnectionState>>,
    open: OpenPayload,
) {
    while let Some(message) = read.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("Socket.IO connection error: {e:?}");
                break;
            }
        };

        match EnginePacket::decode(&text) {
            Ok(EnginePacket::Ping(data)) => {
                if outgoing
                    .send(Message::Text(EnginePacket::Pong(data).encode()))
                    .is_err()
                {
                    break;
                }
            }
            Ok(EnginePacket::Close) => break,
            Ok(EnginePacket::Message(body)) => match SocketPacket::decode(&body) {
                Ok(SocketPacket::Disconnect) => {
                    info!("Socket.IO server closed session {}", open.sid);
                    break;
                }
                Ok(packet) => debug!("Ignoring Socket.IO packet: {packet:?}"),
                Err(e) => warn!("{e}"),
            },
            Ok(_) => {}
            Err(e) => warn!("{e}"),
        }
    }

    *state.lock().unwrap() = ConnectionState::Disconnected;
}
