//! Real-time messaging to the animation broker

pub mod error;
pub mod mock;
pub mod packet;
pub mod provider;
pub mod socketio;

pub use error::MessagingError;
pub use provider::{ConnectionState, MessagingClient};
pub use socketio::SocketIoClient;
