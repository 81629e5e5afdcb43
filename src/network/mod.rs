//! Network Layer
//!
//! The match host actor and the WebSocket edge in front of it.
//! This layer is **non-deterministic**: it owns real time and sockets, while
//! all match logic runs through `game/`.

pub mod host;
pub mod protocol;
pub mod server;

pub use host::{MatchHost, MatchHandle, MatchCommand, HostError};
pub use protocol::{ClientMessage, ServerMessage, ServerError, ErrorCode};
pub use server::{GameServer, ServerConfig, GameServerError};
