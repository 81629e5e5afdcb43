//! # Party Chaos Match Server
//!
//! Server-authoritative match and round orchestration for Party Chaos.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  PARTY CHAOS SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── ids.rs      - Participant and match identifiers         │
//! │  └── clock.rs    - Tick-driven round and deferred timers     │
//! │                                                              │
//! │  game/           - Match logic (synchronous, tick-driven)    │
//! │  ├── score.rs    - Round and match point ledger              │
//! │  ├── membership.rs - Connected participant registry          │
//! │  ├── round.rs    - Round lifecycle and winner selection      │
//! │  ├── session.rs  - Match phase machine                       │
//! │  ├── zone.rs     - Scoring zones                             │
//! │  ├── credit.rs   - Last-attacker ring-out credit             │
//! │  └── world.rs    - Environment loader contract               │
//! │                                                              │
//! │  network/        - Runtime edge (async)                      │
//! │  ├── host.rs     - Single-owner match actor                  │
//! │  ├── server.rs   - WebSocket server                          │
//! │  └── protocol.rs - Message types                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Single Writer
//!
//! A `MatchSession` is owned by exactly one `MatchHost`. Requests from
//! sockets and world collaborators are queued and applied on the host tick,
//! so phase, ready set, alive set and scores are never mutated concurrently.
//! Ordered collections (`BTreeMap`/`BTreeSet`) keep iteration, tie-breaks
//! and event order reproducible.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::ids::{ParticipantId, MatchId};
pub use game::config::MatchConfig;
pub use game::session::{MatchSession, SessionError};
pub use game::state::MatchPhase;
pub use network::host::{MatchHost, MatchHandle};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Host tick rate (Hz)
pub const TICK_RATE: u32 = 60;
