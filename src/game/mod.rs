//! Game Logic Module
//!
//! Authoritative match orchestration. Synchronous and tick-driven; the only
//! side effects are calls into the injected `WorldLoader`.
//!
//! ## Module Structure
//!
//! - `score`: Per-participant point ledger
//! - `membership`: Connected participant registry
//! - `round`: Single-round lifecycle and winner selection
//! - `session`: Match phase machine sequencing rounds
//! - `state`: Phase enum and match state record
//! - `config`: Match rules
//! - `events`: Game events for observers
//! - `snapshot`: Read-only state view
//! - `world`: Environment loader contract
//! - `zone`: Scoring zones
//! - `credit`: Last-attacker credit

pub mod config;
pub mod credit;
pub mod events;
pub mod membership;
pub mod round;
pub mod score;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod world;
pub mod zone;

// Re-export key types
pub use config::{MatchConfig, DisconnectPolicy, ConfigError};
pub use events::{GameEvent, GameEventData, RoundOutcome, RoundEndReason};
pub use membership::MembershipRegistry;
pub use round::{RoundController, RoundStep};
pub use score::{ScoreBoard, ScoreEntry, ScoreError};
pub use session::{MatchSession, SessionError, TickResult};
pub use snapshot::{MatchSnapshot, ParticipantSnapshot};
pub use state::{MatchPhase, MatchState};
pub use world::{WorldLoader, WorldError, HeadlessWorld};
pub use zone::{ScoringZone, ZoneConfig, ZoneId};
