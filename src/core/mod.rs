//! Core primitives.
//!
//! Identifiers and the tick-driven timers every game module builds on.
//! Nothing here reads the wall clock.

pub mod ids;
pub mod clock;

// Re-export core types
pub use ids::{ParticipantId, MatchId};
pub use clock::{RoundTimer, DeferredTimer, tick_duration};
