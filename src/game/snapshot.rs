//! Match Snapshot
//!
//! Read-only view of the authoritative state, pushed to observers whenever
//! the session revision changes or the round clock moves.

use serde::{Serialize, Deserialize};

use crate::core::ids::ParticipantId;
use crate::game::events::RoundOutcome;
use crate::game::state::MatchPhase;

/// Full match view for observers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Bumped on every authoritative change
    pub revision: u64,
    /// Current phase
    pub phase: MatchPhase,
    /// 0-based round index
    pub current_round_index: u32,
    /// Rounds per match
    pub rounds_per_match: u32,
    /// Round time left in seconds; negative once expired, None outside a round
    pub round_time_remaining_secs: Option<f32>,
    /// Countdown left in seconds, only while counting down
    pub countdown_remaining_secs: Option<f32>,
    /// Everyone known to the scoreboard or the registry, in id order
    pub participants: Vec<ParticipantSnapshot>,
    /// Most recent round outcome
    pub last_round: Option<RoundOutcome>,
}

/// Per-participant view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    /// Participant id
    pub id: ParticipantId,
    /// Currently connected
    pub connected: bool,
    /// In the ready set
    pub ready: bool,
    /// None while no round is running
    pub alive: Option<bool>,
    /// Match-cumulative points
    pub match_points: i64,
    /// Points in the current round
    pub round_points: i64,
}

impl MatchSnapshot {
    /// Look up one participant.
    pub fn participant(&self, id: ParticipantId) -> Option<&ParticipantSnapshot> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Number of participants currently connected.
    pub fn connected_count(&self) -> usize {
        self.participants.iter().filter(|p| p.connected).count()
    }
}
