//! Game Events
//!
//! Events emitted by the session for logging and for observers.

use serde::{Serialize, Deserialize};

use crate::core::ids::ParticipantId;
use crate::game::state::MatchPhase;

/// Why a round ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    /// One (or zero) participants left alive
    LastStanding,
    /// Round timer ran out
    Timeout,
    /// Ended externally through `notify_round_ended`
    External,
}

/// Result of a finished round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Round index (0-based)
    pub round_index: u32,
    /// Round winner, if any
    pub winner: Option<ParticipantId>,
    /// End condition
    pub reason: RoundEndReason,
    /// Bonus actually credited to the winner
    pub bonus_awarded: i64,
}

/// Reason attached to a point award.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsReason {
    /// Scoring contributor (zones, pickups)
    Contribution,
    /// Round win bonus
    RoundWin,
    /// Last attacker of an eliminated participant
    RingOutCredit,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEventData {
    /// Match phase changed
    PhaseChanged {
        from: MatchPhase,
        to: MatchPhase,
    },

    /// Participant connected
    ParticipantConnected {
        participant: ParticipantId,
    },

    /// Participant disconnected
    ParticipantDisconnected {
        participant: ParticipantId,
    },

    /// Ready flag changed
    ReadyChanged {
        participant: ParticipantId,
        ready: bool,
    },

    /// Match started
    MatchStarted {
        participants: Vec<ParticipantId>,
    },

    /// Round controller created
    RoundStarted {
        round_index: u32,
        alive: Vec<ParticipantId>,
    },

    /// Participant removed from the alive set
    ParticipantEliminated {
        participant: ParticipantId,
        credited_to: Option<ParticipantId>,
        remaining_alive: usize,
    },

    /// Points were credited
    PointsAwarded {
        participant: ParticipantId,
        amount: i64,
        reason: PointsReason,
    },

    /// Round finished
    RoundEnded {
        outcome: RoundOutcome,
    },

    /// All rounds played
    MatchEnded {
        rounds_played: u32,
        standings: Vec<(ParticipantId, i64)>,
    },

    /// Match torn down before completion
    MatchAborted {
        reason: String,
    },
}

/// A game event stamped with match time and a sequence number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Emission order within the session
    pub seq: u64,

    /// Match clock at emission (milliseconds)
    pub at_ms: u64,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(seq: u64, at_ms: u64, data: GameEventData) -> Self {
        Self { seq, at_ms, data }
    }

    /// Participant the event is about, if any.
    pub fn participant(&self) -> Option<ParticipantId> {
        match &self.data {
            GameEventData::ParticipantConnected { participant }
            | GameEventData::ParticipantDisconnected { participant }
            | GameEventData::ReadyChanged { participant, .. }
            | GameEventData::ParticipantEliminated { participant, .. }
            | GameEventData::PointsAwarded { participant, .. } => Some(*participant),
            GameEventData::RoundEnded { outcome } => outcome.winner,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_participant() {
        let id = ParticipantId::new(4);
        let event = GameEvent::new(0, 0, GameEventData::ReadyChanged { participant: id, ready: true });
        assert_eq!(event.participant(), Some(id));

        let event = GameEvent::new(1, 0, GameEventData::PhaseChanged {
            from: MatchPhase::Lobby,
            to: MatchPhase::LoadingRound,
        });
        assert_eq!(event.participant(), None);

        let outcome = RoundOutcome {
            round_index: 0,
            winner: Some(id),
            reason: RoundEndReason::Timeout,
            bonus_awarded: 100,
        };
        let event = GameEvent::new(2, 0, GameEventData::RoundEnded { outcome });
        assert_eq!(event.participant(), Some(id));
    }

    #[test]
    fn test_event_json_shape() {
        let event = GameEvent::new(3, 1500, GameEventData::ParticipantEliminated {
            participant: ParticipantId::new(2),
            credited_to: None,
            remaining_alive: 1,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"participant_eliminated\""));
        assert!(json.contains("\"at_ms\":1500"));
    }
}
