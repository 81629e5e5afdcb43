//! Match State Definitions
//!
//! The phase machine and the single mutable record that the session owns.

use std::fmt;
use std::time::Duration;
use serde::{Serialize, Deserialize};

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Current phase of the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum MatchPhase {
    /// Waiting for everyone to ready up
    #[default]
    Lobby,
    /// Round environment loading; consumed by the round controller
    LoadingRound,
    /// Pre-play grace period
    Countdown,
    /// Active round
    Playing,
    /// Timed pause showing the round outcome
    Results,
    /// Last round finished; folds straight back into Lobby
    MatchOver,
}

impl MatchPhase {
    /// Check whether `next` is a legal successor of this phase.
    pub fn can_advance_to(self, next: MatchPhase) -> bool {
        use MatchPhase::*;
        matches!(
            (self, next),
            (Lobby, LoadingRound)
                | (LoadingRound, Countdown)
                | (Countdown, Playing)
                | (Playing, Results)
                | (Results, LoadingRound)
                | (Results, MatchOver)
                | (MatchOver, Lobby)
        )
    }

    /// Phases during which a round controller exists.
    pub fn is_round_phase(self) -> bool {
        matches!(self, MatchPhase::LoadingRound | MatchPhase::Countdown | MatchPhase::Playing)
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchPhase::Lobby => "lobby",
            MatchPhase::LoadingRound => "loading_round",
            MatchPhase::Countdown => "countdown",
            MatchPhase::Playing => "playing",
            MatchPhase::Results => "results",
            MatchPhase::MatchOver => "match_over",
        };
        f.write_str(name)
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Phase, round index and the rule constants that shape them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchState {
    /// Current phase
    pub phase: MatchPhase,
    /// 0-based round index; only grows within a match
    pub current_round_index: u32,
    /// Rounds per match
    pub rounds_per_match: u32,
    /// Results pause length
    pub results_duration: Duration,
}

impl MatchState {
    /// Create a state sitting in Lobby.
    pub fn new(rounds_per_match: u32, results_duration: Duration) -> Self {
        Self {
            phase: MatchPhase::Lobby,
            current_round_index: 0,
            rounds_per_match,
            results_duration,
        }
    }

    /// Has the last round of the match been played?
    pub fn is_last_round_done(&self) -> bool {
        self.current_round_index >= self.rounds_per_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_machine_edges() {
        use MatchPhase::*;
        assert!(Lobby.can_advance_to(LoadingRound));
        assert!(LoadingRound.can_advance_to(Countdown));
        assert!(Countdown.can_advance_to(Playing));
        assert!(Playing.can_advance_to(Results));
        assert!(Results.can_advance_to(LoadingRound));
        assert!(Results.can_advance_to(MatchOver));
        assert!(MatchOver.can_advance_to(Lobby));

        assert!(!Lobby.can_advance_to(Playing));
        assert!(!Playing.can_advance_to(Lobby));
        assert!(!Countdown.can_advance_to(Results));
        assert!(!Results.can_advance_to(Playing));
        assert!(!Lobby.can_advance_to(Lobby));
    }

    #[test]
    fn test_round_phases() {
        assert!(MatchPhase::LoadingRound.is_round_phase());
        assert!(MatchPhase::Countdown.is_round_phase());
        assert!(MatchPhase::Playing.is_round_phase());
        assert!(!MatchPhase::Results.is_round_phase());
        assert!(!MatchPhase::Lobby.is_round_phase());
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&MatchPhase::LoadingRound).unwrap();
        assert_eq!(json, "\"loading_round\"");
        assert_eq!(MatchPhase::MatchOver.to_string(), "match_over");
    }

    #[test]
    fn test_last_round_done() {
        let mut state = MatchState::new(2, Duration::from_secs(1));
        assert!(!state.is_last_round_done());
        state.current_round_index = 2;
        assert!(state.is_last_round_done());
    }
}
