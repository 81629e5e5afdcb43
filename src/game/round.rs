//! Round Controller
//!
//! Owns the timed lifecycle of one round: countdown, playing timer,
//! alive-set bookkeeping and winner selection. A controller is created when
//! a round loads and retired once it reports an outcome.
//!
//! The controller never touches the match phase directly. It returns a
//! `RoundStep` and the session applies the transition, so the phase machine
//! has a single writer.

use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::clock::RoundTimer;
use crate::core::ids::ParticipantId;
use crate::game::config::MatchConfig;
use crate::game::events::{RoundEndReason, RoundOutcome};
use crate::game::score::ScoreBoard;
use crate::game::state::MatchPhase;

/// What the session should do after a round tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundStep {
    /// Nothing to apply
    Idle,
    /// Move the match to this phase
    Advance(MatchPhase),
    /// Round is over
    Ended(RoundOutcome),
}

/// Result of an elimination notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Elimination {
    /// Was the participant alive before this call?
    pub removed: bool,
    /// Alive count after the call
    pub remaining_alive: usize,
    /// Set if this elimination ended the round
    pub outcome: Option<RoundOutcome>,
}

/// Lifecycle of a single round.
#[derive(Clone, Debug)]
pub struct RoundController {
    round_index: u32,
    timer: RoundTimer,
    countdown_remaining: Duration,
    alive: BTreeSet<ParticipantId>,
    round_win_bonus: i64,
    outcome: Option<RoundOutcome>,
}

impl RoundController {
    /// Start a round.
    ///
    /// Resets round points, fills the timer and snapshots the alive set from
    /// the participants connected right now.
    pub fn start(
        round_index: u32,
        config: &MatchConfig,
        connected: &BTreeSet<ParticipantId>,
        scoreboard: &mut ScoreBoard,
    ) -> Self {
        scoreboard.reset_round_points();

        debug!(round = round_index, alive = connected.len(), "Round controller started");

        Self {
            round_index,
            timer: RoundTimer::new(config.round_duration),
            countdown_remaining: config.countdown_duration,
            alive: connected.clone(),
            round_win_bonus: config.round_win_bonus,
            outcome: None,
        }
    }

    /// Run one tick against the current match phase.
    pub fn tick(&mut self, phase: MatchPhase, dt: Duration, scoreboard: &mut ScoreBoard) -> RoundStep {
        if self.outcome.is_some() {
            return RoundStep::Idle;
        }

        match phase {
            MatchPhase::LoadingRound => RoundStep::Advance(MatchPhase::Countdown),
            MatchPhase::Countdown => {
                self.countdown_remaining = self.countdown_remaining.saturating_sub(dt);
                if self.countdown_remaining.is_zero() {
                    RoundStep::Advance(MatchPhase::Playing)
                } else {
                    RoundStep::Idle
                }
            }
            MatchPhase::Playing => {
                self.timer.advance(dt);

                // Last alive ends instantly, regardless of the timer
                if self.alive.len() <= 1 {
                    return RoundStep::Ended(self.end_by_alive(scoreboard));
                }

                if self.timer.expired() {
                    return RoundStep::Ended(self.end_by_timeout(scoreboard));
                }

                RoundStep::Idle
            }
            _ => RoundStep::Idle,
        }
    }

    /// Remove a participant from the alive set.
    ///
    /// Idempotent. While playing, dropping to one (or zero) alive ends the
    /// round immediately rather than on the next tick.
    pub fn notify_eliminated(
        &mut self,
        id: ParticipantId,
        phase: MatchPhase,
        scoreboard: &mut ScoreBoard,
    ) -> Elimination {
        if self.outcome.is_some() {
            return Elimination {
                removed: false,
                remaining_alive: self.alive.len(),
                outcome: None,
            };
        }

        let removed = self.alive.remove(&id);
        let outcome = if removed && phase == MatchPhase::Playing && self.alive.len() <= 1 {
            Some(self.end_by_alive(scoreboard))
        } else {
            None
        };

        Elimination {
            removed,
            remaining_alive: self.alive.len(),
            outcome,
        }
    }

    /// End the round on request from outside, without a winner.
    pub fn end_external(&mut self) -> RoundOutcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        self.finish(None, RoundEndReason::External, None)
    }

    fn end_by_alive(&mut self, scoreboard: &mut ScoreBoard) -> RoundOutcome {
        let winner = if self.alive.len() == 1 {
            self.alive.iter().next().copied()
        } else {
            None
        };
        self.finish(winner, RoundEndReason::LastStanding, Some(scoreboard))
    }

    fn end_by_timeout(&mut self, scoreboard: &mut ScoreBoard) -> RoundOutcome {
        let alive = &self.alive;
        let winner = scoreboard.top_round_scorer(|id| alive.contains(id));
        self.finish(winner, RoundEndReason::Timeout, Some(scoreboard))
    }

    fn finish(
        &mut self,
        winner: Option<ParticipantId>,
        reason: RoundEndReason,
        scoreboard: Option<&mut ScoreBoard>,
    ) -> RoundOutcome {
        let mut bonus_awarded = 0;
        if let (Some(id), Some(board)) = (winner, scoreboard) {
            match board.award_round_win_bonus(id, self.round_win_bonus) {
                Ok(()) => bonus_awarded = self.round_win_bonus,
                Err(e) => warn!(participant = %id, error = %e, "Round win bonus rejected"),
            }
        }

        let outcome = RoundOutcome {
            round_index: self.round_index,
            winner,
            reason,
            bonus_awarded,
        };
        self.outcome = Some(outcome);

        match winner {
            Some(id) => info!(round = self.round_index, winner = %id, ?reason, "Round ended"),
            None => info!(round = self.round_index, ?reason, "Round ended without a winner"),
        }

        outcome
    }

    /// Round index (0-based).
    pub fn round_index(&self) -> u32 {
        self.round_index
    }

    /// Participants still alive.
    pub fn alive(&self) -> &BTreeSet<ParticipantId> {
        &self.alive
    }

    /// Number of participants still alive.
    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }

    /// Is this participant still alive?
    pub fn is_alive(&self, id: &ParticipantId) -> bool {
        self.alive.contains(id)
    }

    /// Round timer.
    pub fn timer(&self) -> &RoundTimer {
        &self.timer
    }

    /// Countdown time left before play starts.
    pub fn countdown_remaining(&self) -> Duration {
        self.countdown_remaining
    }

    /// Has the round ended?
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }
}
