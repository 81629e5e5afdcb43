//! Match Session
//!
//! The authoritative orchestrator for one hosted match. It owns the phase
//! machine and the ready set, sequences rounds into a match and resets
//! everything between matches.
//!
//! All mutation goes through `&mut self`; the session has no interior
//! mutability and no clock of its own. Hosts feed it participant requests and
//! a fixed `tick(dt)`, then drain the emitted events.

use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::core::clock::DeferredTimer;
use crate::core::ids::ParticipantId;
use crate::game::config::{ConfigError, DisconnectPolicy, MatchConfig, MIN_PARTICIPANTS_TO_START};
use crate::game::credit::AttackerCredit;
use crate::game::events::{GameEvent, GameEventData, PointsReason, RoundOutcome};
use crate::game::membership::MembershipRegistry;
use crate::game::round::{RoundController, RoundStep};
use crate::game::score::{ScoreBoard, ScoreError};
use crate::game::snapshot::{MatchSnapshot, ParticipantSnapshot};
use crate::game::state::{MatchPhase, MatchState};
use crate::game::world::{WorldError, WorldLoader};

// =============================================================================
// ERRORS
// =============================================================================

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Transition not allowed by the phase machine.
    #[error("illegal phase transition {from} -> {to}")]
    IllegalTransition {
        /// Phase at the time of the request.
        from: MatchPhase,
        /// Requested phase.
        to: MatchPhase,
    },

    /// Environment loader failed; the match was torn down.
    #[error("environment failure: {0}")]
    Environment(#[from] WorldError),

    /// Rejected configuration.
    #[error("invalid match config: {0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// TICK RESULT
// =============================================================================

/// Result of a session tick.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickResult {
    /// Phases entered this tick, in order
    pub phase_changes: Vec<MatchPhase>,
    /// Round that ended this tick
    pub round_ended: Option<RoundOutcome>,
    /// Whether the match ended this tick
    pub match_ended: bool,
}

// =============================================================================
// MATCH SESSION
// =============================================================================

/// Authoritative match orchestrator.
pub struct MatchSession<W: WorldLoader> {
    config: MatchConfig,
    state: MatchState,
    ready: BTreeSet<ParticipantId>,
    registry: MembershipRegistry,
    scoreboard: ScoreBoard,
    round: Option<RoundController>,
    results_timer: DeferredTimer,
    credit: AttackerCredit,
    /// Match clock, advanced only by `tick`
    elapsed: Duration,
    revision: u64,
    next_seq: u64,
    pending_events: Vec<GameEvent>,
    last_outcome: Option<RoundOutcome>,
    world: W,
}

impl<W: WorldLoader> MatchSession<W> {
    /// Create a session sitting in Lobby.
    pub fn new(config: MatchConfig, world: W) -> Result<Self, SessionError> {
        config.validate()?;

        Ok(Self {
            state: MatchState::new(config.rounds_per_match, config.results_duration),
            credit: AttackerCredit::new(config.attacker_credit_window),
            config,
            ready: BTreeSet::new(),
            registry: MembershipRegistry::new(),
            scoreboard: ScoreBoard::new(),
            round: None,
            results_timer: DeferredTimer::new(),
            elapsed: Duration::ZERO,
            revision: 0,
            next_seq: 0,
            pending_events: Vec::new(),
            last_outcome: None,
            world,
        })
    }

    // -------------------------------------------------------------------------
    // Membership
    // -------------------------------------------------------------------------

    /// Participant connected.
    pub fn on_connect(&mut self, id: ParticipantId) {
        if self.registry.connect(id).is_none() {
            debug!(participant = %id, "Duplicate connect ignored");
            return;
        }

        self.scoreboard.ensure_entry(id);
        info!(participant = %id, connected = self.registry.count(), "Participant connected");
        self.emit(GameEventData::ParticipantConnected { participant: id });
    }

    /// Participant disconnected.
    ///
    /// Removes the id from the ready set. Start is not re-evaluated here;
    /// only a ready change can start a match. Under `DisconnectPolicy::Eliminate`
    /// the participant is also eliminated from a running round.
    pub fn on_disconnect(&mut self, id: ParticipantId) -> Result<(), SessionError> {
        if self.registry.disconnect(id).is_none() {
            debug!(participant = %id, "Disconnect for unknown participant ignored");
            return Ok(());
        }

        self.ready.remove(&id);
        info!(participant = %id, connected = self.registry.count(), "Participant disconnected");
        self.emit(GameEventData::ParticipantDisconnected { participant: id });

        if self.config.disconnect_policy == DisconnectPolicy::Eliminate && self.round.is_some() {
            self.notify_eliminated(id)?;
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Lobby
    // -------------------------------------------------------------------------

    /// Toggle readiness and evaluate the start condition.
    ///
    /// No-op outside Lobby or for participants that are not connected.
    pub fn set_ready(&mut self, id: ParticipantId, ready: bool) -> Result<(), SessionError> {
        if self.state.phase != MatchPhase::Lobby {
            debug!(participant = %id, phase = %self.state.phase, "Ready change outside lobby ignored");
            return Ok(());
        }
        if !self.registry.is_connected(&id) {
            debug!(participant = %id, "Ready change from unknown participant ignored");
            return Ok(());
        }

        let changed = if ready {
            self.ready.insert(id)
        } else {
            self.ready.remove(&id)
        };
        if changed {
            debug!(participant = %id, ready, "Ready changed");
            self.emit(GameEventData::ReadyChanged { participant: id, ready });
        }

        if self.can_start() {
            self.start_match()?;
        }
        Ok(())
    }

    /// At least the minimum connected and every connected participant ready.
    fn can_start(&self) -> bool {
        self.registry.count() >= MIN_PARTICIPANTS_TO_START
            && self.ready == *self.registry.connected_ids()
    }

    fn start_match(&mut self) -> Result<(), SessionError> {
        self.state.current_round_index = 0;
        self.last_outcome = None;
        self.ready.clear();
        self.scoreboard.reset_for_match(self.registry.connected_ids());

        let participants: Vec<ParticipantId> = self.registry.connected_ids().iter().copied().collect();
        info!(participants = participants.len(), rounds = self.state.rounds_per_match, "Match starting");
        self.emit(GameEventData::MatchStarted { participants });

        self.load_round()
    }

    // -------------------------------------------------------------------------
    // Rounds
    // -------------------------------------------------------------------------

    fn load_round(&mut self) -> Result<(), SessionError> {
        self.set_phase(MatchPhase::LoadingRound)?;

        if let Err(e) = self.world.load_environment(&self.config.round_environment) {
            error!(
                environment = %self.config.round_environment,
                error = %e,
                "Round environment failed to load"
            );
            self.abort_match(format!("round environment failed: {}", e));
            return Err(e.into());
        }

        let round = RoundController::start(
            self.state.current_round_index,
            &self.config,
            self.registry.connected_ids(),
            &mut self.scoreboard,
        );
        self.credit.clear();

        let alive: Vec<ParticipantId> = round.alive().iter().copied().collect();
        self.emit(GameEventData::RoundStarted {
            round_index: self.state.current_round_index,
            alive,
        });
        self.round = Some(round);
        Ok(())
    }

    /// Elimination signal from the world.
    ///
    /// Applied synchronously: if it leaves one participant alive during play,
    /// the round ends before this call returns. Ignored with no active round.
    pub fn notify_eliminated(&mut self, id: ParticipantId) -> Result<(), SessionError> {
        let phase = self.state.phase;
        let Some(round) = self.round.as_mut() else {
            debug!(participant = %id, phase = %phase, "Elimination with no active round ignored");
            return Ok(());
        };

        let elimination = round.notify_eliminated(id, phase, &mut self.scoreboard);
        if !elimination.removed {
            debug!(participant = %id, "Elimination for participant not alive ignored");
            return Ok(());
        }

        let credited_to = self.apply_ring_out_credit(id);
        info!(participant = %id, remaining = elimination.remaining_alive, "Participant eliminated");
        self.emit(GameEventData::ParticipantEliminated {
            participant: id,
            credited_to,
            remaining_alive: elimination.remaining_alive,
        });

        if let Some(outcome) = elimination.outcome {
            self.finish_round(outcome)?;
        }
        Ok(())
    }

    /// Record a hit for ring-out credit. Only counted while playing.
    pub fn record_hit(&mut self, victim: ParticipantId, attacker: ParticipantId) {
        if self.state.phase != MatchPhase::Playing {
            debug!(victim = %victim, attacker = %attacker, "Hit outside play ignored");
            return;
        }
        self.credit.record_hit(victim, attacker, self.elapsed);
    }

    fn apply_ring_out_credit(&mut self, victim: ParticipantId) -> Option<ParticipantId> {
        let attacker = self.credit.take_valid(&victim, self.elapsed)?;
        let points = self.config.ring_out_credit_points;
        if points == 0 {
            return None;
        }

        match self.award(attacker, points, PointsReason::RingOutCredit) {
            Ok(()) => Some(attacker),
            Err(e) => {
                warn!(attacker = %attacker, error = %e, "Ring-out credit rejected");
                None
            }
        }
    }

    /// End the running round from outside, without a winner.
    ///
    /// Only honoured while playing.
    pub fn notify_round_ended(&mut self) -> Result<(), SessionError> {
        if self.state.phase != MatchPhase::Playing {
            debug!(phase = %self.state.phase, "Round end outside play ignored");
            return Ok(());
        }
        let Some(round) = self.round.as_mut() else {
            return Ok(());
        };

        let outcome = round.end_external();
        self.finish_round(outcome)
    }

    fn finish_round(&mut self, outcome: RoundOutcome) -> Result<(), SessionError> {
        if let (Some(winner), true) = (outcome.winner, outcome.bonus_awarded > 0) {
            self.emit(GameEventData::PointsAwarded {
                participant: winner,
                amount: outcome.bonus_awarded,
                reason: PointsReason::RoundWin,
            });
        }

        self.round = None;
        self.last_outcome = Some(outcome);
        self.emit(GameEventData::RoundEnded { outcome });

        self.set_phase(MatchPhase::Results)?;
        self.results_timer.schedule(self.state.results_duration);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Scoring
    // -------------------------------------------------------------------------

    /// Credit points from a scoring contributor.
    pub fn add_points(&mut self, id: ParticipantId, amount: i64) -> Result<(), ScoreError> {
        self.award(id, amount, PointsReason::Contribution)
    }

    fn award(&mut self, id: ParticipantId, amount: i64, reason: PointsReason) -> Result<(), ScoreError> {
        self.scoreboard.add_points(id, amount)?;
        self.emit(GameEventData::PointsAwarded { participant: id, amount, reason });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Advance the session by `dt`.
    ///
    /// Fires the results timer first, then runs the round controller until it
    /// has nothing more to apply. LoadingRound, Countdown and Playing can all
    /// be entered within one tick.
    pub fn tick(&mut self, dt: Duration) -> Result<TickResult, SessionError> {
        self.elapsed = self.elapsed.saturating_add(dt);
        let mut result = TickResult::default();

        if self.results_timer.advance(dt) {
            if self.state.phase == MatchPhase::Results {
                self.advance_or_end_match(&mut result)?;
            } else {
                debug!(phase = %self.state.phase, "Stale results timer ignored");
            }
        }

        self.step_round(dt, &mut result)?;
        Ok(result)
    }

    fn step_round(&mut self, dt: Duration, result: &mut TickResult) -> Result<(), SessionError> {
        let mut dt = dt;
        loop {
            let phase = self.state.phase;
            let Some(round) = self.round.as_mut() else {
                return Ok(());
            };

            match round.tick(phase, dt, &mut self.scoreboard) {
                RoundStep::Idle => return Ok(()),
                RoundStep::Advance(next) => {
                    self.set_phase(next)?;
                    result.phase_changes.push(next);
                }
                RoundStep::Ended(outcome) => {
                    self.finish_round(outcome)?;
                    result.phase_changes.push(MatchPhase::Results);
                    result.round_ended = Some(outcome);
                    return Ok(());
                }
            }

            // Time was spent by the first step
            dt = Duration::ZERO;
        }
    }

    fn advance_or_end_match(&mut self, result: &mut TickResult) -> Result<(), SessionError> {
        self.state.current_round_index += 1;

        if !self.state.is_last_round_done() {
            self.load_round()?;
            result.phase_changes.push(MatchPhase::LoadingRound);
            return Ok(());
        }

        self.set_phase(MatchPhase::MatchOver)?;
        result.phase_changes.push(MatchPhase::MatchOver);
        result.match_ended = true;

        let standings = self.scoreboard.standings();
        info!(
            rounds = self.state.current_round_index,
            leader = ?standings.first().map(|(id, _)| *id),
            "Match ended"
        );
        self.emit(GameEventData::MatchEnded {
            rounds_played: self.state.current_round_index,
            standings,
        });

        if let Err(e) = self.world.unload_environment(&self.config.round_environment) {
            warn!(environment = %self.config.round_environment, error = %e, "Round environment unload failed");
        }
        let lobby = self.world.load_environment(&self.config.lobby_environment);

        self.set_phase(MatchPhase::Lobby)?;
        result.phase_changes.push(MatchPhase::Lobby);
        self.ready.clear();
        self.state.current_round_index = 0;

        if let Err(e) = lobby {
            error!(environment = %self.config.lobby_environment, error = %e, "Lobby environment failed to load");
            return Err(e.into());
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Phase machine
    // -------------------------------------------------------------------------

    fn set_phase(&mut self, next: MatchPhase) -> Result<(), SessionError> {
        let from = self.state.phase;
        if !from.can_advance_to(next) {
            return Err(SessionError::IllegalTransition { from, to: next });
        }

        self.state.phase = next;
        info!(from = %from, to = %next, round = self.state.current_round_index, "Phase changed");
        self.emit(GameEventData::PhaseChanged { from, to: next });
        Ok(())
    }

    /// Tear the match down and return to Lobby from any phase.
    ///
    /// Cancels the results timer and retires the round. Scores are kept so
    /// the aborted match stays inspectable until the next one starts.
    pub fn abort_match(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        let from = self.state.phase;

        self.results_timer.cancel();
        self.round = None;
        self.credit.clear();
        self.ready.clear();
        self.state.phase = MatchPhase::Lobby;
        self.state.current_round_index = 0;

        warn!(from = %from, reason = %reason, "Match aborted");
        if from != MatchPhase::Lobby {
            self.emit(GameEventData::PhaseChanged { from, to: MatchPhase::Lobby });
        }
        self.emit(GameEventData::MatchAborted { reason });
    }

    // -------------------------------------------------------------------------
    // Events & queries
    // -------------------------------------------------------------------------

    fn emit(&mut self, data: GameEventData) {
        let at_ms = u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX);
        self.pending_events.push(GameEvent::new(self.next_seq, at_ms, data));
        self.next_seq += 1;
        self.revision += 1;
    }

    /// Drain events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Build a read-only snapshot.
    pub fn snapshot(&self) -> MatchSnapshot {
        let ids: BTreeSet<ParticipantId> = self.scoreboard.iter()
            .map(|(id, _)| *id)
            .chain(self.registry.connected_ids().iter().copied())
            .collect();

        let participants = ids.into_iter()
            .map(|id| {
                let entry = self.scoreboard.get(&id).copied().unwrap_or_default();
                ParticipantSnapshot {
                    id,
                    connected: self.registry.is_connected(&id),
                    ready: self.ready.contains(&id),
                    alive: self.round.as_ref().map(|r| r.is_alive(&id)),
                    match_points: entry.match_points,
                    round_points: entry.round_points,
                }
            })
            .collect();

        MatchSnapshot {
            revision: self.revision,
            phase: self.state.phase,
            current_round_index: self.state.current_round_index,
            rounds_per_match: self.state.rounds_per_match,
            round_time_remaining_secs: self.round.as_ref().map(|r| r.timer().remaining_secs_f32()),
            countdown_remaining_secs: self.round.as_ref()
                .filter(|_| self.state.phase == MatchPhase::Countdown)
                .map(|r| r.countdown_remaining().as_secs_f32()),
            participants,
            last_round: self.last_outcome,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> MatchPhase {
        self.state.phase
    }

    /// Current 0-based round index.
    pub fn current_round_index(&self) -> u32 {
        self.state.current_round_index
    }

    /// Match state record.
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Participants marked ready.
    pub fn ready_set(&self) -> &BTreeSet<ParticipantId> {
        &self.ready
    }

    /// Running round, if any.
    pub fn round(&self) -> Option<&RoundController> {
        self.round.as_ref()
    }

    /// Scoreboard.
    pub fn scoreboard(&self) -> &ScoreBoard {
        &self.scoreboard
    }

    /// Connectivity registry.
    pub fn membership(&self) -> &MembershipRegistry {
        &self.registry
    }

    /// Rules in force.
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Environment loader.
    pub fn world(&self) -> &W {
        &self.world
    }

    /// Match clock.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Revision, bumped with every emitted event.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Is the results pause waiting to fire?
    pub fn results_pending(&self) -> bool {
        self.results_timer.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::RoundEndReason;
    use crate::game::world::{HeadlessWorld, WorldCall};

    const TICK: Duration = Duration::from_millis(16);

    fn pid(n: u64) -> ParticipantId {
        ParticipantId::new(n)
    }

    fn test_config() -> MatchConfig {
        MatchConfig {
            rounds_per_match: 3,
            results_duration: Duration::from_secs(2),
            round_duration: Duration::from_secs(10),
            countdown_duration: Duration::ZERO,
            round_win_bonus: 100,
            ..Default::default()
        }
    }

    fn session(config: MatchConfig) -> MatchSession<HeadlessWorld> {
        MatchSession::new(config, HeadlessWorld::new()).unwrap()
    }

    fn connect_all(session: &mut MatchSession<HeadlessWorld>, ids: &[u64]) {
        for n in ids {
            session.on_connect(pid(*n));
        }
    }

    fn start_playing(session: &mut MatchSession<HeadlessWorld>, ids: &[u64]) {
        connect_all(session, ids);
        for n in ids {
            session.set_ready(pid(*n), true).unwrap();
        }
        session.tick(TICK).unwrap();
        assert_eq!(session.phase(), MatchPhase::Playing);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = MatchConfig { rounds_per_match: 0, ..test_config() };
        let result = MatchSession::new(config, HeadlessWorld::new());
        assert!(matches!(result, Err(SessionError::Config(ConfigError::NoRounds))));
    }

    #[test]
    fn test_scenario_all_ready_reaches_playing() {
        let mut session = session(test_config());
        connect_all(&mut session, &[1, 2, 3]);

        session.set_ready(pid(1), true).unwrap();
        session.set_ready(pid(2), true).unwrap();
        assert_eq!(session.phase(), MatchPhase::Lobby);

        session.set_ready(pid(3), true).unwrap();
        assert_eq!(session.phase(), MatchPhase::LoadingRound);
        assert_eq!(session.current_round_index(), 0);
        assert!(session.world().is_loaded("BeachRound"));

        let result = session.tick(TICK).unwrap();
        assert_eq!(result.phase_changes, vec![MatchPhase::Countdown, MatchPhase::Playing]);
        assert_eq!(session.phase(), MatchPhase::Playing);
        assert_eq!(session.current_round_index(), 0);
        assert_eq!(session.round().map(|r| r.alive_count()), Some(3));
    }

    #[test]
    fn test_single_ready_participant_never_starts() {
        let mut session = session(test_config());
        session.on_connect(pid(1));
        session.set_ready(pid(1), true).unwrap();
        session.set_ready(pid(1), true).unwrap();

        assert_eq!(session.phase(), MatchPhase::Lobby);
        assert!(session.world().history().is_empty());
    }

    #[test]
    fn test_start_needs_every_connected_ready() {
        let mut session = session(test_config());
        connect_all(&mut session, &[1, 2, 3]);
        session.set_ready(pid(1), true).unwrap();
        session.set_ready(pid(2), true).unwrap();
        session.set_ready(pid(2), false).unwrap();
        session.set_ready(pid(3), true).unwrap();

        assert_eq!(session.phase(), MatchPhase::Lobby);
        assert_eq!(session.ready_set().len(), 2);
    }

    #[test]
    fn test_disconnect_removes_ready_and_blocks_start() {
        let mut session = session(test_config());
        connect_all(&mut session, &[1, 2]);
        session.set_ready(pid(1), true).unwrap();
        session.on_disconnect(pid(1)).unwrap();

        assert!(!session.ready_set().contains(&pid(1)));

        session.set_ready(pid(2), true).unwrap();
        assert_eq!(session.phase(), MatchPhase::Lobby);
    }

    #[test]
    fn test_disconnect_does_not_start_pending_match() {
        let mut session = session(test_config());
        connect_all(&mut session, &[1, 2, 3]);
        session.set_ready(pid(1), true).unwrap();
        session.set_ready(pid(2), true).unwrap();

        // Ready set now equals connected, but start is only evaluated on ready changes
        session.on_disconnect(pid(3)).unwrap();
        assert_eq!(session.phase(), MatchPhase::Lobby);

        session.set_ready(pid(2), true).unwrap();
        assert_eq!(session.phase(), MatchPhase::LoadingRound);
    }

    #[test]
    fn test_ready_ignored_outside_lobby_and_for_strangers() {
        let mut session = session(test_config());
        session.set_ready(pid(9), true).unwrap();
        assert!(session.ready_set().is_empty());

        start_playing(&mut session, &[1, 2]);
        let before = session.ready_set().clone();
        session.set_ready(pid(1), false).unwrap();
        assert_eq!(session.ready_set(), &before);
        assert_eq!(session.phase(), MatchPhase::Playing);
    }

    #[test]
    fn test_scenario_two_eliminations_end_round_immediately() {
        let mut session = session(test_config());
        start_playing(&mut session, &[1, 2, 3]);

        session.notify_eliminated(pid(1)).unwrap();
        assert_eq!(session.phase(), MatchPhase::Playing);

        session.notify_eliminated(pid(3)).unwrap();
        assert_eq!(session.phase(), MatchPhase::Results);
        assert!(session.round().is_none());
        assert!(session.results_pending());

        let outcome = session.snapshot().last_round.unwrap();
        assert_eq!(outcome.winner, Some(pid(2)));
        assert_eq!(outcome.reason, RoundEndReason::LastStanding);
        assert_eq!(session.scoreboard().match_points(&pid(2)), 100);
    }

    #[test]
    fn test_elimination_is_idempotent_and_ignored_without_round() {
        let mut session = session(test_config());
        session.on_connect(pid(1));
        session.notify_eliminated(pid(1)).unwrap();
        assert!(session.take_events().iter().all(|e| !matches!(
            e.data,
            GameEventData::ParticipantEliminated { .. }
        )));

        start_playing(&mut session, &[1, 2, 3]);
        session.take_events();
        session.notify_eliminated(pid(1)).unwrap();
        assert_eq!(session.take_events().len(), 1);
        session.notify_eliminated(pid(1)).unwrap();
        assert!(session.take_events().is_empty());
        assert_eq!(session.round().map(|r| r.alive_count()), Some(2));
    }

    #[test]
    fn test_timeout_awards_highest_round_scorer() {
        let mut session = session(test_config());
        start_playing(&mut session, &[1, 2, 3]);
        session.add_points(pid(1), 4).unwrap();
        session.add_points(pid(3), 7).unwrap();

        let mut ended = None;
        for _ in 0..700 {
            let result = session.tick(TICK).unwrap();
            if let Some(outcome) = result.round_ended {
                ended = Some(outcome);
                break;
            }
        }

        let outcome = ended.expect("round should time out");
        assert_eq!(outcome.winner, Some(pid(3)));
        assert_eq!(outcome.reason, RoundEndReason::Timeout);
        assert_eq!(session.scoreboard().match_points(&pid(3)), 107);
        assert_eq!(session.phase(), MatchPhase::Results);
    }

    #[test]
    fn test_negative_points_rejected() {
        let mut session = session(test_config());
        session.on_connect(pid(1));
        assert!(session.add_points(pid(1), -5).is_err());
        assert_eq!(session.scoreboard().match_points(&pid(1)), 0);
    }

    #[test]
    fn test_results_wait_for_duration() {
        let mut session = session(test_config());
        start_playing(&mut session, &[1, 2]);
        session.notify_eliminated(pid(1)).unwrap();

        session.tick(Duration::from_millis(1500)).unwrap();
        assert_eq!(session.phase(), MatchPhase::Results);
        assert_eq!(session.current_round_index(), 0);

        session.tick(Duration::from_millis(500)).unwrap();
        assert_eq!(session.phase(), MatchPhase::Playing);
        assert_eq!(session.current_round_index(), 1);
    }

    #[test]
    fn test_scenario_full_match_returns_to_lobby() {
        let config = test_config();
        let results = config.results_duration;
        let mut session = session(config);
        start_playing(&mut session, &[1, 2, 3]);

        for round in 0..3 {
            assert_eq!(session.phase(), MatchPhase::Playing);
            assert_eq!(session.current_round_index(), round);
            assert!(session.current_round_index() < session.state().rounds_per_match);

            session.notify_eliminated(pid(2)).unwrap();
            session.notify_eliminated(pid(3)).unwrap();
            assert_eq!(session.phase(), MatchPhase::Results);

            let result = session.tick(results).unwrap();
            assert_eq!(result.match_ended, round == 2);
        }

        assert_eq!(session.phase(), MatchPhase::Lobby);
        assert_eq!(session.current_round_index(), 0);
        assert!(session.ready_set().is_empty());
        assert_eq!(session.scoreboard().match_points(&pid(1)), 300);

        let history = session.world().history();
        assert_eq!(
            &history[history.len() - 2..],
            &[WorldCall::Unload("BeachRound".into()), WorldCall::Load("HubLobby".into())]
        );

        let events = session.take_events();
        let ended = events.iter().find_map(|e| match &e.data {
            GameEventData::MatchEnded { rounds_played, standings } => Some((*rounds_played, standings.clone())),
            _ => None,
        });
        let (rounds_played, standings) = ended.expect("match end event");
        assert_eq!(rounds_played, 3);
        assert_eq!(standings[0], (pid(1), 300));
    }

    #[test]
    fn test_phase_sequence_is_legal() {
        let mut session = session(test_config());
        start_playing(&mut session, &[1, 2]);
        for _ in 0..3 {
            session.notify_eliminated(pid(2)).unwrap();
            session.tick(Duration::from_secs(2)).unwrap();
        }

        let mut phase = MatchPhase::Lobby;
        for event in session.take_events() {
            if let GameEventData::PhaseChanged { from, to } = event.data {
                assert_eq!(from, phase);
                assert!(from.can_advance_to(to), "{} -> {}", from, to);
                phase = to;
            }
        }
        assert_eq!(phase, MatchPhase::Lobby);
    }

    #[test]
    fn test_next_match_resets_scores() {
        let config = MatchConfig { rounds_per_match: 1, ..test_config() };
        let mut session = session(config);
        start_playing(&mut session, &[1, 2]);
        session.notify_eliminated(pid(2)).unwrap();
        session.tick(Duration::from_secs(2)).unwrap();
        assert_eq!(session.phase(), MatchPhase::Lobby);

        // Standings stay readable in Lobby
        assert_eq!(session.scoreboard().match_points(&pid(1)), 100);

        session.set_ready(pid(1), true).unwrap();
        session.set_ready(pid(2), true).unwrap();
        assert_eq!(session.phase(), MatchPhase::LoadingRound);
        assert_eq!(session.scoreboard().match_points(&pid(1)), 0);
        assert!(session.snapshot().last_round.is_none());
    }

    #[test]
    fn test_countdown_delays_play() {
        let config = MatchConfig { countdown_duration: Duration::from_secs(3), ..test_config() };
        let mut session = session(config);
        connect_all(&mut session, &[1, 2]);
        session.set_ready(pid(1), true).unwrap();
        session.set_ready(pid(2), true).unwrap();

        session.tick(TICK).unwrap();
        assert_eq!(session.phase(), MatchPhase::Countdown);

        assert_eq!(session.snapshot().countdown_remaining_secs, Some(3.0));

        session.tick(Duration::from_secs(2)).unwrap();
        assert_eq!(session.phase(), MatchPhase::Countdown);
        assert_eq!(session.snapshot().countdown_remaining_secs, Some(1.0));

        // Eliminations during countdown shrink the alive set but do not end the round
        session.notify_eliminated(pid(1)).unwrap();
        assert_eq!(session.phase(), MatchPhase::Countdown);

        let result = session.tick(Duration::from_secs(1)).unwrap();
        assert_eq!(result.phase_changes, vec![MatchPhase::Playing, MatchPhase::Results]);
        assert_eq!(result.round_ended.and_then(|o| o.winner), Some(pid(2)));
        assert!(session.snapshot().countdown_remaining_secs.is_none());
    }

    #[test]
    fn test_ready_set_cleared_when_match_starts() {
        let mut session = session(test_config());
        start_playing(&mut session, &[1, 2]);

        assert!(session.ready_set().is_empty());
        let snapshot = session.snapshot();
        assert!(snapshot.participants.iter().all(|p| !p.ready));
        assert!(snapshot.countdown_remaining_secs.is_none());
    }

    #[test]
    fn test_keep_alive_policy_keeps_disconnected_alive() {
        let mut session = session(test_config());
        start_playing(&mut session, &[1, 2]);
        session.on_disconnect(pid(2)).unwrap();

        assert_eq!(session.phase(), MatchPhase::Playing);
        assert_eq!(session.round().map(|r| r.is_alive(&pid(2))), Some(true));
        let snapshot = session.snapshot();
        let entry = snapshot.participant(pid(2)).unwrap();
        assert!(!entry.connected);
        assert_eq!(entry.alive, Some(true));
    }

    #[test]
    fn test_eliminate_policy_ends_round_on_disconnect() {
        let config = MatchConfig { disconnect_policy: DisconnectPolicy::Eliminate, ..test_config() };
        let mut session = session(config);
        start_playing(&mut session, &[1, 2]);
        session.on_disconnect(pid(2)).unwrap();

        assert_eq!(session.phase(), MatchPhase::Results);
        assert_eq!(session.snapshot().last_round.and_then(|o| o.winner), Some(pid(1)));
    }

    #[test]
    fn test_ring_out_credit() {
        let mut session = session(test_config());
        start_playing(&mut session, &[1, 2, 3]);

        session.record_hit(pid(2), pid(1));
        session.tick(Duration::from_secs(1)).unwrap();
        session.notify_eliminated(pid(2)).unwrap();

        assert_eq!(session.scoreboard().round_points(&pid(1)), 10);
        let credited = session.take_events().into_iter().find_map(|e| match e.data {
            GameEventData::ParticipantEliminated { credited_to, .. } => Some(credited_to),
            _ => None,
        });
        assert_eq!(credited, Some(Some(pid(1))));
    }

    #[test]
    fn test_ring_out_credit_expires() {
        let mut session = session(test_config());
        start_playing(&mut session, &[1, 2, 3]);

        session.record_hit(pid(2), pid(1));
        session.tick(Duration::from_secs(6)).unwrap();
        session.notify_eliminated(pid(2)).unwrap();

        assert_eq!(session.scoreboard().round_points(&pid(1)), 0);
    }

    #[test]
    fn test_external_round_end() {
        let mut session = session(test_config());
        session.notify_round_ended().unwrap();
        assert_eq!(session.phase(), MatchPhase::Lobby);

        start_playing(&mut session, &[1, 2]);
        session.notify_round_ended().unwrap();
        assert_eq!(session.phase(), MatchPhase::Results);
        let outcome = session.snapshot().last_round.unwrap();
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.reason, RoundEndReason::External);
    }

    #[test]
    fn test_environment_failure_aborts_to_lobby() {
        let world = HeadlessWorld::new().with_missing("BeachRound");
        let mut session = MatchSession::new(test_config(), world).unwrap();
        session.on_connect(pid(1));
        session.on_connect(pid(2));
        session.set_ready(pid(1), true).unwrap();

        let err = session.set_ready(pid(2), true).unwrap_err();
        assert_eq!(err, SessionError::Environment(WorldError::NotFound("BeachRound".into())));
        assert_eq!(session.phase(), MatchPhase::Lobby);
        assert!(session.ready_set().is_empty());
        assert!(session.round().is_none());
        assert!(session.take_events().iter().any(|e| matches!(e.data, GameEventData::MatchAborted { .. })));
    }

    #[test]
    fn test_abort_cancels_results_timer() {
        let mut session = session(test_config());
        start_playing(&mut session, &[1, 2]);
        session.notify_eliminated(pid(1)).unwrap();
        assert!(session.results_pending());

        session.abort_match("host shutdown");
        assert!(!session.results_pending());
        session.tick(Duration::from_secs(5)).unwrap();
        assert_eq!(session.phase(), MatchPhase::Lobby);
        assert_eq!(session.current_round_index(), 0);
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut session = session(test_config());
        let err = session.set_phase(MatchPhase::Playing).unwrap_err();
        assert_eq!(err, SessionError::IllegalTransition {
            from: MatchPhase::Lobby,
            to: MatchPhase::Playing,
        });
        assert_eq!(session.phase(), MatchPhase::Lobby);
    }

    #[test]
    fn test_late_joiner_not_alive_but_scored() {
        let mut session = session(test_config());
        start_playing(&mut session, &[1, 2]);
        session.on_connect(pid(5));

        assert_eq!(session.round().map(|r| r.is_alive(&pid(5))), Some(false));
        assert!(session.scoreboard().get(&pid(5)).is_some());
    }

    #[test]
    fn test_events_are_sequenced_and_bump_revision() {
        let mut session = session(test_config());
        let before = session.revision();
        start_playing(&mut session, &[1, 2]);

        let events = session.take_events();
        assert!(!events.is_empty());
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.seq, i as u64);
        }
        assert_eq!(session.revision(), before + events.len() as u64);
        assert!(session.take_events().is_empty());
    }
}
