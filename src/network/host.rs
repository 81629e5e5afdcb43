//! Match Host
//!
//! Runs one `MatchSession` as a single-owner actor. Every request from the
//! edge server or from world collaborators is queued as a `MatchCommand` and
//! applied on the host's own tick, so the session is never touched from two
//! tasks at once.
//!
//! Tick order: drain queued commands, tick the session, tick scoring zones,
//! publish events and a snapshot if anything changed. While a round is
//! loading, counting down or playing, the round clock moves every tick, so a
//! snapshot goes out every tick.

use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::core::ids::{MatchId, ParticipantId};
use crate::game::config::MatchConfig;
use crate::game::session::{MatchSession, SessionError, TickResult};
use crate::game::snapshot::MatchSnapshot;
use crate::game::state::MatchPhase;
use crate::game::world::WorldLoader;
use crate::game::zone::{ScoringZone, ZoneConfig, ZoneId};
use crate::network::protocol::ServerMessage;

/// Command queue depth.
const COMMAND_BUFFER: usize = 256;

/// Update broadcast depth.
const UPDATE_BUFFER: usize = 256;

/// Host errors.
#[derive(Debug, Error)]
pub enum HostError {
    /// The host task has stopped and dropped its queue.
    #[error("match host is not running")]
    Closed,

    /// Session rejected a request.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

/// Request marshalled onto the host's tick.
#[derive(Debug)]
pub enum MatchCommand {
    /// Participant connected.
    Connect(ParticipantId),
    /// Participant disconnected.
    Disconnect(ParticipantId),
    /// Ready toggle from a participant.
    SetReady {
        /// Who.
        participant: ParticipantId,
        /// New ready flag.
        ready: bool,
    },
    /// Elimination signal from the world.
    Eliminate(ParticipantId),
    /// Hit report for ring-out credit.
    RecordHit {
        /// Participant that was hit.
        victim: ParticipantId,
        /// Participant that hit.
        attacker: ParticipantId,
    },
    /// Points from a scoring contributor.
    AddPoints {
        /// Who.
        participant: ParticipantId,
        /// Non-negative amount.
        amount: i64,
    },
    /// End the running round without a winner.
    EndRound,
    /// Participant entered a scoring zone.
    EnterZone {
        /// Zone.
        zone: ZoneId,
        /// Who.
        participant: ParticipantId,
    },
    /// Participant left a scoring zone.
    ExitZone {
        /// Zone.
        zone: ZoneId,
        /// Who.
        participant: ParticipantId,
    },
    /// Read-only snapshot query.
    Snapshot(oneshot::Sender<MatchSnapshot>),
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable handle to a running host.
#[derive(Clone, Debug)]
pub struct MatchHandle {
    match_id: MatchId,
    commands: mpsc::Sender<MatchCommand>,
    updates: broadcast::Sender<ServerMessage>,
}

impl MatchHandle {
    /// Match identifier.
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Receive events and snapshots published by the host.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.updates.subscribe()
    }

    /// Queue a raw command.
    pub async fn send(&self, command: MatchCommand) -> Result<(), HostError> {
        self.commands.send(command).await.map_err(|_| HostError::Closed)
    }

    /// Participant connected.
    pub async fn connect(&self, participant: ParticipantId) -> Result<(), HostError> {
        self.send(MatchCommand::Connect(participant)).await
    }

    /// Participant disconnected.
    pub async fn disconnect(&self, participant: ParticipantId) -> Result<(), HostError> {
        self.send(MatchCommand::Disconnect(participant)).await
    }

    /// Ready toggle.
    pub async fn set_ready(&self, participant: ParticipantId, ready: bool) -> Result<(), HostError> {
        self.send(MatchCommand::SetReady { participant, ready }).await
    }

    /// Elimination signal.
    pub async fn eliminate(&self, participant: ParticipantId) -> Result<(), HostError> {
        self.send(MatchCommand::Eliminate(participant)).await
    }

    /// Hit report.
    pub async fn record_hit(&self, victim: ParticipantId, attacker: ParticipantId) -> Result<(), HostError> {
        self.send(MatchCommand::RecordHit { victim, attacker }).await
    }

    /// Points from a scoring contributor.
    pub async fn add_points(&self, participant: ParticipantId, amount: i64) -> Result<(), HostError> {
        self.send(MatchCommand::AddPoints { participant, amount }).await
    }

    /// End the running round.
    pub async fn end_round(&self) -> Result<(), HostError> {
        self.send(MatchCommand::EndRound).await
    }

    /// Zone entry.
    pub async fn enter_zone(&self, zone: ZoneId, participant: ParticipantId) -> Result<(), HostError> {
        self.send(MatchCommand::EnterZone { zone, participant }).await
    }

    /// Zone exit.
    pub async fn exit_zone(&self, zone: ZoneId, participant: ParticipantId) -> Result<(), HostError> {
        self.send(MatchCommand::ExitZone { zone, participant }).await
    }

    /// Current snapshot, answered on the host's next tick.
    pub async fn snapshot(&self) -> Result<MatchSnapshot, HostError> {
        let (tx, rx) = oneshot::channel();
        self.send(MatchCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| HostError::Closed)
    }
}

// =============================================================================
// HOST
// =============================================================================

/// Single-owner actor around a match session.
pub struct MatchHost {
    match_id: MatchId,
    session: MatchSession<Box<dyn WorldLoader>>,
    zones: BTreeMap<ZoneId, ScoringZone>,
    next_zone_id: ZoneId,
    commands: mpsc::Receiver<MatchCommand>,
    updates: broadcast::Sender<ServerMessage>,
    tick: Duration,
    published_revision: u64,
    published_clock: Option<RoundClock>,
}

/// Round timer and countdown as last published.
type RoundClock = (i64, Duration);

impl MatchHost {
    /// Create a host and its handle.
    pub fn new(
        config: MatchConfig,
        world: Box<dyn WorldLoader>,
        tick: Duration,
    ) -> Result<(Self, MatchHandle), HostError> {
        let session = MatchSession::new(config, world)?;
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (update_tx, _) = broadcast::channel(UPDATE_BUFFER);
        let match_id = MatchId::new_v4();

        let handle = MatchHandle {
            match_id,
            commands: command_tx,
            updates: update_tx.clone(),
        };

        let host = Self {
            match_id,
            session,
            zones: BTreeMap::new(),
            next_zone_id: 0,
            commands: command_rx,
            updates: update_tx,
            tick,
            published_revision: 0,
            published_clock: None,
        };

        Ok((host, handle))
    }

    /// Register a scoring zone.
    pub fn add_zone(&mut self, config: ZoneConfig) -> ZoneId {
        let id = self.next_zone_id;
        self.next_zone_id += 1;
        self.zones.insert(id, ScoringZone::new(id, config));
        id
    }

    /// Match identifier.
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Session owned by this host.
    pub fn session(&self) -> &MatchSession<Box<dyn WorldLoader>> {
        &self.session
    }

    /// Scoring zone by id.
    pub fn zone(&self, id: ZoneId) -> Option<&ScoringZone> {
        self.zones.get(&id)
    }

    /// Run one host tick.
    pub fn step(&mut self, dt: Duration) -> Result<TickResult, HostError> {
        let outcome = self.drain_and_tick(dt);
        // Publish even on failure so observers see the abort
        self.publish();
        outcome
    }

    /// Drains the whole queue even when a command fails; the first failure
    /// is returned after the tick.
    fn drain_and_tick(&mut self, dt: Duration) -> Result<TickResult, HostError> {
        let mut first_error = None;
        while let Ok(command) = self.commands.try_recv() {
            if let Err(e) = self.apply(command) {
                warn!(match_id = %self.match_id, error = %e, "Command failed");
                first_error.get_or_insert(e);
            }
        }

        let result = match self.session.tick(dt) {
            Ok(result) => result,
            Err(e) => return Err(first_error.unwrap_or_else(|| e.into())),
        };

        let phase = self.session.phase();
        for zone in self.zones.values_mut() {
            for (participant, amount) in zone.tick(phase, dt) {
                if let Err(e) = self.session.add_points(participant, amount) {
                    warn!(zone = zone.id(), error = %e, "Zone award rejected");
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    fn apply(&mut self, command: MatchCommand) -> Result<(), HostError> {
        match command {
            MatchCommand::Connect(id) => self.session.on_connect(id),
            MatchCommand::Disconnect(id) => {
                for zone in self.zones.values_mut() {
                    zone.exit(&id);
                }
                self.session.on_disconnect(id)?;
            }
            MatchCommand::SetReady { participant, ready } => self.session.set_ready(participant, ready)?,
            MatchCommand::Eliminate(id) => self.session.notify_eliminated(id)?,
            MatchCommand::RecordHit { victim, attacker } => self.session.record_hit(victim, attacker),
            MatchCommand::AddPoints { participant, amount } => {
                if let Err(e) = self.session.add_points(participant, amount) {
                    warn!(participant = %participant, error = %e, "Points rejected");
                }
            }
            MatchCommand::EndRound => self.session.notify_round_ended()?,
            MatchCommand::EnterZone { zone, participant } => match self.zones.get_mut(&zone) {
                Some(z) => {
                    z.enter(participant);
                }
                None => debug!(zone, participant = %participant, "Unknown zone"),
            },
            MatchCommand::ExitZone { zone, participant } => match self.zones.get_mut(&zone) {
                Some(z) => {
                    z.exit(&participant);
                }
                None => debug!(zone, participant = %participant, "Unknown zone"),
            },
            MatchCommand::Snapshot(reply) => {
                let _ = reply.send(self.session.snapshot());
            }
        }
        Ok(())
    }

    fn publish(&mut self) {
        // No subscribers is fine; sends are fire-and-forget
        for event in self.session.take_events() {
            let _ = self.updates.send(ServerMessage::Event(event));
        }

        let revision = self.session.revision();
        let clock = self.round_clock();
        let clock_moved = clock.is_some() && clock != self.published_clock;
        if revision != self.published_revision || clock_moved {
            self.published_revision = revision;
            self.published_clock = clock;
            let _ = self.updates.send(ServerMessage::Snapshot(self.session.snapshot()));
        }
    }

    fn round_clock(&self) -> Option<RoundClock> {
        if !self.session.phase().is_round_phase() {
            return None;
        }
        self.session.round()
            .map(|r| (r.timer().remaining_micros(), r.countdown_remaining()))
    }

    /// Run the fixed-rate loop until shutdown.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), HostError> {
        info!(match_id = %self.match_id, tick_ms = self.tick.as_millis() as u64, "Match host started");

        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.step(self.tick) {
                        Ok(_) => {}
                        Err(HostError::Session(SessionError::Environment(e))) => {
                            // Session already fell back to Lobby
                            error!(match_id = %self.match_id, error = %e, "Match aborted by environment failure");
                        }
                        Err(e) => {
                            error!(match_id = %self.match_id, error = %e, "Match host stopping");
                            return Err(e);
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!(match_id = %self.match_id, "Match host shutting down");
                    if self.session.phase() != MatchPhase::Lobby {
                        self.session.abort_match("server shutdown");
                    }
                    self.publish();
                    let _ = self.updates.send(ServerMessage::Shutdown {
                        reason: "Server shutting down".to_string(),
                    });
                    return Ok(());
                }
            }
        }
    }
}
