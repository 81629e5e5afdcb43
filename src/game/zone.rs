//! Scoring Zones
//!
//! Area-effect scoring contributors. A zone pays every occupant a fixed
//! amount each time its interval elapses, but only while a round is playing.
//! Zones are peers of the session: they report awards and the owner credits
//! them through the scoreboard.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::core::ids::ParticipantId;
use crate::game::state::MatchPhase;

/// Zone identifier (stable for the lifetime of the host).
pub type ZoneId = u32;

/// Configuration for one scoring zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneConfig {
    /// Points paid to each occupant per interval
    pub points_per_interval: i64,
    /// Payout interval
    pub interval: Duration,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            points_per_interval: 1,
            interval: Duration::from_secs(1),
        }
    }
}

/// A scoring zone and its current occupants.
#[derive(Debug, Clone)]
pub struct ScoringZone {
    id: ZoneId,
    config: ZoneConfig,
    accumulated: Duration,
    occupants: BTreeSet<ParticipantId>,
}

impl ScoringZone {
    /// Create an empty zone.
    pub fn new(id: ZoneId, config: ZoneConfig) -> Self {
        Self {
            id,
            config,
            accumulated: Duration::ZERO,
            occupants: BTreeSet::new(),
        }
    }

    /// Zone id.
    pub fn id(&self) -> ZoneId {
        self.id
    }

    /// Participant entered the zone.
    pub fn enter(&mut self, id: ParticipantId) -> bool {
        self.occupants.insert(id)
    }

    /// Participant left the zone.
    pub fn exit(&mut self, id: &ParticipantId) -> bool {
        self.occupants.remove(id)
    }

    /// Current occupants.
    pub fn occupants(&self) -> &BTreeSet<ParticipantId> {
        &self.occupants
    }

    /// Advance the zone clock. Returns the awards due this tick.
    pub fn tick(&mut self, phase: MatchPhase, dt: Duration) -> Vec<(ParticipantId, i64)> {
        if phase != MatchPhase::Playing {
            return Vec::new();
        }

        self.accumulated += dt;
        if self.accumulated < self.config.interval {
            return Vec::new();
        }
        self.accumulated = Duration::ZERO;

        self.occupants
            .iter()
            .map(|id| (*id, self.config.points_per_interval))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> ScoringZone {
        ScoringZone::new(1, ZoneConfig {
            points_per_interval: 2,
            interval: Duration::from_millis(500),
        })
    }

    #[test]
    fn test_zone_pays_occupants_each_interval() {
        let mut zone = zone();
        zone.enter(ParticipantId::new(3));
        zone.enter(ParticipantId::new(1));

        assert!(zone.tick(MatchPhase::Playing, Duration::from_millis(300)).is_empty());
        let awards = zone.tick(MatchPhase::Playing, Duration::from_millis(300));
        assert_eq!(awards, vec![(ParticipantId::new(1), 2), (ParticipantId::new(3), 2)]);

        // Accumulator restarts after a payout.
        assert!(zone.tick(MatchPhase::Playing, Duration::from_millis(300)).is_empty());
    }

    #[test]
    fn test_zone_idle_outside_playing() {
        let mut zone = zone();
        zone.enter(ParticipantId::new(1));

        for phase in [MatchPhase::Lobby, MatchPhase::Countdown, MatchPhase::Results] {
            assert!(zone.tick(phase, Duration::from_secs(10)).is_empty());
        }
        assert!(zone.tick(MatchPhase::Playing, Duration::from_millis(100)).is_empty());
    }

    #[test]
    fn test_zone_exit() {
        let mut zone = zone();
        let id = ParticipantId::new(1);
        assert!(zone.enter(id));
        assert!(!zone.enter(id));
        assert!(zone.exit(&id));
        assert!(zone.tick(MatchPhase::Playing, Duration::from_secs(1)).is_empty());
    }
}
