//! Participant and match identifiers.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Stable connection identifier of a participant.
///
/// Opaque and unique per connection; a reconnecting client receives a new one.
/// Implements Ord so that every ordered collection keyed by it iterates
/// deterministically (lowest id first).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl ParticipantId {
    /// Create from a raw connection id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw connection id.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl From<u64> for ParticipantId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Unique match identifier (one per hosted match instance).
pub type MatchId = uuid::Uuid;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_id_ordering() {
        let a = ParticipantId::new(1);
        let b = ParticipantId::new(2);
        assert!(a < b);
        assert_eq!(ParticipantId::from(7).raw(), 7);
    }

    #[test]
    fn test_participant_id_display_and_json() {
        let id = ParticipantId::new(42);
        assert_eq!(id.to_string(), "p42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
    }
}
