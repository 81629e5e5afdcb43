//! Attacker Credit
//!
//! Remembers who last hit each participant so a ring-out can be credited.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::core::ids::ParticipantId;

#[derive(Clone, Copy, Debug)]
struct Hit {
    attacker: ParticipantId,
    valid_until: Duration,
}

/// Last-attacker table keyed by victim.
#[derive(Clone, Debug)]
pub struct AttackerCredit {
    window: Duration,
    last_hit: BTreeMap<ParticipantId, Hit>,
}

impl AttackerCredit {
    /// Create a table whose hits stay valid for `window` of match time.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_hit: BTreeMap::new(),
        }
    }

    /// Record that `attacker` hit `victim` at match time `now`.
    ///
    /// Self-hits are ignored. A newer hit replaces the previous attacker.
    pub fn record_hit(&mut self, victim: ParticipantId, attacker: ParticipantId, now: Duration) {
        if victim == attacker {
            return;
        }
        self.last_hit.insert(victim, Hit {
            attacker,
            valid_until: now.saturating_add(self.window),
        });
    }

    /// Remove and return the attacker of `victim` if the hit is still valid.
    pub fn take_valid(&mut self, victim: &ParticipantId, now: Duration) -> Option<ParticipantId> {
        self.last_hit
            .remove(victim)
            .filter(|hit| now <= hit.valid_until)
            .map(|hit| hit.attacker)
    }

    /// Forget every recorded hit.
    pub fn clear(&mut self) {
        self.last_hit.clear();
    }

    /// Number of victims with a recorded hit.
    pub fn len(&self) -> usize {
        self.last_hit.len()
    }

    /// True if no hits are recorded.
    pub fn is_empty(&self) -> bool {
        self.last_hit.is_empty()
    }
}
