//! Membership Registry
//!
//! Source of truth for who is connected. Ready and alive sets live with the
//! components that use them; this registry only reports connectivity.

use std::collections::BTreeSet;

use crate::core::ids::ParticipantId;

/// Connectivity change reported by the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipChange {
    /// Participant connected.
    Connected(ParticipantId),
    /// Participant disconnected.
    Disconnected(ParticipantId),
}

/// Set of connected participants.
#[derive(Clone, Debug, Default)]
pub struct MembershipRegistry {
    connected: BTreeSet<ParticipantId>,
}

impl MembershipRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection. `None` if the id was already connected.
    pub fn connect(&mut self, id: ParticipantId) -> Option<MembershipChange> {
        self.connected.insert(id).then_some(MembershipChange::Connected(id))
    }

    /// Record a disconnection. `None` if the id was not connected.
    pub fn disconnect(&mut self, id: ParticipantId) -> Option<MembershipChange> {
        self.connected.remove(&id).then_some(MembershipChange::Disconnected(id))
    }

    /// Is this participant connected?
    pub fn is_connected(&self, id: &ParticipantId) -> bool {
        self.connected.contains(id)
    }

    /// All connected participant ids, in id order.
    pub fn connected_ids(&self) -> &BTreeSet<ParticipantId> {
        &self.connected
    }

    /// Number of connected participants.
    pub fn count(&self) -> usize {
        self.connected.len()
    }
}
