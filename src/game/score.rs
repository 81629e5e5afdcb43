//! Score Ledger
//!
//! Per-participant points, both round-scoped and match-cumulative.
//! Backed by a BTreeMap so that iteration (and therefore tie-breaking)
//! is ordered by participant id.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::ids::ParticipantId;

/// Points held by one participant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Accumulated over the whole match.
    pub match_points: i64,
    /// Accumulated in the current round only.
    pub round_points: i64,
}

/// Rejected score operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    /// Point amounts must be non-negative.
    #[error("negative point amount {amount} for {participant}")]
    NegativeAmount {
        /// Target participant.
        participant: ParticipantId,
        /// Offending amount.
        amount: i64,
    },
}

/// Server-owned point ledger.
#[derive(Clone, Debug, Default)]
pub struct ScoreBoard {
    entries: BTreeMap<ParticipantId, ScoreEntry>,
}

impl ScoreBoard {
    /// Create an empty scoreboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zero-point entry if absent. Returns true if one was created.
    pub fn ensure_entry(&mut self, id: ParticipantId) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, ScoreEntry::default());
        true
    }

    /// Zero round points for every entry. Match points are untouched.
    pub fn reset_round_points(&mut self) {
        for entry in self.entries.values_mut() {
            entry.round_points = 0;
        }
    }

    /// Prepare for a new match: keep entries only for `keep`, all zeroed.
    pub fn reset_for_match<'a>(&mut self, keep: impl IntoIterator<Item = &'a ParticipantId>) {
        self.entries.clear();
        for id in keep {
            self.entries.insert(*id, ScoreEntry::default());
        }
    }

    /// Add to both round and match points, creating the entry if missing.
    pub fn add_points(&mut self, id: ParticipantId, amount: i64) -> Result<(), ScoreError> {
        if amount < 0 {
            return Err(ScoreError::NegativeAmount { participant: id, amount });
        }

        let entry = self.entries.entry(id).or_default();
        entry.round_points = entry.round_points.saturating_add(amount);
        entry.match_points = entry.match_points.saturating_add(amount);
        Ok(())
    }

    /// Award the round-win bonus.
    ///
    /// Same accounting as `add_points`; kept separate so round wins can be
    /// audited apart from incremental scoring.
    pub fn award_round_win_bonus(&mut self, id: ParticipantId, amount: i64) -> Result<(), ScoreError> {
        self.add_points(id, amount)
    }

    /// Get an entry.
    pub fn get(&self, id: &ParticipantId) -> Option<&ScoreEntry> {
        self.entries.get(id)
    }

    /// Match points for a participant (0 if unknown).
    pub fn match_points(&self, id: &ParticipantId) -> i64 {
        self.entries.get(id).map(|e| e.match_points).unwrap_or(0)
    }

    /// Round points for a participant (0 if unknown).
    pub fn round_points(&self, id: &ParticipantId) -> i64 {
        self.entries.get(id).map(|e| e.round_points).unwrap_or(0)
    }

    /// Iterate entries in participant id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, &ScoreEntry)> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest round scorer among entries accepted by `eligible`.
    ///
    /// Strictly-greater comparison over ascending ids: ties go to the lowest id.
    pub fn top_round_scorer(&self, eligible: impl Fn(&ParticipantId) -> bool) -> Option<ParticipantId> {
        let mut best: Option<(ParticipantId, i64)> = None;
        for (id, entry) in &self.entries {
            if !eligible(id) {
                continue;
            }
            match best {
                Some((_, points)) if entry.round_points <= points => {}
                _ => best = Some((*id, entry.round_points)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// Final standings: (id, match points) sorted by points descending, then id.
    pub fn standings(&self) -> Vec<(ParticipantId, i64)> {
        let mut results: Vec<_> = self.entries.iter()
            .map(|(id, e)| (*id, e.match_points))
            .collect();
        results.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        results
    }
}
