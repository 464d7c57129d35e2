//! Session context and the per-client sync tick
//!
//! The external session layer owns membership. It hands the client a
//! [`SessionContext`] at construction and reports later changes as
//! [`SessionEvent`]s, which are applied at the start of the next tick.

mod client;
mod participant;
mod snapshot;

#[cfg(test)]
mod tests;

pub use client::{LocalCommand, SyncClient, TickStats};
pub use participant::{Participant, ParticipantId, PlayerColor};
pub use snapshot::{HandSnapshot, ParticipantSnapshot, PoseSnapshot, RenderSnapshot, TargetSnapshot};

use crate::pose::ReferenceFrame;
use std::collections::BTreeMap;

/// Membership change or reference update reported by the session layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Joined(Participant),
    Left(ParticipantId),
    ReferenceMoved(ReferenceFrame),
}

/// Local identity, roster and shared reference frame of one client
#[derive(Debug, Clone)]
pub struct SessionContext {
    local: ParticipantId,
    roster: BTreeMap<ParticipantId, Participant>,
    reference: ReferenceFrame,
}

impl SessionContext {
    pub fn new(local: Participant, reference: ReferenceFrame) -> Self {
        let id = local.id;
        let mut roster = BTreeMap::new();
        roster.insert(id, local);
        Self {
            local: id,
            roster,
            reference,
        }
    }

    pub fn local_id(&self) -> ParticipantId {
        self.local
    }

    pub fn local(&self) -> Option<&Participant> {
        self.roster.get(&self.local)
    }

    /// Add or replace a roster entry; returns false when it was already present
    pub fn join(&mut self, participant: Participant) -> bool {
        self.roster.insert(participant.id, participant).is_none()
    }

    /// Remove a remote participant; the local participant cannot leave its own context
    pub fn leave(&mut self, id: ParticipantId) -> Option<Participant> {
        if id == self.local {
            return None;
        }
        self.roster.remove(&id)
    }

    pub fn is_member(&self, id: ParticipantId) -> bool {
        self.roster.contains_key(&id)
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.roster.get(&id)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.roster.values()
    }

    /// Members other than the local participant
    pub fn remotes(&self) -> impl Iterator<Item = &Participant> {
        let local = self.local;
        self.roster.values().filter(move |p| p.id != local)
    }

    pub fn reference(&self) -> &ReferenceFrame {
        &self.reference
    }

    pub fn set_reference(&mut self, reference: ReferenceFrame) {
        self.reference = reference;
    }
}
