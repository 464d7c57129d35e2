//! Reliable ordered message surface
//!
//! Mode changes and discrete instrument events travel on the reliable
//! channel, each addressed to the participant it applies to.

use crate::error::SyncError;
use crate::instrument::{HandSide, InstrumentMode};
use crate::session::ParticipantId;
use serde::{Deserialize, Serialize};

/// Message delivered in per-sender order to every participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReliableMessage {
    /// Select a mode by wire index (0=Hands, 1=Keyboard, 2=Drum, 3=Guitar)
    SetMode { participant: ParticipantId, mode: u8 },
    HitEvent {
        participant: ParticipantId,
        side: HandSide,
        state: bool,
    },
    StrumEvent { participant: ParticipantId, state: bool },
}

impl ReliableMessage {
    pub fn set_mode(participant: ParticipantId, mode: InstrumentMode) -> Self {
        ReliableMessage::SetMode {
            participant,
            mode: mode.index(),
        }
    }

    /// Participant the message is addressed to
    pub fn target(&self) -> ParticipantId {
        match *self {
            ReliableMessage::SetMode { participant, .. }
            | ReliableMessage::HitEvent { participant, .. }
            | ReliableMessage::StrumEvent { participant, .. } => participant,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SyncError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SyncError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
