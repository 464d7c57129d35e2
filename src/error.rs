//! Error taxonomy for the sync core
//!
//! Every variant is recoverable. The tick drains log rejected inputs at
//! `debug!` and move on, so a single corrupt message never stalls a session.

use crate::control::ControlParseError;
use crate::session::ParticipantId;
use thiserror::Error;

/// Errors produced while applying inputs to the sync core
#[derive(Debug, Error)]
pub enum SyncError {
    /// Control event text could not be parsed into channel/note/velocity
    #[error("malformed control event: {0}")]
    MalformedControl(#[from] ControlParseError),

    /// Pose frame sequence is not newer than the last applied one
    #[error("stale pose frame from {participant}: sequence {sequence} <= {last_applied}")]
    StaleFrame {
        participant: ParticipantId,
        sequence: u64,
        last_applied: u64,
    },

    /// `SetMode` carried an index outside 0..=3
    #[error("unknown instrument mode index {0}")]
    UnknownMode(u8),

    /// Message addressed to a participant that is not tracked
    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),

    /// Binary encoding or decoding failed
    #[error("wire format error: {0}")]
    Wire(#[from] bincode::Error),

    /// Transport refused an outgoing message
    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
