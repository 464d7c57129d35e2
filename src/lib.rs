//! jam-sync - real-time performance sync for shared XR jam sessions
//!
//! Turns a note-style control stream into instrument gesture parameters,
//! synchronizes pose and gesture data between participants, and keeps one
//! instrument rig state machine per participant consistent across clients.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod gesture;
pub mod instrument;
pub mod pose;
pub mod protocol;
pub mod rig;
pub mod session;
pub mod transport;

pub use config::AppConfig;
pub use control::ControlEvent;
pub use error::SyncError;
pub use gesture::{ActiveNoteSet, GestureDerivationEngine};
pub use instrument::{ContinuousParams, DiscreteFlags, HandSide, InstrumentMode, InstrumentState};
pub use pose::{PoseFrame, ReferenceFrame, RemotePose, TrackingSample};
pub use protocol::ReliableMessage;
pub use rig::{InstrumentModeCoordinator, RigVisualState};
pub use session::{Participant, ParticipantId, SessionContext, SessionEvent, SyncClient};
pub use transport::{LoopbackHub, Transport};
