//! Per-participant rig selection state machine

use super::{RigHandlers, RigVisualState};
use crate::config::RigConfig;
use crate::error::SyncError;
use crate::instrument::{ContinuousParams, InstrumentMode};
use crate::protocol::ReliableMessage;
use crate::session::ParticipantId;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Rig state of one tracked participant
#[derive(Debug, Clone)]
pub struct ParticipantRig {
    mode: InstrumentMode,
    visual: RigVisualState,
    handlers: RigHandlers,
    hands_present: bool,
}

impl ParticipantRig {
    fn new(config: &RigConfig) -> Self {
        Self {
            mode: InstrumentMode::Hands,
            visual: RigVisualState::default(),
            handlers: RigHandlers::new(config),
            hands_present: false,
        }
    }

    /// Mode selected by the last applied `SetMode`
    pub fn mode(&self) -> InstrumentMode {
        self.mode
    }

    pub fn visual(&self) -> &RigVisualState {
        &self.visual
    }

    pub fn handlers(&self) -> &RigHandlers {
        &self.handlers
    }

    pub fn hands_present(&self) -> bool {
        self.hands_present
    }
}

/// Applies reliable mode/discrete messages and the per-tick hands override
#[derive(Debug, Clone, Default)]
pub struct InstrumentModeCoordinator {
    rig_config: RigConfig,
    participants: BTreeMap<ParticipantId, ParticipantRig>,
}

impl InstrumentModeCoordinator {
    pub fn new(rig_config: RigConfig) -> Self {
        Self {
            rig_config,
            participants: BTreeMap::new(),
        }
    }

    /// Start tracking a participant in the initial Hands state
    pub fn track(&mut self, id: ParticipantId) {
        if !self.participants.contains_key(&id) {
            self.participants.insert(id, ParticipantRig::new(&self.rig_config));
            debug!("Tracking rig for {}", id);
        }
    }

    /// Drop every piece of rig state held for a participant
    pub fn evict(&mut self, id: ParticipantId) -> bool {
        self.participants.remove(&id).is_some()
    }

    pub fn is_tracked(&self, id: ParticipantId) -> bool {
        self.participants.contains_key(&id)
    }

    /// Apply one reliable message
    ///
    /// Messages for untracked participants and unknown mode indices are
    /// rejected without changing any state.
    pub fn apply(&mut self, message: &ReliableMessage) -> Result<(), SyncError> {
        let target = message.target();
        let rig = self
            .participants
            .get_mut(&target)
            .ok_or(SyncError::UnknownParticipant(target))?;

        match *message {
            ReliableMessage::SetMode { mode, .. } => {
                let mode = InstrumentMode::from_index(mode).ok_or(SyncError::UnknownMode(mode))?;
                if rig.mode != mode {
                    info!("🎸 {} switched to {}", target, mode);
                }
                rig.mode = mode;
                rig.visual = RigVisualState::resolve(mode, rig.hands_present);
            }
            ReliableMessage::HitEvent { side, state, .. } => {
                rig.handlers.apply_hit(rig.mode, side, state);
            }
            ReliableMessage::StrumEvent { state, .. } => {
                rig.handlers.apply_strum(rig.mode, state);
            }
        }
        Ok(())
    }

    /// Record whether hand tracking is live for a participant this tick
    pub fn set_hands_present(&mut self, id: ParticipantId, present: bool) {
        if let Some(rig) = self.participants.get_mut(&id) {
            rig.hands_present = present;
        }
    }

    pub fn set_continuous(&mut self, id: ParticipantId, params: ContinuousParams) {
        if let Some(rig) = self.participants.get_mut(&id) {
            rig.handlers.set_continuous(params);
        }
    }

    /// Re-evaluate the hands override of every participant
    ///
    /// Runs every tick, since presence can change from one frame to the next.
    pub fn refresh_overrides(&mut self) {
        for rig in self.participants.values_mut() {
            rig.visual = RigVisualState::resolve(rig.mode, rig.hands_present);
        }
    }

    /// Animate the active rig handlers
    pub fn advance(&mut self, dt: f32) {
        for rig in self.participants.values_mut() {
            rig.handlers.update(dt, &rig.visual);
        }
    }

    pub fn rig(&self, id: ParticipantId) -> Option<&ParticipantRig> {
        self.participants.get(&id)
    }

    pub fn participants(&self) -> impl Iterator<Item = (&ParticipantId, &ParticipantRig)> {
        self.participants.iter()
    }

    /// Apply new rig geometry to every participant
    pub fn reconfigure(&mut self, rig_config: RigConfig) {
        for rig in self.participants.values_mut() {
            rig.handlers.reconfigure(&rig_config);
        }
        self.rig_config = rig_config;
    }
}
