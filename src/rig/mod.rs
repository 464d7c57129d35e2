//! Instrument rig selection and animation
//!
//! [`InstrumentModeCoordinator`] owns one state machine per tracked
//! participant. Mode changes arrive only as reliable `SetMode` messages;
//! live hand tracking overrides the selected rig for as long as it lasts
//! without touching the selected mode.

pub mod coordinator;
pub mod handlers;
pub mod smoothing;

pub use coordinator::{InstrumentModeCoordinator, ParticipantRig};
pub use handlers::{DrumRig, GuitarRig, KeyboardRig, RigHandlers};

use crate::instrument::InstrumentMode;
use serde::{Deserialize, Serialize};

/// Rig weights and prop visibility for one participant, indexed by mode index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigVisualState {
    weights: [f32; 4],
    props: [bool; 4],
    hands_override: bool,
}

impl RigVisualState {
    /// Visual state for `mode`, with the hands rig forced on when `hands_override` is set
    ///
    /// Props always follow `mode`; only the rig weights are overridden.
    pub fn resolve(mode: InstrumentMode, hands_override: bool) -> Self {
        let active = if hands_override { InstrumentMode::Hands } else { mode };

        let mut weights = [0.0; 4];
        weights[active.index() as usize] = 1.0;

        let mut props = [false; 4];
        props[mode.index() as usize] = mode.has_prop();

        Self {
            weights,
            props,
            hands_override,
        }
    }

    pub fn weight(&self, mode: InstrumentMode) -> f32 {
        self.weights[mode.index() as usize]
    }

    pub fn weights(&self) -> [f32; 4] {
        self.weights
    }

    pub fn prop_active(&self, mode: InstrumentMode) -> bool {
        self.props[mode.index() as usize]
    }

    pub fn props(&self) -> [bool; 4] {
        self.props
    }

    pub fn hands_override(&self) -> bool {
        self.hands_override
    }

    /// The rig currently rendered at full weight
    pub fn active_rig(&self) -> InstrumentMode {
        InstrumentMode::ALL
            .into_iter()
            .find(|m| self.weight(*m) >= 1.0)
            .unwrap_or_default()
    }

    /// Whether instrument IK handlers may animate
    pub fn instrument_rigs_enabled(&self) -> bool {
        !self.hands_override
    }
}

impl Default for RigVisualState {
    fn default() -> Self {
        Self::resolve(InstrumentMode::Hands, false)
    }
}
