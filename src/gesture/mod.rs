//! Gesture derivation - turns held notes into instrument animation parameters
//!
//! The engine owns the local participant's `ActiveNoteSet` and
//! `InstrumentState`. Each control event is applied synchronously:
//! membership is updated first, then the parameters of the current mode
//! are re-derived from the whole held set, and discrete flags toggle on the
//! triggering event only.

mod notes;


pub use notes::ActiveNoteSet;

use crate::config::GestureConfig;
use crate::control::ControlEvent;
use crate::error::SyncError;
use crate::instrument::{DiscreteEdge, HandSide, InstrumentMode, InstrumentState};
use tracing::{debug, trace};

/// Derives per-mode continuous parameters and discrete flags from note events
#[derive(Debug, Clone)]
pub struct GestureDerivationEngine {
    config: GestureConfig,
    notes: ActiveNoteSet,
    state: InstrumentState,
    /// Flag transitions not yet collected by the session
    edges: Vec<DiscreteEdge>,
}

impl GestureDerivationEngine {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            notes: ActiveNoteSet::new(),
            state: InstrumentState::default(),
            edges: Vec::new(),
        }
    }

    /// Apply one control event and return the updated state
    pub fn apply(&mut self, event: ControlEvent) -> InstrumentState {
        let (channel, note) = event.key();
        if event.is_note_off() {
            self.notes.remove(channel, note);
        } else {
            self.notes.insert(channel, note);
        }
        trace!("{} -> {} held", event, self.notes.len());

        match self.state.mode {
            InstrumentMode::Hands => {}
            InstrumentMode::Keyboard => self.derive_keyboard(event),
            InstrumentMode::Drum => self.derive_drum(event),
            InstrumentMode::Guitar => self.derive_guitar(event),
        }

        self.state
    }

    /// Parse and apply a bridge message; malformed input leaves all state untouched
    pub fn apply_text(&mut self, raw: &str) -> Result<InstrumentState, SyncError> {
        let event = ControlEvent::parse(raw).map_err(|e| {
            debug!("Dropping control message '{}': {}", raw, e);
            SyncError::from(e)
        })?;
        Ok(self.apply(event))
    }

    /// Switch the mode parameters are derived for
    ///
    /// Held notes survive the switch; parameters of the new mode are
    /// recomputed on the next event. Raised hit flags are kept as well, so a
    /// side still held from before the switch fires no new edge until released.
    pub fn set_mode(&mut self, mode: InstrumentMode) {
        self.state.mode = mode;
    }

    /// Replace derivation thresholds (takes effect on the next event)
    pub fn reconfigure(&mut self, config: GestureConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn state(&self) -> &InstrumentState {
        &self.state
    }

    pub fn notes(&self) -> &ActiveNoteSet {
        &self.notes
    }

    /// Drain discrete flag transitions in the order they happened
    pub fn take_edges(&mut self) -> Vec<DiscreteEdge> {
        std::mem::take(&mut self.edges)
    }

    fn derive_keyboard(&mut self, event: ControlEvent) {
        let middle = self.config.middle_note as f32;

        let (mut left_sum, mut left_count) = (0u32, 0u32);
        let (mut right_sum, mut right_count) = (0u32, 0u32);
        for note in self.notes.on_channel(self.config.keyboard_channel) {
            if note < self.config.middle_note {
                left_sum += note as u32;
                left_count += 1;
            } else {
                right_sum += note as u32;
                right_count += 1;
            }
        }

        // A side with no held notes keeps its previous position
        if right_count > 0 {
            let mean = right_sum as f32 / right_count as f32;
            self.state.continuous.keyboard_right = ((mean - middle) / middle).clamp(0.0, 1.0);
        }
        if left_count > 0 {
            let mean = left_sum as f32 / left_count as f32;
            self.state.continuous.keyboard_left = (1.0 - mean / middle).clamp(0.0, 1.0);
        }

        if event.channel != self.config.keyboard_channel {
            return;
        }
        let state = !event.is_note_off();
        if event.note < self.config.middle_note {
            self.set_hit(HandSide::Left, state, |f| &mut f.key_left_hit);
        } else {
            self.set_hit(HandSide::Right, state, |f| &mut f.key_right_hit);
        }
    }

    fn derive_drum(&mut self, event: ControlEvent) {
        if event.channel != self.config.drum_channel {
            return;
        }
        let state = !event.is_note_off();
        // Even pads are the left stick, odd pads the right
        if event.note % 2 == 0 {
            self.set_hit(HandSide::Left, state, |f| &mut f.drum_left_hit);
        } else {
            self.set_hit(HandSide::Right, state, |f| &mut f.drum_right_hit);
        }
    }

    fn derive_guitar(&mut self, event: ControlEvent) {
        if let Some(fret) = self.notes.latest_on_channel(self.config.guitar_string_channel) {
            let base = self.config.guitar_base_note as f32;
            let span = self.config.guitar_span as f32;
            self.state.continuous.guitar_neck = ((fret as f32 - base) / span).clamp(0.0, 1.0);
        }

        let strum = !event.is_note_off();
        if self.state.flags.strum != strum {
            self.state.flags.strum = strum;
            self.edges.push(DiscreteEdge::Strum { state: strum });
        }
    }

    fn set_hit(
        &mut self,
        side: HandSide,
        state: bool,
        flag: impl FnOnce(&mut crate::instrument::DiscreteFlags) -> &mut bool,
    ) {
        let slot = flag(&mut self.state.flags);
        if *slot != state {
            *slot = state;
            self.edges.push(DiscreteEdge::Hit { side, state });
        }
    }
}

impl Default for GestureDerivationEngine {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}
