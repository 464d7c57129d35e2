//! Instrument mode and per-participant instrument state
//!
//! Defines the closed set of instrument visualizations and the gesture
//! parameters derived for them.

use serde::{Deserialize, Serialize};

/// Instrument visualization selected for a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentMode {
    /// Raw hand tracking, no instrument prop
    #[default]
    Hands,
    Keyboard,
    Drum,
    Guitar,
}

impl InstrumentMode {
    /// All modes, in wire index order
    pub const ALL: [InstrumentMode; 4] = [
        InstrumentMode::Hands,
        InstrumentMode::Keyboard,
        InstrumentMode::Drum,
        InstrumentMode::Guitar,
    ];

    /// Decode a wire index (0=Hands, 1=Keyboard, 2=Drum, 3=Guitar)
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Wire index of this mode
    pub fn index(self) -> u8 {
        match self {
            InstrumentMode::Hands => 0,
            InstrumentMode::Keyboard => 1,
            InstrumentMode::Drum => 2,
            InstrumentMode::Guitar => 3,
        }
    }

    /// Single-key shortcut (h/k/d/g)
    pub fn from_hotkey(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'h' => Some(InstrumentMode::Hands),
            'k' => Some(InstrumentMode::Keyboard),
            'd' => Some(InstrumentMode::Drum),
            'g' => Some(InstrumentMode::Guitar),
            _ => None,
        }
    }

    /// Parse a mode from its name, hotkey or index
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(index) = s.parse::<u8>() {
            return Self::from_index(index);
        }
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "hands" => Some(InstrumentMode::Hands),
            "keyboard" | "keys" => Some(InstrumentMode::Keyboard),
            "drum" | "drums" => Some(InstrumentMode::Drum),
            "guitar" => Some(InstrumentMode::Guitar),
            _ => {
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Self::from_hotkey(c),
                    _ => None,
                }
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentMode::Hands => "hands",
            InstrumentMode::Keyboard => "keyboard",
            InstrumentMode::Drum => "drum",
            InstrumentMode::Guitar => "guitar",
        }
    }

    /// Whether this mode shows an instrument prop
    pub fn has_prop(self) -> bool {
        !matches!(self, InstrumentMode::Hands)
    }
}

impl std::fmt::Display for InstrumentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which hand an event or pose section refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandSide {
    Left,
    Right,
}

impl HandSide {
    pub const BOTH: [HandSide; 2] = [HandSide::Left, HandSide::Right];

    /// Array slot for per-hand storage
    pub fn slot(self) -> usize {
        match self {
            HandSide::Left => 0,
            HandSide::Right => 1,
        }
    }
}

/// Continuous animation parameters, each in [0, 1]
///
/// Values hold their last computed value while no note drives them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContinuousParams {
    pub keyboard_left: f32,
    pub keyboard_right: f32,
    pub guitar_neck: f32,
}

/// Edge-triggered discrete flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscreteFlags {
    pub key_left_hit: bool,
    pub key_right_hit: bool,
    pub drum_left_hit: bool,
    pub drum_right_hit: bool,
    pub strum: bool,
}

/// A single discrete flag transition, in the order it happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscreteEdge {
    Hit { side: HandSide, state: bool },
    Strum { state: bool },
}

/// Authoritative instrument state of the locally controlling participant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InstrumentState {
    pub mode: InstrumentMode,
    pub continuous: ContinuousParams,
    pub flags: DiscreteFlags,
}
