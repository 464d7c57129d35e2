//! Participant identity and roster entries

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable opaque identifier assigned by the session layer at join time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// RGB display colour, components in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl PlayerColor {
    /// Derive a stable colour from a display name
    ///
    /// Hue comes from the first letter, saturation from the name length.
    pub fn from_name(name: &str) -> Self {
        let first = name
            .chars()
            .next()
            .map(|c| c.to_ascii_lowercase())
            .unwrap_or('a');
        let letter = (first as i32 - 96).clamp(0, 26) as f32;
        let hue = (letter / 26.0) * 0.8;
        let saturation = (0.5 + (name.chars().count() as f32 / 20.0) / 3.0).min(1.0);
        Self::from_hsv(hue, saturation, 0.99)
    }

    /// HSV (all in [0, 1]) to RGB
    pub fn from_hsv(h: f32, s: f32, v: f32) -> Self {
        let h = (h.rem_euclid(1.0)) * 6.0;
        let sector = h.floor() as i32 % 6;
        let f = h - h.floor();
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        let (r, g, b) = match sector {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };
        Self { r, g, b }
    }
}

/// Roster entry supplied by the session layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub color: PlayerColor,
}

impl Participant {
    pub fn new(id: ParticipantId, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let color = PlayerColor::from_name(&display_name);
        Self { id, display_name, color }
    }
}
