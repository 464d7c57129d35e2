//! Control events from the external MIDI bridge
//!
//! The bridge forwards note messages as address-style text,
//! `"NoteOn/<channel> <note> <velocity>"`, optionally with a leading `/`.
//! A velocity of 0 is a note-off.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Highest valid MIDI channel (channels are 1-based on the bridge)
pub const MAX_CHANNEL: u8 = 16;

/// Highest valid note number / velocity
pub const MAX_DATA: u8 = 127;

/// Reasons a control string is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlParseError {
    #[error("empty message")]
    Empty,
    #[error("unsupported message kind '{0}'")]
    UnsupportedKind(String),
    #[error("expected 3 fields (channel note velocity), got {0}")]
    FieldCount(usize),
    #[error("field '{field}' is not a number: '{value}'")]
    NotNumeric { field: &'static str, value: String },
    #[error("field '{field}' out of range: {value}")]
    OutOfRange { field: &'static str, value: u32 },
}

/// Note-on style control event (velocity 0 means note-off)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlEvent {
    /// Channel (1-16)
    pub channel: u8,
    /// Note number (0-127)
    pub note: u8,
    /// Velocity (0-127), 0 = note-off
    pub velocity: u8,
}

impl ControlEvent {
    /// Build a note-on (velocity > 0) or note-off (velocity 0)
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self { channel, note, velocity }
    }

    /// Build a note-off
    pub fn note_off(channel: u8, note: u8) -> Self {
        Self { channel, note, velocity: 0 }
    }

    /// True when this event releases its note
    pub fn is_note_off(&self) -> bool {
        self.velocity == 0
    }

    /// The (channel, note) key this event refers to
    pub fn key(&self) -> (u8, u8) {
        (self.channel, self.note)
    }

    /// Parse a bridge message
    pub fn parse(raw: &str) -> Result<Self, ControlParseError> {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(ControlParseError::Empty);
        }

        let (kind, rest) = trimmed
            .split_once('/')
            .ok_or_else(|| ControlParseError::UnsupportedKind(trimmed.to_string()))?;
        if kind != "NoteOn" {
            return Err(ControlParseError::UnsupportedKind(kind.to_string()));
        }

        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(ControlParseError::FieldCount(fields.len()));
        }

        let channel = parse_field("channel", fields[0], 1, MAX_CHANNEL)?;
        let note = parse_field("note", fields[1], 0, MAX_DATA)?;
        let velocity = parse_field("velocity", fields[2], 0, MAX_DATA)?;

        Ok(Self { channel, note, velocity })
    }

    /// Encode back to the bridge text form
    pub fn to_address(&self) -> String {
        format!("/NoteOn/{} {} {}", self.channel, self.note, self.velocity)
    }
}

fn parse_field(field: &'static str, value: &str, min: u8, max: u8) -> Result<u8, ControlParseError> {
    let n: u32 = value.parse().map_err(|_| ControlParseError::NotNumeric {
        field,
        value: value.to_string(),
    })?;
    if n < min as u32 || n > max as u32 {
        return Err(ControlParseError::OutOfRange { field, value: n });
    }
    Ok(n as u8)
}

impl FromStr for ControlEvent {
    type Err = ControlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_note_off() {
            write!(f, "NoteOff ch:{} n:{}", self.channel, self.note)
        } else {
            write!(f, "NoteOn ch:{} n:{} v:{}", self.channel, self.note, self.velocity)
        }
    }
}

/// Split a datagram that may carry several newline-separated messages
pub fn split_messages(payload: &str) -> impl Iterator<Item = &str> {
    payload.lines().map(str::trim).filter(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_parsing() {
        let ev = ControlEvent::parse("NoteOn/1 30 64").unwrap();
        assert_eq!(ev, ControlEvent::note_on(1, 30, 64));
        assert!(!ev.is_note_off());
    }

    #[test]
    fn test_leading_slash_and_extra_spaces() {
        let ev = ControlEvent::parse("  /NoteOn/7   45\t100 ").unwrap();
        assert_eq!(ev, ControlEvent::note_on(7, 45, 100));
    }

    #[test]
    fn test_velocity_zero_is_note_off() {
        let ev = ControlEvent::parse("/NoteOn/1 30 0").unwrap();
        assert!(ev.is_note_off());
        assert_eq!(ev.key(), (1, 30));
    }

    #[test]
    fn test_rejects_other_kinds() {
        assert_eq!(
            ControlEvent::parse("/ControlChange/1 7 100"),
            Err(ControlParseError::UnsupportedKind("ControlChange".into()))
        );
        assert!(matches!(
            ControlEvent::parse("NoteOn 1 30 64"),
            Err(ControlParseError::UnsupportedKind(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_field_count() {
        assert_eq!(
            ControlEvent::parse("/NoteOn/1 30"),
            Err(ControlParseError::FieldCount(2))
        );
        assert_eq!(
            ControlEvent::parse("/NoteOn/1 30 64 9"),
            Err(ControlParseError::FieldCount(4))
        );
    }

    #[test]
    fn test_rejects_non_numeric() {
        assert!(matches!(
            ControlEvent::parse("/NoteOn/1 C4 64"),
            Err(ControlParseError::NotNumeric { field: "note", .. })
        ));
        assert!(matches!(
            ControlEvent::parse("/NoteOn/x 30 64"),
            Err(ControlParseError::NotNumeric { field: "channel", .. })
        ));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(matches!(
            ControlEvent::parse("/NoteOn/0 30 64"),
            Err(ControlParseError::OutOfRange { field: "channel", value: 0 })
        ));
        assert!(matches!(
            ControlEvent::parse("/NoteOn/1 128 64"),
            Err(ControlParseError::OutOfRange { field: "note", value: 128 })
        ));
        assert_eq!(ControlEvent::parse("   "), Err(ControlParseError::Empty));
    }

    #[test]
    fn test_address_round_trip() {
        let ev = ControlEvent::note_on(3, 60, 90);
        assert_eq!(ev.to_address(), "/NoteOn/3 60 90");
        assert_eq!(ev.to_address().parse::<ControlEvent>().unwrap(), ev);
    }

    #[test]
    fn test_split_messages() {
        let msgs: Vec<&str> = split_messages("/NoteOn/1 30 64\n\n/NoteOn/1 30 0\r\n").collect();
        assert_eq!(msgs, vec!["/NoteOn/1 30 64", "/NoteOn/1 30 0"]);
    }
}
