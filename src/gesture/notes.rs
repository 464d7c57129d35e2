//! Set of currently held notes
//!
//! Keyed by (channel, note). Insertion order is kept so the guitar string
//! can follow the most recently pressed fret.

/// Held notes, unique by (channel, note)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveNoteSet {
    notes: Vec<(u8, u8)>,
}

impl ActiveNoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a held note. Returns false if it was already held.
    pub fn insert(&mut self, channel: u8, note: u8) -> bool {
        if self.contains(channel, note) {
            return false;
        }
        self.notes.push((channel, note));
        true
    }

    /// Release a note. Returns false if it was not held.
    pub fn remove(&mut self, channel: u8, note: u8) -> bool {
        match self.notes.iter().position(|&n| n == (channel, note)) {
            Some(idx) => {
                self.notes.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, channel: u8, note: u8) -> bool {
        self.notes.contains(&(channel, note))
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Held notes on one channel, oldest first
    pub fn on_channel(&self, channel: u8) -> impl Iterator<Item = u8> + '_ {
        self.notes
            .iter()
            .filter(move |(ch, _)| *ch == channel)
            .map(|(_, note)| *note)
    }

    /// Most recently pressed note still held on a channel
    pub fn latest_on_channel(&self, channel: u8) -> Option<u8> {
        self.on_channel(channel).last()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.notes.iter().copied()
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }
}
