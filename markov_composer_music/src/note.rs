// Parsed note records handed to the composer by the MIDI-parsing side.
//
// A `NoteEvent` is one timed note (or explicit rest) with its onset and
// duration measured in beats (quarter note = 1.0). Events are immutable once
// built. A `Track` groups the events of one instrument part; a training
// corpus is a slice of tracks, possibly from several files.

use serde::{Deserialize, Serialize};

/// Playing technique attached to a note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Articulation {
    #[default]
    Normal,
    Staccato,
    Staccatissimo,
    Tenuto,
    Accent,
    Marcato,
    Legato,
}

/// One parsed note. `pitch == None` marks an explicit rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Onset in beats from the start of the track.
    pub onset: f64,
    /// MIDI note number (60 = C4), or `None` for a rest.
    pub pitch: Option<u8>,
    /// Length in beats.
    pub duration: f64,
    /// MIDI velocity. Values above 127 are clamped during extraction.
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    #[serde(default)]
    pub channel: u8,
    #[serde(default)]
    pub articulation: Articulation,
}

fn default_velocity() -> u8 {
    64
}

impl NoteEvent {
    pub fn note(onset: f64, pitch: u8, duration: f64, velocity: u8) -> Self {
        NoteEvent {
            onset,
            pitch: Some(pitch),
            duration,
            velocity,
            channel: 0,
            articulation: Articulation::Normal,
        }
    }

    pub fn rest(onset: f64, duration: f64) -> Self {
        NoteEvent {
            onset,
            pitch: None,
            duration,
            velocity: default_velocity(),
            channel: 0,
            articulation: Articulation::Normal,
        }
    }

    pub fn with_articulation(mut self, articulation: Articulation) -> Self {
        self.articulation = articulation;
        self
    }

    pub fn on_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }

    /// Beat at which the note stops sounding.
    pub fn end(&self) -> f64 {
        self.onset + self.duration.max(0.0)
    }
}

/// The events of one instrument part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub notes: Vec<NoteEvent>,
}

impl Track {
    pub fn new(name: impl Into<String>, notes: Vec<NoteEvent>) -> Self {
        Track {
            name: name.into(),
            notes,
        }
    }

    /// Build a track of back-to-back notes from `(pitch, beats)` pairs, all
    /// at one velocity. Handy for fixtures and the built-in melody.
    pub fn from_melody(name: impl Into<String>, melody: &[(u8, f64)], velocity: u8) -> Self {
        let mut onset = 0.0;
        let notes = melody
            .iter()
            .map(|&(pitch, beats)| {
                let note = NoteEvent::note(onset, pitch, beats, velocity);
                onset += beats;
                note
            })
            .collect();
        Track::new(name, notes)
    }
}
