// Discrete musical states: the symbols the Markov chains are built over.
//
// The extractor (extract.rs) produces one `RawState` per note, still carrying
// continuous duration and raw velocity. The quantizer (quantize.rs) turns
// each into a `State`, whose every attribute is drawn from a finite set so
// states can be counted, compared and ordered. `State` is a plain value
// type; equality and ordering are structural, and the derived `Ord` is what
// keeps every table iteration (and therefore every seeded walk) in a stable
// order.

use crate::note::Articulation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// MIDI-style tick resolution used for quantized durations.
pub const TICKS_PER_QUARTER: u32 = 480;

/// Highest valid MIDI pitch (G9).
pub const MAX_PITCH: u8 = 127;

/// Dynamic marking, ordered soft to loud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dynamic {
    Ppp,
    Pp,
    P,
    Mp,
    Mf,
    F,
    Ff,
    Fff,
}

impl Dynamic {
    pub const ALL: [Dynamic; 8] = [
        Dynamic::Ppp,
        Dynamic::Pp,
        Dynamic::P,
        Dynamic::Mp,
        Dynamic::Mf,
        Dynamic::F,
        Dynamic::Ff,
        Dynamic::Fff,
    ];

    /// Marking for a velocity, in 16-wide bands (0-15 ppp ... 112-127 fff).
    pub fn from_velocity(velocity: u8) -> Self {
        Dynamic::ALL[(velocity.min(127) / 16) as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dynamic::Ppp => "ppp",
            Dynamic::Pp => "pp",
            Dynamic::P => "p",
            Dynamic::Mp => "mp",
            Dynamic::Mf => "mf",
            Dynamic::F => "f",
            Dynamic::Ff => "ff",
            Dynamic::Fff => "fff",
        }
    }
}

impl fmt::Display for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pre-quantization snapshot of one note.
#[derive(Debug, Clone, PartialEq)]
pub struct RawState {
    pub pitch: Option<u8>,
    /// Duration in beats.
    pub duration: f64,
    pub velocity: u8,
    pub articulation: Articulation,
}

/// Quantized snapshot of one note: the chain vocabulary's element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct State {
    /// Absolute MIDI pitch, `None` for a rest.
    pub pitch: Option<u8>,
    /// Duration snapped to the grid, in ticks (`TICKS_PER_QUARTER` per beat).
    pub duration_ticks: u32,
    pub dynamic: Dynamic,
    pub articulation: Articulation,
    /// Representative velocity of the state's dynamic bucket.
    pub velocity: u8,
}

impl State {
    /// Pitch class 0-11 (C = 0). `None` for rests.
    pub fn pitch_class(&self) -> Option<u8> {
        self.pitch.map(|p| p % 12)
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }

    pub fn duration_beats(&self) -> f64 {
        self.duration_ticks as f64 / TICKS_PER_QUARTER as f64
    }

    pub fn with_pitch(self, pitch: Option<u8>) -> Self {
        State { pitch, ..self }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pitch {
            Some(p) => write!(f, "{}", pitch_name(p))?,
            None => f.write_str("R")?,
        }
        write!(f, "/{}b/{}", self.duration_beats(), self.dynamic)
    }
}

/// Scientific pitch name, e.g. 60 -> "C4", 58 -> "Bb3".
pub fn pitch_name(pitch: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
    ];
    let octave = pitch as i16 / 12 - 1;
    format!("{}{}", NAMES[(pitch % 12) as usize], octave)
}
