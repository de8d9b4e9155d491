// Built-in training material, used when no corpus files are supplied.
//
// "Twinkle, Twinkle, Little Star" in C5 (A B A form), quarter and half
// notes at a single mezzo-forte velocity. Small, but enough for every chain
// order up to 3 to observe transitions.

use crate::note::Track;

const C5: u8 = 72;
const D5: u8 = 74;
const E5: u8 = 76;
const F5: u8 = 77;
const G5: u8 = 79;
const A5: u8 = 81;

const PHRASE_A: [(u8, f64); 14] = [
    (C5, 1.0),
    (C5, 1.0),
    (G5, 1.0),
    (G5, 1.0),
    (A5, 1.0),
    (A5, 1.0),
    (G5, 2.0),
    (F5, 1.0),
    (F5, 1.0),
    (E5, 1.0),
    (E5, 1.0),
    (D5, 1.0),
    (D5, 1.0),
    (C5, 2.0),
];

const PHRASE_B: [(u8, f64); 7] = [
    (G5, 1.0),
    (G5, 1.0),
    (F5, 1.0),
    (F5, 1.0),
    (E5, 1.0),
    (E5, 1.0),
    (D5, 2.0),
];

/// The built-in melody as a single track.
pub fn builtin_melody() -> Track {
    let mut melody = Vec::with_capacity(PHRASE_A.len() * 2 + PHRASE_B.len() * 2);
    melody.extend_from_slice(&PHRASE_A);
    melody.extend_from_slice(&PHRASE_B);
    melody.extend_from_slice(&PHRASE_B);
    melody.extend_from_slice(&PHRASE_A);
    Track::from_melody("Twinkle", &melody, 64)
}
