// State extraction: parsed note events -> ordered raw states.
//
// One raw state per onset, in onset order. Input may be polyphonic (several
// notes sharing an onset); each such chord is reduced to one representative
// under an explicit `ChordRule`, so the result is always a single voice.
// Optionally, silent gaps between consecutive notes become explicit rest
// states so the chains learn phrasing as well as pitches.
//
// Ordering: events are stably sorted by onset, so events that share an onset
// keep their input order. That order is what `ChordRule::First` and all
// pitch ties fall back on.

use crate::error::{Error, Result};
use crate::note::{NoteEvent, Track};
use crate::state::{MAX_PITCH, RawState};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Onsets closer than this (in beats) are treated as simultaneous.
const ONSET_EPSILON: f64 = 1e-6;

/// How a chord is reduced to a single note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordRule {
    /// Top note (melody line). Equal pitches resolve to the first encountered.
    #[default]
    Highest,
    /// Bottom note (bass line). Equal pitches resolve to the first encountered.
    Lowest,
    /// First sounding note in input order.
    First,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub chord_rule: ChordRule,
    /// Keep only events on this MIDI channel.
    pub channel: Option<u8>,
    /// Gaps at least this long (beats) become rest states. `None` disables
    /// rest inference; explicit rest events are always kept.
    pub min_rest: Option<f64>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig {
            chord_rule: ChordRule::Highest,
            channel: None,
            min_rest: Some(0.25),
        }
    }
}

/// Extract one voice of raw states from a flat list of events.
///
/// Events whose pitch lies above the MIDI range are dropped. Fails with
/// `EmptyInput` when nothing survives the filters.
pub fn extract(events: &[NoteEvent], config: &ExtractConfig) -> Result<Vec<RawState>> {
    let mut selected: Vec<&NoteEvent> = events
        .iter()
        .filter(|e| e.onset.is_finite())
        .filter(|e| config.channel.is_none_or(|c| e.channel == c))
        .collect();
    let before = selected.len();
    selected.retain(|e| e.pitch.is_none_or(|p| p <= MAX_PITCH));
    if selected.len() < before {
        warn!(
            dropped = before - selected.len(),
            "dropped notes with pitches above the MIDI range"
        );
    }
    if selected.is_empty() {
        return Err(Error::EmptyInput);
    }
    // `sort_by` is stable: equal onsets keep input order.
    selected.sort_by(|a, b| a.onset.total_cmp(&b.onset));

    let mut states = Vec::with_capacity(selected.len());
    let mut prev_end: Option<f64> = None;
    let mut i = 0;
    while i < selected.len() {
        let group_onset = selected[i].onset;
        let mut j = i + 1;
        while j < selected.len() && (selected[j].onset - group_onset).abs() < ONSET_EPSILON {
            j += 1;
        }
        let rep = representative(&selected[i..j], config.chord_rule);

        if let (Some(min_rest), Some(end)) = (config.min_rest, prev_end) {
            let gap = rep.onset - end;
            if gap > 0.0 && gap + ONSET_EPSILON >= min_rest {
                states.push(RawState {
                    pitch: None,
                    duration: gap,
                    velocity: rep.velocity.min(127),
                    articulation: Default::default(),
                });
            }
        }

        states.push(RawState {
            pitch: rep.pitch,
            duration: rep.duration,
            velocity: rep.velocity.min(127),
            articulation: rep.articulation,
        });
        prev_end = Some(match prev_end {
            Some(end) => end.max(rep.end()),
            None => rep.end(),
        });
        i = j;
    }
    Ok(states)
}

/// Extract each track as its own voice, skipping empty tracks.
///
/// Fails with `EmptyInput` only when every track is empty.
pub fn extract_tracks(tracks: &[Track], config: &ExtractConfig) -> Result<Vec<Vec<RawState>>> {
    let mut voices = Vec::with_capacity(tracks.len());
    for track in tracks {
        match extract(&track.notes, config) {
            Ok(states) => {
                debug!(track = %track.name, states = states.len(), "extracted voice");
                voices.push(states);
            }
            Err(Error::EmptyInput) => {
                debug!(track = %track.name, "skipping empty track");
            }
            Err(e) => return Err(e),
        }
    }
    if voices.is_empty() {
        return Err(Error::EmptyInput);
    }
    Ok(voices)
}

/// Pick the chord member that stands for the whole group. Sounding notes
/// always win over rests.
fn representative<'a>(group: &[&'a NoteEvent], rule: ChordRule) -> &'a NoteEvent {
    let mut best: Option<&'a NoteEvent> = None;
    for &event in group {
        let Some(pitch) = event.pitch else { continue };
        best = match best {
            None => Some(event),
            Some(current) => {
                let current_pitch = current.pitch.unwrap_or(0);
                let replace = match rule {
                    ChordRule::Highest => pitch > current_pitch,
                    ChordRule::Lowest => pitch < current_pitch,
                    ChordRule::First => false,
                };
                Some(if replace { event } else { current })
            }
        };
    }
    best.unwrap_or(group[0])
}
