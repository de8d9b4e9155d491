// Instrument profiles and the preset registry.
//
// An instrument is a plain record: sounding range, written transposition,
// and default clef. Presets are a lookup table, and ensembles are named
// lists of preset names. Callers may also supply their own profiles (see
// `ComposerConfig::custom_instruments`).
//
// Ranges are sounding MIDI pitches. `transposition` is what gets added to a
// sounding pitch to obtain the written pitch (Bb clarinet: +2, horn in F:
// +7, double bass: +12).

use crate::error::{Error, Result};
use crate::state::MAX_PITCH;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clef {
    Treble,
    Alto,
    Bass,
    /// Treble + bass staves (keyboard).
    Grand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentProfile {
    pub name: String,
    pub lowest: u8,
    pub highest: u8,
    #[serde(default)]
    pub transposition: i8,
    pub clef: Clef,
}

impl InstrumentProfile {
    pub fn new(name: impl Into<String>, lowest: u8, highest: u8) -> Self {
        InstrumentProfile {
            name: name.into(),
            lowest,
            highest,
            transposition: 0,
            clef: Clef::Treble,
        }
    }

    pub fn with_transposition(mut self, transposition: i8) -> Self {
        self.transposition = transposition;
        self
    }

    pub fn with_clef(mut self, clef: Clef) -> Self {
        self.clef = clef;
        self
    }

    /// Fails with `DegenerateRange` unless `lowest < highest <= 127`.
    pub fn validate(&self) -> Result<()> {
        if self.lowest >= self.highest || self.highest > MAX_PITCH {
            return Err(Error::DegenerateRange {
                name: self.name.clone(),
                lowest: self.lowest,
                highest: self.highest,
            });
        }
        Ok(())
    }

    pub fn contains(&self, pitch: u8) -> bool {
        (self.lowest..=self.highest).contains(&pitch)
    }

    /// Written pitch for a sounding pitch, saturating at the MIDI bounds.
    pub fn written(&self, sounding: u8) -> u8 {
        (sounding as i16 + self.transposition as i16).clamp(0, MAX_PITCH as i16) as u8
    }

    /// Preset by name. A doubling suffix (`"Violin I #2"`) is accepted; the
    /// returned profile keeps the full name so doubled parts stay distinct.
    pub fn preset(name: &str) -> Result<Self> {
        let (lowest, highest, transposition, clef) = match base_name(name) {
            "Flute" => (60, 96, 0, Clef::Treble),       // C4–C7
            "Oboe" => (58, 93, 0, Clef::Treble),        // Bb3–A6
            "Clarinet" => (50, 94, 2, Clef::Treble),    // D3–Bb6, in Bb
            "Bassoon" => (34, 75, 0, Clef::Bass),       // Bb1–Eb5
            "Horn" => (41, 83, 7, Clef::Treble),        // F2–B5, in F
            "Trumpet" => (54, 90, 2, Clef::Treble),     // Gb3–Gb6, in Bb
            "Trombone" => (40, 82, 0, Clef::Bass),      // E2–Bb5
            "Tuba" => (26, 65, 0, Clef::Bass),          // D1–F4
            "Violin I" | "Violin II" => (55, 105, 0, Clef::Treble), // G3–A7
            "Viola" => (48, 88, 0, Clef::Alto),         // C3–E6
            "Violoncello" => (36, 84, 0, Clef::Bass),   // C2–C6
            "Double Bass" => (28, 67, 12, Clef::Bass),  // E1–G4, sounds an octave down
            "Piano" => (21, 108, 0, Clef::Grand),       // A0–C8
            _ => return Err(Error::UnknownInstrument(name.to_string())),
        };
        Ok(InstrumentProfile {
            name: name.trim().to_string(),
            lowest,
            highest,
            transposition,
            clef,
        })
    }
}

/// Names accepted by `InstrumentProfile::preset`, in score order.
pub const PRESET_NAMES: [&str; 14] = [
    "Flute",
    "Oboe",
    "Clarinet",
    "Bassoon",
    "Horn",
    "Trumpet",
    "Trombone",
    "Tuba",
    "Violin I",
    "Violin II",
    "Viola",
    "Violoncello",
    "Double Bass",
    "Piano",
];

/// Named instrument groupings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ensemble {
    StringQuartet,
    PianoSolo,
    WindTrio,
    SmallOrchestra,
}

impl Ensemble {
    pub const ALL: [Ensemble; 4] = [
        Ensemble::StringQuartet,
        Ensemble::PianoSolo,
        Ensemble::WindTrio,
        Ensemble::SmallOrchestra,
    ];

    pub fn members(self) -> &'static [&'static str] {
        match self {
            Ensemble::StringQuartet => &["Violin I", "Violin II", "Viola", "Violoncello"],
            Ensemble::PianoSolo => &["Piano"],
            Ensemble::WindTrio => &["Flute", "Clarinet", "Bassoon"],
            Ensemble::SmallOrchestra => &[
                "Flute",
                "Oboe",
                "Clarinet",
                "Bassoon",
                "Horn",
                "Trumpet",
                "Violin I",
                "Violin II",
                "Viola",
                "Violoncello",
            ],
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().replace(['-', ' '], "_").as_str() {
            "string_quartet" => Some(Ensemble::StringQuartet),
            "piano_solo" => Some(Ensemble::PianoSolo),
            "wind_trio" => Some(Ensemble::WindTrio),
            "small_orchestra" => Some(Ensemble::SmallOrchestra),
            _ => None,
        }
    }

}

/// Instrument name without its doubling suffix: `"Violin I #2"` -> `"Violin I"`.
pub fn base_name(name: &str) -> &str {
    name.split(" #").next().unwrap_or(name).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_is_valid() {
        for name in PRESET_NAMES {
            let profile = InstrumentProfile::preset(name).unwrap();
            profile.validate().unwrap();
            assert!(
                profile.highest - profile.lowest >= 12,
                "{name} spans less than an octave"
            );
        }
    }

    #[test]
    fn doubling_suffix_is_kept_in_name() {
        let p = InstrumentProfile::preset("Violin I #2").unwrap();
        assert_eq!(p.name, "Violin I #2");
        assert_eq!((p.lowest, p.highest), (55, 105));
    }

    #[test]
    fn unknown_instrument() {
        assert!(matches!(
            InstrumentProfile::preset("Theremin"),
            Err(Error::UnknownInstrument(_))
        ));
    }

    #[test]
    fn degenerate_ranges() {
        assert!(matches!(
            InstrumentProfile::new("x", 60, 60).validate(),
            Err(Error::DegenerateRange { .. })
        ));
        assert!(InstrumentProfile::new("x", 70, 60).validate().is_err());
    }

    #[test]
    fn written_pitch_applies_transposition() {
        let clarinet = InstrumentProfile::preset("Clarinet").unwrap();
        assert_eq!(clarinet.written(60), 62);
        let bass = InstrumentProfile::preset("Double Bass").unwrap();
        assert_eq!(bass.written(120), 127);
    }

    #[test]
    fn ensembles_resolve_to_presets() {
        for ensemble in Ensemble::ALL {
            for name in ensemble.members() {
                assert!(InstrumentProfile::preset(name).is_ok(), "{name}");
            }
        }
        assert_eq!(Ensemble::parse("string-quartet"), Some(Ensemble::StringQuartet));
        assert_eq!(Ensemble::parse("Small Orchestra"), Some(Ensemble::SmallOrchestra));
    }

    #[test]
    fn base_name_strips_doubling() {
        assert_eq!(base_name("Flute #2"), "Flute");
        assert_eq!(base_name(" Violin I #3 "), "Violin I");
        assert_eq!(base_name("Tuba"), "Tuba");
    }

    #[test]
    fn ranges_beyond_midi_rejected() {
        assert!(matches!(
            InstrumentProfile::new("hi", 200, 250).validate(),
            Err(Error::DegenerateRange { .. })
        ));
        assert!(InstrumentProfile::new("top", 100, 128).validate().is_err());
        assert!(InstrumentProfile::new("edge", 100, 127).validate().is_ok());
    }
}
