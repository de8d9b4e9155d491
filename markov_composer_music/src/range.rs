// Range adaptation: fit generated pitches to an instrument.
//
// A pure post-process over an already generated sequence. Out-of-range
// pitches move by whole octaves until they land inside the instrument's
// range, which keeps the pitch class (and so the melodic identity) intact.
// Only when no octave of that pitch class fits (a range narrower than an
// octave) is the pitch clamped to the nearer bound. Rests pass through.

use crate::error::Result;
use crate::instrument::InstrumentProfile;
use crate::state::State;

/// Move `pitch` into `profile`'s range by octaves, clamping as a last resort.
pub fn adapt_pitch(pitch: u8, profile: &InstrumentProfile) -> u8 {
    let lo = profile.lowest as i16;
    let hi = profile.highest as i16;
    let original = pitch as i16;
    let mut p = original;
    while p < lo {
        p += 12;
    }
    while p > hi {
        p -= 12;
    }
    if p < lo {
        // No octave of this pitch class fits.
        p = if original < lo { lo } else { hi };
    }
    p as u8
}

/// Adapt every sounding state of a sequence. Fails with `DegenerateRange`
/// for a profile whose range is empty or inverted.
pub fn adapt_states(states: &[State], profile: &InstrumentProfile) -> Result<Vec<State>> {
    profile.validate()?;
    Ok(states
        .iter()
        .map(|s| s.with_pitch(s.pitch.map(|p| adapt_pitch(p, profile))))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::note::Articulation;
    use crate::state::{Dynamic, TICKS_PER_QUARTER};

    fn st(pitch: Option<u8>) -> State {
        State {
            pitch,
            duration_ticks: TICKS_PER_QUARTER,
            dynamic: Dynamic::Mf,
            articulation: Articulation::Normal,
            velocity: 72,
        }
    }

    #[test]
    fn in_range_untouched() {
        let flute = InstrumentProfile::preset("Flute").unwrap();
        assert_eq!(adapt_pitch(72, &flute), 72);
        assert_eq!(adapt_pitch(60, &flute), 60);
        assert_eq!(adapt_pitch(96, &flute), 96);
    }

    #[test]
    fn octave_shifts_keep_pitch_class() {
        let tuba = InstrumentProfile::preset("Tuba").unwrap();
        for pitch in 0..=127u8 {
            let adapted = adapt_pitch(pitch, &tuba);
            assert!(tuba.contains(adapted), "{pitch} -> {adapted}");
            assert_eq!(adapted % 12, pitch % 12);
        }
    }

    #[test]
    fn shifts_are_minimal() {
        let violin = InstrumentProfile::preset("Violin I").unwrap();
        // B2 (47) is one octave below B3 (59), the lowest B in range.
        assert_eq!(adapt_pitch(47, &violin), 59);
        assert_eq!(adapt_pitch(120, &violin), 96);
    }

    #[test]
    fn narrow_range_clamps() {
        let narrow = InstrumentProfile::new("narrow", 60, 64);
        assert_eq!(adapt_pitch(66, &narrow), 64);
        assert_eq!(adapt_pitch(54, &narrow), 60);
        // No F# lies between C4 and E4.
        assert_eq!(adapt_pitch(42, &narrow), 60);
        // D6 folds down to D4.
        assert_eq!(adapt_pitch(86, &narrow), 62);
    }

    #[test]
    fn rests_pass_through_and_profiles_are_validated() {
        let cello = InstrumentProfile::preset("Violoncello").unwrap();
        let adapted = adapt_states(&[st(None), st(Some(100))], &cello).unwrap();
        assert_eq!(adapted[0].pitch, None);
        assert_eq!(adapted[1].pitch, Some(76));

        let broken = InstrumentProfile::new("broken", 80, 40);
        assert!(matches!(
            adapt_states(&[st(Some(60))], &broken),
            Err(Error::DegenerateRange { .. })
        ));
    }
}
