// Composer configuration.
//
// Everything a training + generation run can be tuned with lives in
// `ComposerConfig`, loadable from JSON. Every field has a default, so a
// config file only needs the fields it changes. The CLI layers its flags on
// top of whatever file it loaded.
//
// Instruments are referenced by name. Each name is resolved first against
// `custom_instruments` (exact name match) and then against the preset
// registry in instrument.rs, so a custom profile can also shadow a preset.
//
// `voice_mappings` ties instruments to training tracks by track name; see
// pipeline.rs for how mapped models are trained and shared.

use crate::builder::check_order;
use crate::error::{Error, Result};
use crate::extract::ExtractConfig;
use crate::instrument::InstrumentProfile;
use crate::model::GenerationMode;
use crate::quantize::{QuantizeConfig, Quantizer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Markov chain order (1..=3).
    pub order: usize,
    pub mode: GenerationMode,
    /// Notes generated per instrument.
    pub length: usize,
    pub quantization: QuantizeConfig,
    pub extraction: ExtractConfig,
    /// Fixed seed for reproducible output. `None` lets the caller pick one.
    pub seed: Option<u64>,
    /// Instrument names, one generated part each, in score order.
    pub instruments: Vec<String>,
    /// User-supplied profiles, referenced by name from `instruments`.
    pub custom_instruments: Vec<InstrumentProfile>,
    /// Instrument (full or base name) -> name of the track(s) it learns from.
    /// Unmapped instruments learn from every track.
    pub voice_mappings: BTreeMap<String, String>,
    /// Passed through to the score-assembly side.
    pub tempo_bpm: u16,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        ComposerConfig {
            order: 1,
            mode: GenerationMode::Joint,
            length: 100,
            quantization: QuantizeConfig::default(),
            extraction: ExtractConfig::default(),
            seed: None,
            instruments: vec!["Piano".to_string()],
            custom_instruments: Vec::new(),
            voice_mappings: BTreeMap::new(),
            tempo_bpm: 120,
        }
    }
}

impl ComposerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check every field that can be checked before training.
    pub fn validate(&self) -> Result<()> {
        check_order(self.order)?;
        Quantizer::from_config(&self.quantization)?;
        if self.tempo_bpm == 0 {
            return Err(Error::InvalidConfig("tempo must be positive".into()));
        }
        if let Some(min_rest) = self.extraction.min_rest {
            if !(min_rest.is_finite() && min_rest > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "minimum rest must be positive, got {min_rest}"
                )));
            }
        }
        let blank = self
            .voice_mappings
            .iter()
            .find(|(_, voice)| voice.trim().is_empty());
        if let Some((instrument, _)) = blank {
            return Err(Error::InvalidConfig(format!(
                "voice mapping for '{instrument}' names no track"
            )));
        }
        self.resolve_instruments()?;
        Ok(())
    }

    /// Profiles for every entry of `instruments`, validated.
    pub fn resolve_instruments(&self) -> Result<Vec<InstrumentProfile>> {
        if self.instruments.is_empty() {
            return Err(Error::InvalidConfig("no instruments selected".into()));
        }
        self.instruments
            .iter()
            .map(|name| {
                let profile = match self.custom_instruments.iter().find(|p| &p.name == name) {
                    Some(custom) => custom.clone(),
                    None => InstrumentProfile::preset(name)?,
                };
                profile.validate()?;
                Ok(profile)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ChordRule;
    use crate::instrument::Clef;

    #[test]
    fn default_config_is_valid_and_round_trips() {
        let config = ComposerConfig::default();
        config.validate().unwrap();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored = ComposerConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = ComposerConfig::from_json(
            r#"{
                "order": 2,
                "mode": "independent",
                "quantization": { "step": 0.25 },
                "extraction": { "chord_rule": "lowest" },
                "instruments": ["Flute", "Violin I #2"],
                "voice_mappings": { "Violin I": "Soprano" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.order, 2);
        assert_eq!(config.mode, GenerationMode::Independent);
        assert_eq!(config.quantization.step, 0.25);
        assert_eq!(config.quantization.longest, 4.0);
        assert_eq!(config.extraction.chord_rule, ChordRule::Lowest);
        assert_eq!(config.length, 100);
        assert_eq!(config.voice_mappings["Violin I"], "Soprano");
        assert_eq!(config.resolve_instruments().unwrap().len(), 2);
    }

    #[test]
    fn invalid_values_rejected() {
        let config = ComposerConfig {
            order: 4,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidOrder(4))));

        let mut config = ComposerConfig::default();
        config.quantization.step = -1.0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = ComposerConfig::default();
        config.quantization.dynamic_levels = 12;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        // A positive but vanishing step is rejected, not allocated.
        for step in [1e-300, 1e-9] {
            let mut config = ComposerConfig::default();
            config.quantization.step = step;
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }

        let mut config = ComposerConfig::default();
        config.voice_mappings.insert("Piano".into(), " ".into());
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = ComposerConfig {
            instruments: vec!["Kazoo".into()],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::UnknownInstrument(_))
        ));

        let config = ComposerConfig {
            instruments: vec![],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn custom_instruments_shadow_presets() {
        let config = ComposerConfig {
            instruments: vec!["Flute".into(), "Recorder".into()],
            custom_instruments: vec![
                InstrumentProfile::new("Recorder", 72, 98),
                InstrumentProfile::new("Flute", 62, 90).with_clef(Clef::Treble),
            ],
            ..Default::default()
        };
        let profiles = config.resolve_instruments().unwrap();
        assert_eq!(profiles[0].lowest, 62);
        assert_eq!(profiles[1].name, "Recorder");
    }

    #[test]
    fn degenerate_custom_instrument_rejected() {
        let config = ComposerConfig {
            instruments: vec!["Drone".into()],
            custom_instruments: vec![InstrumentProfile::new("Drone", 50, 50)],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::DegenerateRange { .. })
        ));
    }
}
