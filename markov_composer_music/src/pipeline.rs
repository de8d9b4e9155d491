// End-to-end pipeline: tracks -> model(s) -> one adapted part per instrument.
//
// Training is Extract -> Quantize -> Build and yields a `TrainedModel`.
// Composition walks a model once per requested instrument (all walks share
// the caller's RNG, in instrument order) and range-adapts each walk to its
// instrument. The resulting `Composition` is the hand-off record for
// whatever assembles, renders or exports the score.
//
// With `voice_mappings` each instrument learns only from the tracks named by
// its mapping (same-named tracks from every corpus file are pooled). One
// model is trained per mapped voice and shared by every instrument mapped to
// it, doublings included. Unmapped instruments share one model trained on
// the whole corpus.

use crate::builder::check_order;
use crate::config::ComposerConfig;
use crate::error::{Error, Result};
use crate::extract::extract_tracks;
use crate::generate::{Seed, WalkReport, generate};
use crate::instrument::{InstrumentProfile, base_name};
use crate::model::{GenerationMode, TrainedModel};
use crate::note::{Articulation, Track};
use crate::quantize::Quantizer;
use crate::range::adapt_states;
use crate::state::{Dynamic, State};
use markov_composer_prng::ComposerRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Extract and quantize every track into a training source.
pub fn quantized_sources(tracks: &[Track], config: &ComposerConfig) -> Result<Vec<Vec<State>>> {
    let quantizer = Quantizer::from_config(&config.quantization)?;
    let voices = extract_tracks(tracks, &config.extraction)?;
    Ok(voices.iter().map(|v| quantizer.quantize_all(v)).collect())
}

/// Train a model on `tracks` with the order and mode from `config`.
pub fn train(tracks: &[Track], config: &ComposerConfig) -> Result<TrainedModel> {
    check_order(config.order)?;
    let sources = quantized_sources(tracks, config)?;
    TrainedModel::build(&sources, config.order, config.mode)
}

/// One generated note as handed to score assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedNote {
    /// Sounding pitch, `None` for a rest.
    pub pitch: Option<u8>,
    /// Pitch as notated for the instrument's transposition.
    pub written_pitch: Option<u8>,
    /// Duration in beats.
    pub duration: f64,
    pub velocity: u8,
    pub dynamic: Dynamic,
    pub articulation: Articulation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPart {
    pub instrument: InstrumentProfile,
    pub notes: Vec<GeneratedNote>,
    pub report: WalkReport,
}

impl GeneratedPart {
    fn from_states(instrument: InstrumentProfile, states: &[State], report: WalkReport) -> Self {
        let notes = states
            .iter()
            .map(|s| GeneratedNote {
                pitch: s.pitch,
                written_pitch: s.pitch.map(|p| instrument.written(p)),
                duration: s.duration_beats(),
                velocity: s.velocity,
                dynamic: s.dynamic,
                articulation: s.articulation,
            })
            .collect();
        GeneratedPart {
            instrument,
            notes,
            report,
        }
    }

    pub fn pitches(&self) -> Vec<Option<u8>> {
        self.notes.iter().map(|n| n.pitch).collect()
    }

    /// Total length in beats.
    pub fn beats(&self) -> f64 {
        self.notes.iter().map(|n| n.duration).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub tempo_bpm: u16,
    pub order: usize,
    pub mode: GenerationMode,
    pub parts: Vec<GeneratedPart>,
}

/// Generate one part per configured instrument from `model`.
///
/// The model's own order and mode govern the walk; `config` supplies the
/// length, the instruments and the tempo.
pub fn compose(
    model: &TrainedModel,
    config: &ComposerConfig,
    rng: &mut ComposerRng,
) -> Result<Composition> {
    let instruments = config.resolve_instruments()?;
    let mut parts = Vec::with_capacity(instruments.len());
    for instrument in instruments {
        parts.push(generate_part(instrument, model, config.length, rng)?);
    }
    Ok(Composition {
        tempo_bpm: config.tempo_bpm,
        order: model.order(),
        mode: model.mode(),
        parts,
    })
}

/// Each configured instrument paired with the model it generates from.
pub type PartModels = Vec<(InstrumentProfile, Arc<TrainedModel>)>;

/// Train the model for every configured instrument, honoring
/// `voice_mappings`. A mapping may name the full instrument (`"Flute #2"`)
/// or its base name (`"Flute"`); the full name wins.
pub fn train_parts(tracks: &[Track], config: &ComposerConfig) -> Result<PartModels> {
    let instruments = config.resolve_instruments()?;
    let mut by_voice: BTreeMap<&str, Arc<TrainedModel>> = BTreeMap::new();
    let mut shared: Option<Arc<TrainedModel>> = None;
    let mut parts = Vec::with_capacity(instruments.len());
    for instrument in instruments {
        let mapping = config
            .voice_mappings
            .get(&instrument.name)
            .or_else(|| config.voice_mappings.get(base_name(&instrument.name)));
        let model = match mapping {
            Some(voice) => match by_voice.get(voice.as_str()).cloned() {
                Some(model) => model,
                None => {
                    let voice_tracks: Vec<Track> = tracks
                        .iter()
                        .filter(|t| t.name == *voice)
                        .cloned()
                        .collect();
                    if voice_tracks.is_empty() {
                        return Err(Error::InvalidConfig(format!(
                            "'{}' is mapped to voice '{}', which no track is named",
                            instrument.name, voice
                        )));
                    }
                    let model = Arc::new(train(&voice_tracks, config)?);
                    info!(voice = %voice, tracks = voice_tracks.len(), "trained voice model");
                    by_voice.insert(voice.as_str(), model.clone());
                    model
                }
            },
            None => match shared.clone() {
                Some(model) => model,
                None => {
                    let model = Arc::new(train(tracks, config)?);
                    shared = Some(model.clone());
                    model
                }
            },
        };
        parts.push((instrument, model));
    }
    Ok(parts)
}

/// Generate one part per entry of `parts`, each from its own model.
pub fn compose_parts(
    parts: &[(InstrumentProfile, Arc<TrainedModel>)],
    config: &ComposerConfig,
    rng: &mut ComposerRng,
) -> Result<Composition> {
    let mut generated = Vec::with_capacity(parts.len());
    for (instrument, model) in parts {
        generated.push(generate_part(instrument.clone(), model, config.length, rng)?);
    }
    Ok(Composition {
        tempo_bpm: config.tempo_bpm,
        order: config.order,
        mode: config.mode,
        parts: generated,
    })
}

fn generate_part(
    instrument: InstrumentProfile,
    model: &TrainedModel,
    length: usize,
    rng: &mut ComposerRng,
) -> Result<GeneratedPart> {
    let generated = generate(model, length, &Seed::Random, rng);
    let adapted = adapt_states(&generated.states, &instrument)?;
    debug!(
        instrument = %instrument.name,
        notes = adapted.len(),
        backoffs = generated.report.backoffs,
        "generated part"
    );
    Ok(GeneratedPart::from_states(instrument, &adapted, generated.report))
}
