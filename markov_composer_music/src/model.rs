// Trained models and their publication.
//
// A `TrainedModel` is the frozen output of one training run: either a single
// joint chain over full states, or three independent chains (pitch,
// duration, velocity), plus the vocabulary of distinct states seen. It is
// never mutated after construction; a new training run produces a new model.
//
// `ModelHandle` is how a long-lived caller shares "the current model"
// between training and any number of concurrent generation requests. Readers
// take an `Arc` snapshot and keep it for the whole request; training builds
// a complete model off to the side and swaps it in only on success, so a
// reader can never observe a partially built table and a failed run leaves
// the previous model in place.

use crate::builder::{DurationDim, Joint, PitchDim, VelocityDim, build_chain, check_order};
use crate::config::ComposerConfig;
use crate::error::{Error, Result};
use crate::markov::MarkovChain;
use crate::note::Track;
use crate::state::{MAX_PITCH, State};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Joint-state chain vs. three uncorrelated per-attribute chains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Joint,
    Independent,
}

impl GenerationMode {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "joint" => Some(GenerationMode::Joint),
            "independent" => Some(GenerationMode::Independent),
            _ => None,
        }
    }
}

/// The chains of a model, shaped by its mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Chains {
    Joint {
        chain: MarkovChain<State>,
    },
    Independent {
        pitch: MarkovChain<Option<u8>>,
        duration: MarkovChain<u32>,
        velocity: MarkovChain<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    order: usize,
    chains: Chains,
    vocabulary: BTreeSet<State>,
}

impl TrainedModel {
    /// Count and normalize the given quantized sources. Nothing is returned
    /// unless every chain the mode needs was built.
    pub fn build(sources: &[Vec<State>], order: usize, mode: GenerationMode) -> Result<Self> {
        check_order(order)?;
        if sources.iter().all(|s| s.is_empty()) {
            return Err(Error::EmptyInput);
        }
        let chains = match mode {
            GenerationMode::Joint => Chains::Joint {
                chain: build_chain::<Joint>(sources, order)?,
            },
            GenerationMode::Independent => Chains::Independent {
                pitch: build_chain::<PitchDim>(sources, order)?,
                duration: build_chain::<DurationDim>(sources, order)?,
                velocity: build_chain::<VelocityDim>(sources, order)?,
            },
        };
        let vocabulary: BTreeSet<State> = sources.iter().flatten().copied().collect();
        info!(
            ?mode,
            order,
            sources = sources.len(),
            vocabulary = vocabulary.len(),
            "trained model"
        );
        Ok(TrainedModel {
            order,
            chains,
            vocabulary,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn mode(&self) -> GenerationMode {
        match self.chains {
            Chains::Joint { .. } => GenerationMode::Joint,
            Chains::Independent { .. } => GenerationMode::Independent,
        }
    }

    pub fn chains(&self) -> &Chains {
        &self.chains
    }

    /// Distinct quantized states seen in training.
    pub fn vocabulary(&self) -> &BTreeSet<State> {
        &self.vocabulary
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and sanity-check a serialized model.
    pub fn from_json(json: &str) -> Result<Self> {
        let model: TrainedModel = serde_json::from_str(json)?;
        model.check()?;
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    fn check(&self) -> Result<()> {
        check_order(self.order)?;
        let consistent = match &self.chains {
            Chains::Joint { chain } => chain.order() == self.order && chain.is_well_formed(),
            Chains::Independent {
                pitch,
                duration,
                velocity,
            } => {
                [pitch.order(), duration.order(), velocity.order()]
                    .iter()
                    .all(|&o| o == self.order)
                    && pitch.is_well_formed()
                    && duration.is_well_formed()
                    && velocity.is_well_formed()
            }
        };
        let midi = |pitch: Option<u8>| pitch.is_none_or(|p| p <= MAX_PITCH);
        let pitches_valid = self.vocabulary.iter().all(|s| midi(s.pitch))
            && match &self.chains {
                Chains::Joint { chain } => chain.vocabulary().iter().all(|s| midi(s.pitch)),
                Chains::Independent { pitch, .. } => pitch.vocabulary().iter().all(|&p| midi(p)),
            };
        if !consistent || !pitches_valid || self.vocabulary.is_empty() {
            return Err(Error::InvalidConfig(
                "serialized model is inconsistent".into(),
            ));
        }
        Ok(())
    }
}

/// Shared, atomically replaceable reference to the current model.
#[derive(Debug, Clone, Default)]
pub struct ModelHandle {
    current: Arc<RwLock<Option<Arc<TrainedModel>>>>,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: TrainedModel) -> Self {
        let handle = Self::new();
        handle.publish(model);
        handle
    }

    /// Snapshot of the current model, if one has been published. The
    /// snapshot stays valid even if a newer model is published meanwhile.
    pub fn current(&self) -> Option<Arc<TrainedModel>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current model wholesale.
    pub fn publish(&self, model: TrainedModel) -> Arc<TrainedModel> {
        let model = Arc::new(model);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(model.clone());
        info!(order = model.order(), mode = ?model.mode(), "published model");
        model
    }

    /// Train on `tracks` and publish the result. On failure the previously
    /// published model (if any) stays current.
    pub fn retrain(&self, tracks: &[Track], config: &ComposerConfig) -> Result<Arc<TrainedModel>> {
        let model = crate::pipeline::train(tracks, config)?;
        Ok(self.publish(model))
    }
}
