// Sequence generation: a weighted random walk over a trained model.
//
// A `Walker` first emits its seed (either the caller's states or a window
// drawn from the chain's observed start windows), then samples one symbol at
// a time from the distribution for its last k emitted symbols. When that
// history was never observed in training the chain's back-off answers from a
// shorter history instead; the walk never fails on starvation, it only
// counts how often it happened.
//
// Joint mode runs one walker over full states. Independent mode runs three
// walkers (pitch, duration, velocity) in lockstep, drawing from the shared
// RNG in that order at every step, and glues their outputs back into states.
// All randomness comes from the single `ComposerRng` passed in, so the same
// seed, model and parameters reproduce the same sequence exactly.

use crate::builder::{Dimension, DurationDim, PitchDim, VelocityDim};
use crate::markov::MarkovChain;
use crate::model::{Chains, TrainedModel};
use crate::note::Articulation;
use crate::state::{Dynamic, State};
use markov_composer_prng::ComposerRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::trace;

/// Where a walk starts.
#[derive(Debug, Clone, PartialEq)]
pub enum Seed<S> {
    /// Draw a start window from the chain, weighted by how often each
    /// window occurred in training.
    Random,
    /// Start from these states. They are emitted verbatim as the prefix of
    /// the output; an empty list behaves like `Random`.
    Supplied(Vec<S>),
}

/// Bookkeeping from one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkReport {
    /// Symbols emitted straight from the seed.
    pub seeded: usize,
    /// Symbols drawn from a distribution.
    pub sampled: usize,
    /// Draws whose full history was unseen and were served by a shorter one.
    pub backoffs: usize,
    /// Of those, draws that fell all the way back to the unigram.
    pub unigram_fallbacks: usize,
}

impl WalkReport {
    fn absorb(&mut self, other: WalkReport) {
        self.seeded += other.seeded;
        self.sampled += other.sampled;
        self.backoffs += other.backoffs;
        self.unigram_fallbacks += other.unigram_fallbacks;
    }
}

/// Step-by-step random walk over one chain.
#[derive(Debug)]
pub struct Walker<'a, S> {
    chain: &'a MarkovChain<S>,
    pending: VecDeque<S>,
    history: VecDeque<S>,
    report: WalkReport,
}

impl<'a, S: Ord + Clone> Walker<'a, S> {
    /// Set up a walk. A random seed is drawn here, before the first step.
    pub fn new(chain: &'a MarkovChain<S>, seed: &Seed<S>, rng: &mut ComposerRng) -> Self {
        let pending: VecDeque<S> = match seed {
            Seed::Supplied(states) if !states.is_empty() => states.iter().cloned().collect(),
            _ => chain
                .starts()
                .sample(rng)
                .cloned()
                .or_else(|| chain.unigram().sample(rng).map(|s| vec![s.clone()]))
                .unwrap_or_default()
                .into(),
        };
        Walker {
            chain,
            pending,
            history: VecDeque::with_capacity(chain.order() + 1),
            report: WalkReport::default(),
        }
    }

    /// Emit the next symbol. `None` only for a chain with nothing to sample.
    pub fn step(&mut self, rng: &mut ComposerRng) -> Option<S> {
        let next = match self.pending.pop_front() {
            Some(seeded) => {
                self.report.seeded += 1;
                seeded
            }
            None => {
                let history = self.history.make_contiguous();
                let lookup = self.chain.lookup(history);
                if lookup.order < history.len() {
                    self.report.backoffs += 1;
                    if lookup.order == 0 {
                        self.report.unigram_fallbacks += 1;
                    }
                    trace!(
                        wanted = history.len(),
                        served = lookup.order,
                        "unseen history, backed off"
                    );
                }
                let next = lookup.distribution.sample(rng)?.clone();
                self.report.sampled += 1;
                next
            }
        };
        self.history.push_back(next.clone());
        while self.history.len() > self.chain.order() {
            self.history.pop_front();
        }
        Some(next)
    }

    pub fn report(&self) -> WalkReport {
        self.report
    }
}

/// Walk one chain for `length` symbols.
pub fn walk<S: Ord + Clone>(
    chain: &MarkovChain<S>,
    length: usize,
    seed: &Seed<S>,
    rng: &mut ComposerRng,
) -> (Vec<S>, WalkReport) {
    if length == 0 {
        return (Vec::new(), WalkReport::default());
    }
    let mut walker = Walker::new(chain, seed, rng);
    let mut out = Vec::with_capacity(length);
    while out.len() < length {
        match walker.step(rng) {
            Some(symbol) => out.push(symbol),
            None => break,
        }
    }
    (out, walker.report())
}

/// A generated state sequence and how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSequence {
    pub states: Vec<State>,
    pub report: WalkReport,
}

/// Generate `length` states from `model`.
pub fn generate(
    model: &TrainedModel,
    length: usize,
    seed: &Seed<State>,
    rng: &mut ComposerRng,
) -> GeneratedSequence {
    match model.chains() {
        Chains::Joint { chain } => {
            let (states, report) = walk(chain, length, seed, rng);
            GeneratedSequence { states, report }
        }
        Chains::Independent {
            pitch,
            duration,
            velocity,
        } => generate_independent(pitch, duration, velocity, length, seed, rng),
    }
}

fn generate_independent(
    pitch: &MarkovChain<Option<u8>>,
    duration: &MarkovChain<u32>,
    velocity: &MarkovChain<u8>,
    length: usize,
    seed: &Seed<State>,
    rng: &mut ComposerRng,
) -> GeneratedSequence {
    if length == 0 {
        return GeneratedSequence {
            states: Vec::new(),
            report: WalkReport::default(),
        };
    }
    let mut pitches = Walker::new(pitch, &project_seed::<PitchDim>(seed), rng);
    let mut durations = Walker::new(duration, &project_seed::<DurationDim>(seed), rng);
    let mut velocities = Walker::new(velocity, &project_seed::<VelocityDim>(seed), rng);

    let mut states = Vec::with_capacity(length);
    while states.len() < length {
        let (Some(p), Some(d), Some(v)) = (
            pitches.step(rng),
            durations.step(rng),
            velocities.step(rng),
        ) else {
            break;
        };
        states.push(State {
            pitch: p,
            duration_ticks: d,
            dynamic: Dynamic::from_velocity(v),
            articulation: Articulation::Normal,
            velocity: v,
        });
    }

    let mut report = pitches.report();
    report.absorb(durations.report());
    report.absorb(velocities.report());
    GeneratedSequence { states, report }
}

fn project_seed<D: Dimension>(seed: &Seed<State>) -> Seed<D::Symbol> {
    match seed {
        Seed::Random => Seed::Random,
        Seed::Supplied(states) => Seed::Supplied(states.iter().map(D::project).collect()),
    }
}
