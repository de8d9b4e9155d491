// Markov Composer
//
// Learns probabilistic transition patterns from parsed note data and samples
// new melodic lines from them. Data flows strictly forward:
// extract -> quantize -> build -> generate -> range-adapt.
//
// Architecture:
// - note.rs: Parsed input records (NoteEvent, Track, Articulation)
// - state.rs: Discrete note states, dynamics, pitch naming
// - extract.rs: Note events -> one ordered voice of raw states (chord reduction,
//   rest inference)
// - quantize.rs: Duration grid snapping and velocity bucketing
// - markov.rs: Generic order-k chains with back-off lookup
// - builder.rs: Transition counting per projection (joint or per-dimension)
// - model.rs: Trained models, JSON persistence, atomically swapped handle
// - generate.rs: Seeded weighted random walk (joint and independent modes)
// - instrument.rs: Instrument profiles, preset registry, ensembles
// - range.rs: Octave-shifting generated pitches into an instrument's range
// - config.rs: JSON-loadable configuration surface
// - pipeline.rs: Train + compose entry points and the output records
// - corpus.rs: Built-in training melody
//
// Output is deterministic given a seed: all randomness comes from one
// `ComposerRng` threaded through the run.

pub mod builder;
pub mod config;
pub mod corpus;
pub mod error;
pub mod extract;
pub mod generate;
pub mod instrument;
pub mod markov;
pub mod model;
pub mod note;
pub mod pipeline;
pub mod quantize;
pub mod range;
pub mod state;

pub use error::{Error, Result};
pub use markov_composer_prng::ComposerRng;
