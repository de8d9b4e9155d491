// Matrix builder: counts transitions in quantized sequences and normalizes
// them into a `MarkovChain`.
//
// Joint and independent-dimension modes share this one code path. What
// differs is the `Dimension` the sequences are projected through before
// counting: the whole `State` for joint mode, or a single attribute (pitch,
// duration, velocity) for each of the three independent chains.
//
// Each source sequence is counted on its own (no transition spans two
// sources) and counts accumulate in ordered maps, so the normalized result
// does not depend on the order in which sources are fed in.

use crate::error::{Error, Result};
use crate::markov::{Distribution, MarkovChain, TransitionTable};
use crate::state::State;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::{debug, warn};

pub const MIN_ORDER: usize = 1;
pub const MAX_ORDER: usize = 3;

/// Reject orders outside 1..=3.
pub fn check_order(order: usize) -> Result<()> {
    if (MIN_ORDER..=MAX_ORDER).contains(&order) {
        Ok(())
    } else {
        Err(Error::InvalidOrder(order))
    }
}

/// Projection of a `State` onto the symbol a chain is built over.
pub trait Dimension {
    type Symbol: Ord + Clone + Debug;
    const NAME: &'static str;

    fn project(state: &State) -> Self::Symbol;
}

/// The full multi-attribute state.
pub struct Joint;

/// Absolute pitch (`None` = rest).
pub struct PitchDim;

/// Quantized duration in ticks.
pub struct DurationDim;

/// Representative bucket velocity.
pub struct VelocityDim;

impl Dimension for Joint {
    type Symbol = State;
    const NAME: &'static str = "joint";

    fn project(state: &State) -> State {
        *state
    }
}

impl Dimension for PitchDim {
    type Symbol = Option<u8>;
    const NAME: &'static str = "pitch";

    fn project(state: &State) -> Option<u8> {
        state.pitch
    }
}

impl Dimension for DurationDim {
    type Symbol = u32;
    const NAME: &'static str = "duration";

    fn project(state: &State) -> u32 {
        state.duration_ticks
    }
}

impl Dimension for VelocityDim {
    type Symbol = u8;
    const NAME: &'static str = "velocity";

    fn project(state: &State) -> u8 {
        state.velocity
    }
}

type HistoryCounts<S> = BTreeMap<Vec<S>, BTreeMap<S, u64>>;

/// Raw counts for one chain, accumulated across sources.
#[derive(Debug, Clone)]
pub struct ChainCounts<S> {
    order: usize,
    /// `transitions[j - 1]` counts histories of length `j`.
    transitions: Vec<HistoryCounts<S>>,
    unigram: BTreeMap<S, u64>,
    starts: BTreeMap<Vec<S>, u64>,
    sources: usize,
    longest: usize,
}

impl<S: Ord + Clone + Debug> ChainCounts<S> {
    pub fn new(order: usize) -> Result<Self> {
        check_order(order)?;
        Ok(ChainCounts {
            order,
            transitions: vec![BTreeMap::new(); order],
            unigram: BTreeMap::new(),
            starts: BTreeMap::new(),
            sources: 0,
            longest: 0,
        })
    }

    /// Count one source. Returns the number of order-k transitions it
    /// contributed; sources too short to contribute any are skipped whole.
    pub fn observe(&mut self, sequence: &[S]) -> usize {
        self.sources += 1;
        self.longest = self.longest.max(sequence.len());
        let k = self.order;
        if sequence.len() < k + 1 {
            warn!(
                len = sequence.len(),
                order = k,
                "training source too short for chain order, skipped"
            );
            return 0;
        }

        for symbol in sequence {
            *self.unigram.entry(symbol.clone()).or_insert(0) += 1;
        }
        for window in sequence.windows(k) {
            *self.starts.entry(window.to_vec()).or_insert(0) += 1;
        }
        for len in 1..=k {
            let table = &mut self.transitions[len - 1];
            for window in sequence.windows(len + 1) {
                let (history, next) = window.split_at(len);
                *table
                    .entry(history.to_vec())
                    .or_default()
                    .entry(next[0].clone())
                    .or_insert(0) += 1;
            }
        }
        sequence.len() - k
    }

    /// Normalize every count map into probabilities.
    pub fn finish(self) -> Result<MarkovChain<S>> {
        if self.sources == 0 {
            return Err(Error::EmptyInput);
        }
        let insufficient = Error::InsufficientData {
            order: self.order,
            longest: self.longest,
        };
        let (Some(unigram), Some(starts)) = (
            Distribution::from_counts(&self.unigram),
            Distribution::from_counts(&self.starts),
        ) else {
            return Err(insufficient);
        };
        let tables: Vec<TransitionTable<S>> = self
            .transitions
            .iter()
            .map(TransitionTable::from_counts)
            .collect();
        if tables.last().is_none_or(|t| t.is_empty()) {
            return Err(insufficient);
        }
        Ok(MarkovChain::from_parts(self.order, tables, unigram, starts))
    }
}

/// Build one chain over dimension `D` from any number of quantized sources.
pub fn build_chain<D: Dimension>(
    sources: &[Vec<State>],
    order: usize,
) -> Result<MarkovChain<D::Symbol>> {
    let mut counts = ChainCounts::new(order)?;
    if sources.is_empty() {
        return Err(Error::EmptyInput);
    }
    let mut transitions = 0;
    for source in sources {
        let projected: Vec<D::Symbol> = source.iter().map(D::project).collect();
        transitions += counts.observe(&projected);
    }
    let chain = counts.finish()?;
    debug!(
        dimension = D::NAME,
        order,
        sources = sources.len(),
        transitions,
        vocabulary = chain.vocabulary().len(),
        "built chain"
    );
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Articulation;
    use crate::state::{Dynamic, TICKS_PER_QUARTER};

    fn st(pitch: u8) -> State {
        State {
            pitch: Some(pitch),
            duration_ticks: TICKS_PER_QUARTER,
            dynamic: Dynamic::Mf,
            articulation: Articulation::Normal,
            velocity: 72,
        }
    }

    fn seq(pitches: &[u8]) -> Vec<State> {
        pitches.iter().map(|&p| st(p)).collect()
    }

    #[test]
    fn order_bounds() {
        assert!(matches!(check_order(0), Err(Error::InvalidOrder(0))));
        assert!(matches!(check_order(4), Err(Error::InvalidOrder(4))));
        assert!(check_order(1).is_ok() && check_order(3).is_ok());
        assert!(matches!(
            build_chain::<Joint>(&[seq(&[60, 62])], 7),
            Err(Error::InvalidOrder(7))
        ));
    }

    #[test]
    fn counts_match_worked_example() {
        // C4 D4 E4 C4 at order 1.
        let chain = build_chain::<Joint>(&[seq(&[60, 62, 64, 60])], 1).unwrap();
        let table = chain.table(1).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(&[st(60)]).unwrap().probability(&st(62)), 1.0);
        assert_eq!(table.get(&[st(62)]).unwrap().probability(&st(64)), 1.0);
        assert_eq!(table.get(&[st(64)]).unwrap().probability(&st(60)), 1.0);
        assert_eq!(chain.unigram().observations(), 4);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let chain =
            build_chain::<PitchDim>(&[seq(&[60, 62, 60, 64, 60, 62, 67, 60, 62])], 2).unwrap();
        for order in 1..=2 {
            for row in chain.table(order).unwrap().rows() {
                assert!((row.next.total_probability() - 1.0).abs() < 1e-9);
            }
        }
        assert!((chain.unigram().total_probability() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn insufficient_data() {
        let err = build_chain::<Joint>(&[seq(&[60, 62])], 2).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientData {
                order: 2,
                longest: 2
            }
        ));
    }

    #[test]
    fn empty_source_list() {
        assert!(matches!(
            build_chain::<Joint>(&[], 1),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn short_sources_skipped_when_others_suffice() {
        let chain = build_chain::<Joint>(&[seq(&[60]), seq(&[60, 62, 64])], 2).unwrap();
        assert_eq!(chain.vocabulary().len(), 3);
    }

    #[test]
    fn sources_do_not_bleed_into_each_other() {
        let chain = build_chain::<PitchDim>(&[seq(&[60, 62]), seq(&[64, 65])], 1).unwrap();
        let table = chain.table(1).unwrap();
        // No 62 -> 64 transition across the source boundary.
        assert!(table.get(&[Some(62)]).is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn projections_pick_one_attribute() {
        let mut s = st(61);
        s.duration_ticks = 240;
        s.velocity = 40;
        assert_eq!(PitchDim::project(&s), Some(61));
        assert_eq!(DurationDim::project(&s), 240);
        assert_eq!(VelocityDim::project(&s), 40);
        assert_eq!(Joint::project(&s), s);
    }

    #[test]
    fn start_windows_have_chain_length() {
        let chain = build_chain::<PitchDim>(&[seq(&[60, 62, 64, 65])], 3).unwrap();
        assert!(chain.starts().symbols().iter().all(|w| w.len() == 3));
        assert_eq!(chain.starts().observations(), 2);
    }
}
