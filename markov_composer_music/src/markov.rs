// Markov transition tables with Katz-style back-off.
//
// A `MarkovChain<S>` is generic over the symbol it models: the full joint
// `State`, or a single projected attribute (pitch, duration, velocity) in
// independent-dimension mode. One chain of order k holds:
// - one `TransitionTable` per order j in 1..=k (history of the last j
//   symbols -> distribution of the next symbol),
// - the order-0 unigram distribution over all observed symbols,
// - the distribution of observed length-k windows, used to seed walks.
//
// Lookup (starvation policy): the last k symbols of the history are tried
// first; if that history was never observed the chain backs off to the last
// k-1, and so on down to the unigram, which is never empty for a built
// chain. Lookup only ever reads the last k symbols, so anything earlier in
// the history cannot influence the result.
//
// Tables are stored as sorted row vectors rather than maps so they serialize
// to plain JSON arrays (history keys are sequences, which JSON objects can't
// key on). Lookup is a binary search.

use markov_composer_prng::ComposerRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalized distribution over next symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution<S> {
    /// Distinct outcomes in ascending order.
    symbols: Vec<S>,
    /// `probabilities[i]` belongs to `symbols[i]`; the values sum to 1.
    probabilities: Vec<f64>,
    /// Raw number of observations behind the distribution.
    observations: u64,
}

impl<S: Ord + Clone> Distribution<S> {
    /// Normalize a count map. `None` when there is nothing to normalize.
    pub fn from_counts(counts: &BTreeMap<S, u64>) -> Option<Self> {
        let total: u64 = counts.values().sum();
        if total == 0 {
            return None;
        }
        let mut symbols = Vec::with_capacity(counts.len());
        let mut probabilities = Vec::with_capacity(counts.len());
        for (symbol, &count) in counts {
            if count == 0 {
                continue;
            }
            symbols.push(symbol.clone());
            probabilities.push(count as f64 / total as f64);
        }
        Some(Distribution {
            symbols,
            probabilities,
            observations: total,
        })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn observations(&self) -> u64 {
        self.observations
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S, f64)> {
        self.symbols.iter().zip(self.probabilities.iter().copied())
    }

    pub fn symbols(&self) -> &[S] {
        &self.symbols
    }

    pub fn probability(&self, symbol: &S) -> f64 {
        match self.symbols.binary_search(symbol) {
            Ok(i) => self.probabilities[i],
            Err(_) => 0.0,
        }
    }

    pub fn total_probability(&self) -> f64 {
        self.probabilities.iter().sum()
    }

    /// Draw one symbol proportionally to its probability.
    pub fn sample(&self, rng: &mut ComposerRng) -> Option<&S> {
        rng.weighted_index(&self.probabilities)
            .and_then(|i| self.symbols.get(i))
    }

    /// Internal consistency check for distributions that came from disk.
    fn is_well_formed(&self) -> bool {
        !self.symbols.is_empty()
            && self.symbols.len() == self.probabilities.len()
            && self.symbols.windows(2).all(|w| w[0] < w[1])
            && self.probabilities.iter().all(|p| p.is_finite() && *p >= 0.0)
            && (self.total_probability() - 1.0).abs() < 1e-6
    }
}

/// One row of a transition table: a history and what followed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow<S> {
    pub history: Vec<S>,
    pub next: Distribution<S>,
}

/// History -> next-symbol distribution, for one fixed history length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionTable<S> {
    /// Sorted by `history`.
    rows: Vec<TableRow<S>>,
}

impl<S: Ord + Clone> TransitionTable<S> {
    pub fn from_counts(counts: &BTreeMap<Vec<S>, BTreeMap<S, u64>>) -> Self {
        let rows = counts
            .iter()
            .filter_map(|(history, next)| {
                Distribution::from_counts(next).map(|next| TableRow {
                    history: history.clone(),
                    next,
                })
            })
            .collect();
        TransitionTable { rows }
    }

    pub fn get(&self, history: &[S]) -> Option<&Distribution<S>> {
        self.rows
            .binary_search_by(|row| row.history.as_slice().cmp(history))
            .ok()
            .map(|i| &self.rows[i].next)
    }

    pub fn rows(&self) -> &[TableRow<S>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn is_well_formed(&self, history_len: usize) -> bool {
        self.rows.windows(2).all(|w| w[0].history < w[1].history)
            && self
                .rows
                .iter()
                .all(|r| r.history.len() == history_len && r.next.is_well_formed())
    }
}

/// Result of resolving a history against a chain.
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a, S> {
    pub distribution: &'a Distribution<S>,
    /// History length that matched; 0 means the unigram served the lookup.
    pub order: usize,
}

/// Order-k chain over symbols `S`, with all lower orders for back-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovChain<S> {
    order: usize,
    /// `tables[j - 1]` is keyed by histories of length `j`.
    tables: Vec<TransitionTable<S>>,
    unigram: Distribution<S>,
    /// Observed length-`order` windows, weighted by frequency.
    starts: Distribution<Vec<S>>,
}

impl<S: Ord + Clone> MarkovChain<S> {
    pub(crate) fn from_parts(
        order: usize,
        tables: Vec<TransitionTable<S>>,
        unigram: Distribution<S>,
        starts: Distribution<Vec<S>>,
    ) -> Self {
        MarkovChain {
            order,
            tables,
            unigram,
            starts,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Table for histories of exactly `order` symbols (1..=k).
    pub fn table(&self, order: usize) -> Option<&TransitionTable<S>> {
        order.checked_sub(1).and_then(|i| self.tables.get(i))
    }

    pub fn unigram(&self) -> &Distribution<S> {
        &self.unigram
    }

    pub fn starts(&self) -> &Distribution<Vec<S>> {
        &self.starts
    }

    /// Distinct symbols seen in training, ascending.
    pub fn vocabulary(&self) -> &[S] {
        self.unigram.symbols()
    }

    /// Resolve the distribution for the next symbol after `history`,
    /// backing off to shorter suffixes when a history was never observed.
    pub fn lookup(&self, history: &[S]) -> Lookup<'_, S> {
        let start = history.len().saturating_sub(self.order);
        let window = &history[start..];
        for len in (1..=window.len()).rev() {
            let suffix = &window[window.len() - len..];
            if let Some(distribution) = self.table(len).and_then(|t| t.get(suffix)) {
                return Lookup {
                    distribution,
                    order: len,
                };
            }
        }
        Lookup {
            distribution: &self.unigram,
            order: 0,
        }
    }

    /// Probability of `next` following `history` under the back-off lookup.
    pub fn probability(&self, history: &[S], next: &S) -> f64 {
        self.lookup(history).distribution.probability(next)
    }

    /// Structural check for chains loaded from disk.
    pub(crate) fn is_well_formed(&self) -> bool {
        (1..=3).contains(&self.order)
            && self.tables.len() == self.order
            && self
                .tables
                .iter()
                .enumerate()
                .all(|(i, t)| t.is_well_formed(i + 1))
            && self.unigram.is_well_formed()
            && self.starts.is_well_formed()
    }
}
