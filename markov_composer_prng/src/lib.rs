// Seedable random source for Markov composition runs.
//
// xoshiro256++ (Blackman & Vigna, 2019) with the state expanded from a single
// `u64` by SplitMix64. Written out by hand so a seed produces the same stream
// on every platform and toolchain; the composer's reproducibility guarantee
// (same seed + same model + same parameters = same output, bit for bit)
// rests on this crate alone.
//
// One `ComposerRng` is created per generation request and threaded by
// `&mut` through seeding, every weighted draw, and every instrument part of
// that request. Nothing else in the workspace is allowed to produce
// randomness.
//
// Keep integer-only arithmetic in the generator core. The float helpers
// below only convert already-generated bits.

use serde::{Deserialize, Serialize};

/// xoshiro256++ generator state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerRng {
    s: [u64; 4],
}

impl ComposerRng {
    /// Seed a generator. Equal seeds give equal streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Uniform `f64` in [0, 1), built from the top 53 bits.
    ///
    /// This is the value fed to every cumulative-weight draw in the
    /// generator, so its exact construction is part of the reproducibility
    /// contract.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Index drawn proportionally to `weights`.
    ///
    /// Walks the cumulative sum against one `next_f64()` draw. Returns `None`
    /// when the weights are empty or sum to zero (no randomness consumed).
    /// Negative and non-finite weights count as zero.
    pub fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let total: f64 = weights.iter().copied().map(clean).sum();
        if total <= 0.0 {
            return None;
        }
        let target = self.next_f64() * total;
        let mut cumulative = 0.0;
        let mut last_positive = None;
        for (i, &w) in weights.iter().enumerate() {
            let w = clean(w);
            if w == 0.0 {
                continue;
            }
            cumulative += w;
            last_positive = Some(i);
            if cumulative > target {
                return Some(i);
            }
        }
        // Rounding can leave `cumulative` a hair below `target`.
        last_positive
    }
}

/// SplitMix64 step, used only to expand the seed.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = ComposerRng::new(7);
        let mut b = ComposerRng::new(7);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = ComposerRng::new(7);
        let mut b = ComposerRng::new(8);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn f64_in_unit_range() {
        let mut rng = ComposerRng::new(2024);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "f64 out of range: {v}");
        }
    }

    #[test]
    fn weighted_index_skips_zero_weights() {
        let mut rng = ComposerRng::new(99);
        for _ in 0..1000 {
            let i = rng.weighted_index(&[0.0, 2.0, 0.0, 1.0]).unwrap();
            assert!(i == 1 || i == 3, "picked zero-weight index {i}");
        }
    }

    #[test]
    fn weighted_index_single_candidate_is_certain() {
        let mut rng = ComposerRng::new(1);
        for _ in 0..100 {
            assert_eq!(rng.weighted_index(&[0.0, 0.0, 5.0]), Some(2));
        }
    }

    #[test]
    fn weighted_index_rejects_empty_and_zero_mass() {
        let mut rng = ComposerRng::new(3);
        assert_eq!(rng.weighted_index(&[]), None);
        assert_eq!(rng.weighted_index(&[0.0, -1.0, f64::NAN]), None);
    }

    #[test]
    fn weighted_index_tracks_proportions() {
        let mut rng = ComposerRng::new(42);
        let n = 20_000;
        let mut hits = 0;
        for _ in 0..n {
            if rng.weighted_index(&[3.0, 1.0]) == Some(0) {
                hits += 1;
            }
        }
        let pct = hits as f64 / n as f64;
        assert!(
            (0.72..0.78).contains(&pct),
            "expected ~75% for weight 3:1, got {:.1}%",
            pct * 100.0
        );
    }

    #[test]
    fn state_survives_serialization() {
        let mut rng = ComposerRng::new(42);
        for _ in 0..50 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: ComposerRng = serde_json::from_str(&json).unwrap();
        for _ in 0..50 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
