// Quantization: continuous note attributes -> finite buckets.
//
// Durations snap to the nearest value of a `DurationGrid`; velocities fall
// into one of a handful of `DynamicScale` buckets and are replaced by the
// bucket's center. Pitch is left alone (melodic identity matters more than
// a small alphabet). Everything here is a pure function of its inputs.

use crate::error::{Error, Result};
use crate::state::{Dynamic, RawState, State, TICKS_PER_QUARTER};
use serde::{Deserialize, Serialize};

/// Upper bound on the number of allowed durations in a grid.
pub const MAX_GRID_VALUES: usize = 256;

/// User-facing quantization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeConfig {
    /// Smallest duration in beats; the grid is its multiples.
    pub step: f64,
    /// Longest duration in beats.
    pub longest: f64,
    /// Explicit allowed durations in beats. When set, `step` and `longest`
    /// are ignored.
    pub grid: Option<Vec<f64>>,
    /// Number of velocity buckets (5..=8).
    pub dynamic_levels: u8,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        QuantizeConfig {
            step: 0.5,
            longest: 4.0,
            grid: None,
            dynamic_levels: 8,
        }
    }
}

/// Sorted set of allowed durations, in beats.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationGrid {
    values: Vec<f64>,
}

impl DurationGrid {
    /// `step, 2*step, ...` up to and including `longest`.
    pub fn uniform(step: f64, longest: f64) -> Result<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "quantization step must be positive, got {step}"
            )));
        }
        if !(longest.is_finite() && longest >= step) {
            return Err(Error::InvalidConfig(format!(
                "longest duration {longest} is shorter than the step {step}"
            )));
        }
        let count = (longest / step + 1e-9).floor();
        if count > MAX_GRID_VALUES as f64 {
            return Err(Error::InvalidConfig(format!(
                "step {step} gives more than {MAX_GRID_VALUES} durations up to {longest}"
            )));
        }
        let count = count as usize;
        Ok(DurationGrid {
            values: (1..=count).map(|k| k as f64 * step).collect(),
        })
    }

    /// An explicit grid. Non-positive and non-finite values are dropped.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Result<Self> {
        let mut values: Vec<f64> = values
            .into_iter()
            .filter(|v| v.is_finite() && *v > 0.0)
            .collect();
        values.sort_by(f64::total_cmp);
        values.dedup();
        if values.is_empty() {
            return Err(Error::InvalidConfig("duration grid is empty".into()));
        }
        if values.len() > MAX_GRID_VALUES {
            return Err(Error::InvalidConfig(format!(
                "duration grid has {} values, at most {MAX_GRID_VALUES} allowed",
                values.len()
            )));
        }
        Ok(DurationGrid { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Nearest grid value. Ties go to the shorter value; anything outside
    /// the grid clamps to its ends; non-finite input clamps to the shortest.
    pub fn snap(&self, beats: f64) -> f64 {
        let shortest = self.values[0];
        if !beats.is_finite() {
            return shortest;
        }
        let mut best = shortest;
        let mut best_distance = (beats - shortest).abs();
        for &v in &self.values[1..] {
            let distance = (beats - v).abs();
            if distance < best_distance {
                best = v;
                best_distance = distance;
            }
        }
        best
    }

    pub fn snap_ticks(&self, beats: f64) -> u32 {
        (self.snap(beats) * TICKS_PER_QUARTER as f64).round() as u32
    }
}

/// Equal-width velocity buckets across 0..=127.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicScale {
    levels: u8,
}

impl DynamicScale {
    pub fn new(levels: u8) -> Result<Self> {
        if !(5..=8).contains(&levels) {
            return Err(Error::InvalidConfig(format!(
                "dynamic levels must be in 5..=8, got {levels}"
            )));
        }
        Ok(DynamicScale { levels })
    }

    pub fn bucket(self, velocity: u8) -> u8 {
        (velocity.min(127) as u32 * self.levels as u32 / 128) as u8
    }

    /// Center velocity of a bucket.
    pub fn representative(self, bucket: u8) -> u8 {
        let bucket = bucket.min(self.levels - 1) as u32;
        ((2 * bucket + 1) * 64 / self.levels as u32).min(127) as u8
    }

    /// Snap a raw velocity to its bucket's center.
    pub fn snap(self, velocity: u8) -> u8 {
        self.representative(self.bucket(velocity))
    }
}

/// Grid + scale, applied together to every raw state.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantizer {
    pub grid: DurationGrid,
    pub dynamics: DynamicScale,
}

impl Quantizer {
    pub fn from_config(config: &QuantizeConfig) -> Result<Self> {
        Ok(Quantizer {
            grid: match &config.grid {
                Some(values) => DurationGrid::from_values(values.iter().copied())?,
                None => DurationGrid::uniform(config.step, config.longest)?,
            },
            dynamics: DynamicScale::new(config.dynamic_levels)?,
        })
    }

    pub fn quantize(&self, raw: &RawState) -> State {
        let velocity = self.dynamics.snap(raw.velocity);
        State {
            pitch: raw.pitch,
            duration_ticks: self.grid.snap_ticks(raw.duration),
            dynamic: Dynamic::from_velocity(velocity),
            articulation: raw.articulation,
            velocity,
        }
    }

    pub fn quantize_all(&self, raw: &[RawState]) -> Vec<State> {
        raw.iter().map(|r| self.quantize(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Articulation;

    #[test]
    fn uniform_grid_values() {
        let grid = DurationGrid::uniform(0.5, 2.0).unwrap();
        assert_eq!(grid.values(), &[0.5, 1.0, 1.5, 2.0]);
        let grid = DurationGrid::uniform(0.25, 4.0).unwrap();
        assert_eq!(grid.values().len(), 16);
    }

    #[test]
    fn bad_grids_rejected() {
        assert!(DurationGrid::uniform(0.0, 4.0).is_err());
        assert!(DurationGrid::uniform(1.0, 0.5).is_err());
        assert!(DurationGrid::from_values([-1.0, f64::NAN]).is_err());
        // Positive but absurdly fine steps must not try to allocate the grid.
        assert!(matches!(
            DurationGrid::uniform(1e-300, 4.0),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            DurationGrid::uniform(1e-9, 4.0),
            Err(Error::InvalidConfig(_))
        ));
        assert!(DurationGrid::uniform(4.0 / 256.0, 4.0).is_ok());
        let too_many = (1..=300).map(|k| k as f64 / 64.0);
        assert!(DurationGrid::from_values(too_many).is_err());
    }

    #[test]
    fn config_grid_overrides_step() {
        let config = QuantizeConfig {
            grid: Some(vec![0.75, 3.0, 1.5]),
            ..Default::default()
        };
        let q = Quantizer::from_config(&config).unwrap();
        assert_eq!(q.grid.values(), &[0.75, 1.5, 3.0]);
        let config = QuantizeConfig {
            grid: Some(vec![]),
            ..Default::default()
        };
        assert!(Quantizer::from_config(&config).is_err());
    }

    #[test]
    fn snap_nearest_and_clamp() {
        let grid = DurationGrid::uniform(0.5, 4.0).unwrap();
        assert_eq!(grid.snap(1.1), 1.0);
        assert_eq!(grid.snap(1.4), 1.5);
        assert_eq!(grid.snap(0.01), 0.5);
        assert_eq!(grid.snap(-3.0), 0.5);
        assert_eq!(grid.snap(12.0), 4.0);
        assert_eq!(grid.snap(f64::NAN), 0.5);
    }

    #[test]
    fn snap_ties_go_short() {
        let grid = DurationGrid::from_values([1.0, 2.0]).unwrap();
        assert_eq!(grid.snap(1.5), 1.0);
    }

    #[test]
    fn explicit_grid_sorted_and_deduped() {
        let grid = DurationGrid::from_values([2.0, 0.25, 1.0, 2.0]).unwrap();
        assert_eq!(grid.values(), &[0.25, 1.0, 2.0]);
        assert_eq!(grid.snap_ticks(0.3), 120);
    }

    #[test]
    fn dynamic_levels_range() {
        assert!(DynamicScale::new(4).is_err());
        assert!(DynamicScale::new(9).is_err());
        assert!(DynamicScale::new(5).is_ok());
    }

    #[test]
    fn buckets_are_monotone() {
        let scale = DynamicScale::new(8).unwrap();
        let mut last = 0;
        for v in 0..=127u8 {
            let snapped = scale.snap(v);
            assert!(snapped >= last, "velocity {v} snapped backwards");
            last = snapped;
        }
        assert_eq!(scale.snap(0), 8);
        assert_eq!(scale.snap(64), 72);
        assert_eq!(scale.snap(127), 120);
    }

    #[test]
    fn five_level_scale_has_five_values() {
        let scale = DynamicScale::new(5).unwrap();
        let mut distinct: Vec<u8> = (0..=127u8).map(|v| scale.snap(v)).collect();
        distinct.dedup();
        assert_eq!(distinct.len(), 5);
    }

    #[test]
    fn quantize_is_pure() {
        let q = Quantizer::from_config(&QuantizeConfig::default()).unwrap();
        let raw = RawState {
            pitch: Some(61),
            duration: 0.7,
            velocity: 90,
            articulation: Articulation::Tenuto,
        };
        let a = q.quantize(&raw);
        let b = q.quantize(&raw);
        assert_eq!(a, b);
        assert_eq!(a.pitch, Some(61));
        assert_eq!(a.duration_ticks, 240);
        assert_eq!(a.velocity, 88);
        assert_eq!(a.dynamic, Dynamic::F);
        assert_eq!(a.articulation, Articulation::Tenuto);
    }
}
