//! Score resampling policy for regenerated drafts.

use outreach_core::config::ReviewConfig;
use outreach_core::{OutreachError, OutreachResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Inclusive score bounds for a freshly sampled draft score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl ScoreRange {
    pub fn new(min: f64, max: f64) -> OutreachResult<Self> {
        if !(0.0..=10.0).contains(&min) || !(0.0..=10.0).contains(&max) || min > max {
            return Err(OutreachError::InvalidState(format!(
                "score range [{min}, {max}] must lie within [0, 10] with min <= max"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn from_config(config: &ReviewConfig) -> OutreachResult<Self> {
        Self::new(config.regen_score_min, config.regen_score_max)
    }

    /// Pin a sampled value into the range; anything below the floor becomes the floor.
    pub fn clamp(&self, score: f64) -> f64 {
        score.clamp(self.min, self.max)
    }

    pub fn contains(&self, score: f64) -> bool {
        (self.min..=self.max).contains(&score)
    }
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self { min: 5.0, max: 9.0 }
    }
}

/// Source of new draft scores. Swap in [`FixedSampler`] or [`SeededSampler`]
/// for deterministic runs.
pub trait ScoreSampler: Send + Sync {
    fn sample(&mut self, min: f64, max: f64) -> f64;
}

/// Uniform draw over `[min, max]`, rounded to one decimal place.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformSampler;

impl ScoreSampler for UniformSampler {
    fn sample(&mut self, min: f64, max: f64) -> f64 {
        round_tenths(rand::thread_rng().gen_range(min..=max))
    }
}

/// Uniform draw from a seeded generator.
#[derive(Debug, Clone)]
pub struct SeededSampler {
    rng: StdRng,
}

impl SeededSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ScoreSampler for SeededSampler {
    fn sample(&mut self, min: f64, max: f64) -> f64 {
        round_tenths(self.rng.gen_range(min..=max))
    }
}

/// Always returns the same value, ignoring the bounds.
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler(pub f64);

impl ScoreSampler for FixedSampler {
    fn sample(&mut self, _min: f64, _max: f64) -> f64 {
        self.0
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
