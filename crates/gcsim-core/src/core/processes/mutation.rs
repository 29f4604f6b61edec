use crate::core::models::bcell::BCell;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum MutationError {
    #[error("Invalid per-site mutation rate: {0}. Rate must lie in [0, 1]")]
    InvalidRate(f64),
    #[error("Invalid mutation strength: {0}. Strength must be finite and positive")]
    InvalidStrength(f64),
}

/// Somatic hypermutation of receptor profiles.
///
/// Each receptor coordinate is independently perturbed, with probability
/// `rate`, by Gaussian noise of standard deviation `strength`; the result is
/// clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct MutationEngine {
    rate: f64,
    noise: Normal<f64>,
}

impl MutationEngine {
    pub fn new(rate: f64, strength: f64) -> Result<Self, MutationError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(MutationError::InvalidRate(rate));
        }
        if !strength.is_finite() || strength <= 0.0 {
            return Err(MutationError::InvalidStrength(strength));
        }
        let noise = Normal::new(0.0, strength).map_err(|_| MutationError::InvalidStrength(strength))?;
        Ok(Self { rate, noise })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn strength(&self) -> f64 {
        self.noise.std_dev()
    }

    /// Returns a mutated copy of `cell`; the input is left untouched.
    pub fn mutate(&self, cell: &BCell, rng: &mut impl Rng) -> BCell {
        let mut receptor = cell.receptor().clone();
        for value in receptor.iter_mut() {
            if rng.gen_bool(self.rate) {
                *value = (*value + self.noise.sample(rng)).clamp(0.0, 1.0);
            }
        }
        cell.mutated(receptor)
    }
}
