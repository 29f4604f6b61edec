use crate::core::models::bcell::BCell;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum DifferentiationError {
    #[error(
        "Memory threshold ({memory}) must be strictly greater than plasma threshold ({plasma})"
    )]
    InvertedThresholds { memory: f64, plasma: f64 },
}

/// Terminal fate of a selected germinal-center B-cell.
///
/// Variants are declared in increasing order of required affinity, so the
/// derived `Ord` ranks `Unfated < Plasma < Memory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Fate {
    /// No terminal fate; the cell stays in the active pool.
    Unfated,
    /// Antibody-secreting plasma cell.
    Plasma,
    /// Long-lived memory B-cell.
    Memory,
}

/// Threshold ladder mapping affinity to fate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentiationPolicy {
    memory_threshold: f64,
    plasma_threshold: f64,
}

impl DifferentiationPolicy {
    pub fn new(memory_threshold: f64, plasma_threshold: f64) -> Result<Self, DifferentiationError> {
        // Written as a negation so NaN thresholds are rejected too.
        if !(memory_threshold > plasma_threshold) {
            return Err(DifferentiationError::InvertedThresholds {
                memory: memory_threshold,
                plasma: plasma_threshold,
            });
        }
        Ok(Self {
            memory_threshold,
            plasma_threshold,
        })
    }

    pub fn memory_threshold(&self) -> f64 {
        self.memory_threshold
    }

    pub fn plasma_threshold(&self) -> f64 {
        self.plasma_threshold
    }

    #[inline]
    pub fn fate_for(&self, affinity: f64) -> Fate {
        if affinity >= self.memory_threshold {
            Fate::Memory
        } else if affinity >= self.plasma_threshold {
            Fate::Plasma
        } else {
            Fate::Unfated
        }
    }

    pub fn differentiate(&self, cell: &BCell) -> Fate {
        self.fate_for(cell.affinity())
    }
}

/// Decides the fate of `cell` from its current affinity.
pub fn differentiate(
    cell: &BCell,
    memory_threshold: f64,
    plasma_threshold: f64,
) -> Result<Fate, DifferentiationError> {
    Ok(DifferentiationPolicy::new(memory_threshold, plasma_threshold)?.differentiate(cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::CellId;
    use nalgebra::DVector;

    fn cell_with(affinity: f64) -> BCell {
        BCell::naive(CellId(0), DVector::zeros(2)).with_affinity(affinity)
    }

    #[test]
    fn ladder_assigns_memory_plasma_and_unfated() {
        let policy = DifferentiationPolicy::new(0.8, 0.6).unwrap();
        assert_eq!(policy.differentiate(&cell_with(0.95)), Fate::Memory);
        assert_eq!(policy.differentiate(&cell_with(0.7)), Fate::Plasma);
        assert_eq!(policy.differentiate(&cell_with(0.3)), Fate::Unfated);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let policy = DifferentiationPolicy::new(0.8, 0.6).unwrap();
        assert_eq!(policy.fate_for(0.8), Fate::Memory);
        assert_eq!(policy.fate_for(0.6), Fate::Plasma);
    }

    #[test]
    fn fate_is_monotone_non_decreasing_in_affinity() {
        let policy = DifferentiationPolicy::new(0.6, 0.4).unwrap();
        let mut previous = Fate::Unfated;
        for step in 0..=1_000 {
            let fate = policy.fate_for(step as f64 / 1_000.0);
            assert!(fate >= previous);
            previous = fate;
        }
        assert_eq!(previous, Fate::Memory);
    }

    #[test]
    fn inverted_or_equal_thresholds_are_rejected() {
        assert!(DifferentiationPolicy::new(0.4, 0.6).is_err());
        assert!(DifferentiationPolicy::new(0.5, 0.5).is_err());
        assert!(DifferentiationPolicy::new(f64::NAN, 0.5).is_err());
        assert!(differentiate(&cell_with(0.9), 0.5, 0.7).is_err());
    }

    #[test]
    fn free_function_matches_policy() {
        assert_eq!(differentiate(&cell_with(0.65), 0.8, 0.6).unwrap(), Fate::Plasma);
    }
}
