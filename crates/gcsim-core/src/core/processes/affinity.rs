use nalgebra::DVector;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AffinityError {
    #[error("Epitope has {epitope} dimensions but receptor has {receptor}")]
    DimensionMismatch { epitope: usize, receptor: usize },
}

/// Binding strength between an epitope signature and a receptor profile.
///
/// Affinity is `exp(-d)` where `d` is the Euclidean distance between the two
/// vectors, so it lies in `(0, 1]` and equals `1` for identical vectors.
#[inline]
pub fn compute(epitope: &DVector<f64>, receptor: &DVector<f64>) -> Result<f64, AffinityError> {
    if epitope.len() != receptor.len() {
        return Err(AffinityError::DimensionMismatch {
            epitope: epitope.len(),
            receptor: receptor.len(),
        });
    }
    let distance = epitope.metric_distance(receptor);
    // exp underflows to zero beyond d ~ 745.
    Ok((-distance).exp().max(f64::MIN_POSITIVE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    const TOLERANCE: f64 = 1e-12;

    fn v(values: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(values)
    }

    #[test]
    fn identical_vectors_have_unit_affinity() {
        let e = v(&[0.72, 0.15, 0.40, 0.85, 0.50]);
        assert_eq!(compute(&e, &e).unwrap(), 1.0);
    }

    #[test]
    fn affinity_is_exponential_of_negative_distance() {
        let affinity = compute(&v(&[0.0, 0.0]), &v(&[3.0, 4.0])).unwrap();
        assert!((affinity - (-5.0f64).exp()).abs() < TOLERANCE);
    }

    #[test]
    fn affinity_decreases_monotonically_with_distance() {
        let e = v(&[0.5, 0.5]);
        let near = compute(&e, &v(&[0.6, 0.5])).unwrap();
        let far = compute(&e, &v(&[0.9, 0.5])).unwrap();
        assert!(near > far);
    }

    #[test]
    fn affinity_stays_within_unit_interval_for_random_pairs() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1_000 {
            let e = DVector::from_fn(5, |_, _| rng.gen_range(-2.0..2.0));
            let r = DVector::from_fn(5, |_, _| rng.gen_range(0.0..1.0));
            let affinity = compute(&e, &r).unwrap();
            assert!(affinity > 0.0 && affinity <= 1.0);
        }
    }

    #[test]
    fn distant_vectors_keep_a_positive_affinity() {
        let affinity = compute(&v(&[0.0]), &v(&[1.0e4])).unwrap();
        assert!(affinity > 0.0);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let result = compute(&v(&[0.1, 0.2, 0.3]), &v(&[0.1, 0.2]));
        assert_eq!(
            result,
            Err(AffinityError::DimensionMismatch {
                epitope: 3,
                receptor: 2
            })
        );
    }
}
