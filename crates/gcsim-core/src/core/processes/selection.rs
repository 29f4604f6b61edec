use crate::core::models::bcell::BCell;
use rand::Rng;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum SelectionError {
    #[error("Invalid temperature: {0}. Temperature must be finite and positive for Boltzmann selection")]
    InvalidTemperature(f64),
    #[error("Cell at index {index} has a non-finite affinity")]
    NonFiniteAffinity { index: usize },
}

/// Boltzmann log-weights `(a_i - a_max) / T`.
///
/// Subtracting the maximum keeps every weight in `(0, 1]` once exponentiated,
/// so no temperature can overflow the exponential.
fn log_weights(affinities: &[f64], temperature: f64) -> Result<Vec<f64>, SelectionError> {
    if !temperature.is_finite() || temperature <= 0.0 {
        return Err(SelectionError::InvalidTemperature(temperature));
    }
    if let Some(index) = affinities.iter().position(|a| !a.is_finite()) {
        return Err(SelectionError::NonFiniteAffinity { index });
    }
    let max_affinity = affinities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(affinities
        .iter()
        .map(|&a| (a - max_affinity) / temperature)
        .collect())
}

/// Normalized Boltzmann selection probabilities for the given affinities.
pub fn boltzmann_probabilities(
    affinities: &[f64],
    temperature: f64,
) -> Result<Vec<f64>, SelectionError> {
    let weights: Vec<f64> = log_weights(affinities, temperature)?
        .into_iter()
        .map(f64::exp)
        .collect();
    // The maximum contributes exp(0) = 1, so the total is never below 1.
    let total: f64 = weights.iter().sum();
    Ok(weights.into_iter().map(|w| w / total).collect())
}

/// Samples `min(max_survivors, n)` indices without replacement, each draw
/// proportional to the Boltzmann weight of the remaining cells.
///
/// Sampling uses Efraimidis-Spirakis keys evaluated in log space
/// (`log w_i + Gumbel noise`), which yields the same distribution as
/// sequential weighted draws but cannot underflow when the temperature is
/// tiny. Ties between equal keys break on the lower index.
#[instrument(level = "trace", skip_all, fields(n = cells.len(), temperature = temperature, max_survivors = ?max_survivors))]
pub fn select_indices(
    cells: &[BCell],
    temperature: f64,
    max_survivors: Option<usize>,
    rng: &mut impl Rng,
) -> Result<Vec<usize>, SelectionError> {
    let affinities: Vec<f64> = cells.iter().map(BCell::affinity).collect();
    let log_w = log_weights(&affinities, temperature)?;
    if cells.is_empty() {
        return Ok(Vec::new());
    }

    let amount = max_survivors.map_or(cells.len(), |cap| cap.min(cells.len()));

    let mut keyed: Vec<(f64, usize)> = log_w
        .iter()
        .enumerate()
        .map(|(index, &lw)| (lw + gumbel(rng), index))
        .collect();
    keyed.sort_by(|a, b| match b.0.total_cmp(&a.0) {
        Ordering::Equal => a.1.cmp(&b.1),
        other => other,
    });
    keyed.truncate(amount);

    Ok(keyed.into_iter().map(|(_, index)| index).collect())
}

/// Boltzmann selection returning references into the unmodified population.
pub fn select<'a>(
    cells: &'a [BCell],
    temperature: f64,
    max_survivors: Option<usize>,
    rng: &mut impl Rng,
) -> Result<Vec<&'a BCell>, SelectionError> {
    Ok(select_indices(cells, temperature, max_survivors, rng)?
        .into_iter()
        .map(|index| &cells[index])
        .collect())
}

#[inline]
fn gumbel(rng: &mut impl Rng) -> f64 {
    // gen::<f64>() is in [0, 1); shift to (0, 1] so the logarithms stay finite.
    let u: f64 = 1.0 - rng.r#gen::<f64>();
    -(-u.ln()).max(f64::MIN_POSITIVE).ln()
}
