use crate::core::models::bcell::BCell;
use std::fmt;

/// Outcome of an ELISA-style comparison against a correlate of protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectionStatus {
    Protective,
    NonProtective,
}

impl fmt::Display for ProtectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protective => f.write_str("Protective"),
            Self::NonProtective => f.write_str("Non-protective"),
        }
    }
}

/// Classifies an antibody concentration against a protective threshold.
///
/// A level must exceed the threshold to count as protective.
pub fn elisa(antibody_level: f64, protective_threshold: f64) -> ProtectionStatus {
    if antibody_level > protective_threshold {
        ProtectionStatus::Protective
    } else {
        ProtectionStatus::NonProtective
    }
}

/// Mean affinity of a pool, or `0.0` for an empty pool.
pub fn avidity_index(cells: &[BCell]) -> f64 {
    if cells.is_empty() {
        return 0.0;
    }
    cells.iter().map(BCell::affinity).sum::<f64>() / cells.len() as f64
}
