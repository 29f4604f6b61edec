use super::ids::{CellId, Serotype};
use nalgebra::DVector;

/// A B-cell agent: a receptor profile plus the bookkeeping the germinal center needs.
///
/// `BCell` values are never edited in place by the simulation. Scoring,
/// assignment and mutation all return a new value, so a pool can be read
/// while the next generation is being built.
#[derive(Debug, Clone, PartialEq)]
pub struct BCell {
    id: CellId,
    receptor: DVector<f64>,
    /// Affinity against the antigen this cell is matched to; `0.0` means unscored.
    affinity: f64,
    serotype: Option<Serotype>,
    mutations: u32,
}

impl BCell {
    /// Creates an unassigned, unscored naive cell.
    ///
    /// # Arguments
    ///
    /// * `id` - The lineage identifier.
    /// * `receptor` - The receptor profile, with the same dimensionality as
    ///   the epitope vectors it will be scored against.
    pub fn naive(id: CellId, receptor: DVector<f64>) -> Self {
        Self {
            id,
            receptor,
            affinity: 0.0,
            serotype: None,
            mutations: 0,
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn receptor(&self) -> &DVector<f64> {
        &self.receptor
    }

    pub fn affinity(&self) -> f64 {
        self.affinity
    }

    pub fn is_scored(&self) -> bool {
        self.affinity > 0.0
    }

    pub fn serotype(&self) -> Option<&Serotype> {
        self.serotype.as_ref()
    }

    /// Number of somatic hypermutation events in this cell's history.
    pub fn mutations(&self) -> u32 {
        self.mutations
    }

    /// Returns this cell re-scored with a new affinity.
    pub fn with_affinity(self, affinity: f64) -> Self {
        Self { affinity, ..self }
    }

    /// Returns this cell claimed by `serotype` at the given affinity.
    pub fn assigned(self, serotype: Serotype, affinity: f64) -> Self {
        Self {
            serotype: Some(serotype),
            affinity,
            ..self
        }
    }

    /// Derives a mutated copy carrying the new receptor.
    ///
    /// Identity and serotype carry over; the affinity is reset, so the copy
    /// must be re-scored before it can take part in selection.
    pub fn mutated(&self, receptor: DVector<f64>) -> Self {
        Self {
            id: self.id,
            receptor,
            affinity: 0.0,
            serotype: self.serotype.clone(),
            mutations: self.mutations + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> BCell {
        BCell::naive(CellId(7), DVector::from_vec(vec![0.1, 0.2, 0.3]))
    }

    #[test]
    fn naive_cell_is_unscored_and_unassigned() {
        let cell = cell();
        assert!(!cell.is_scored());
        assert!(cell.serotype().is_none());
        assert_eq!(cell.mutations(), 0);
    }

    #[test]
    fn assigned_records_serotype_and_affinity() {
        let cell = cell().assigned(Serotype::new("14"), 0.42);
        assert_eq!(cell.serotype(), Some(&Serotype::new("14")));
        assert_eq!(cell.affinity(), 0.42);
        assert_eq!(cell.id(), CellId(7));
    }

    #[test]
    fn mutated_copy_keeps_identity_and_resets_affinity() {
        let parent = cell().assigned(Serotype::new("14"), 0.9);
        let child = parent.mutated(DVector::from_vec(vec![0.15, 0.2, 0.3]));

        assert_eq!(child.id(), parent.id());
        assert_eq!(child.serotype(), parent.serotype());
        assert_eq!(child.affinity(), 0.0);
        assert_eq!(child.mutations(), 1);
        assert_eq!(parent.affinity(), 0.9);
        assert_eq!(parent.receptor()[0], 0.1);
    }
}
